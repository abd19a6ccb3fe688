// libs/chatbot-cell/src/services/webhook.rs
use std::sync::Arc;

use anyhow::Result;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use patient_cell::services::PatientService;
use shared_config::AppConfig;

use crate::error::ChatbotError;
use crate::models::{ChatRole, IncomingText, TurnContext, VerifyQuery, WebhookPayload};
use crate::services::conversation::ConversationService;
use crate::services::records::ConversationRecordService;
use crate::services::store::ConversationStore;
use crate::services::whatsapp::WhatsAppService;
use crate::utils::validators::sanitize_message;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// The challenge to echo back when the subscription request carries our verify token.
pub fn verify_subscription(query: &VerifyQuery, verify_token: &str) -> Option<String> {
    let mode_ok = query.mode.as_deref() == Some("subscribe");
    let token_ok = !verify_token.is_empty() && query.verify_token.as_deref() == Some(verify_token);
    if mode_ok && token_ok {
        query.challenge.clone()
    } else {
        None
    }
}

/// Checks `sha256=<hex>` against an HMAC of the raw body. Without an app
/// secret configured every body is accepted.
pub fn verify_signature(app_secret: Option<&str>, header: Option<&str>, body: &[u8]) -> Result<(), ChatbotError> {
    let Some(secret) = app_secret else {
        return Ok(());
    };

    let signature = header
        .and_then(|value| value.strip_prefix("sha256="))
        .and_then(|hex_digest| hex::decode(hex_digest.trim()).ok())
        .ok_or(ChatbotError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| ChatbotError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&signature).map_err(|_| ChatbotError::InvalidSignature)
}

/// Turns inbound WhatsApp messages into stored transcript rows and replies.
pub struct WebhookProcessor {
    conversations: ConversationService,
    patients: PatientService,
    records: ConversationRecordService,
    whatsapp: WhatsAppService,
    service_token: String,
}

impl WebhookProcessor {
    pub fn new(config: &AppConfig, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            conversations: ConversationService::new(config, store),
            patients: PatientService::new(config),
            records: ConversationRecordService::new(config),
            whatsapp: WhatsAppService::new(config),
            service_token: config.service_token().to_string(),
        }
    }

    /// Handles every text message in the delivery and returns how many were
    /// answered. Individual failures are logged and do not stop the rest.
    pub async fn handle_payload(&self, payload: &WebhookPayload) -> usize {
        if !payload.is_whatsapp() {
            debug!("Ignoring webhook for object '{}'", payload.object);
            return 0;
        }

        let mut answered = 0;
        for message in payload.text_messages() {
            match self.handle_text(&message).await {
                Ok(true) => answered += 1,
                Ok(false) => {}
                Err(err) => error!("Failed to handle message from {}: {}", message.from, err),
            }
        }
        answered
    }

    async fn handle_text(&self, message: &IncomingText) -> Result<bool> {
        let body = sanitize_message(&message.body);
        if body.trim().is_empty() {
            debug!("Skipping empty message from {}", message.from);
            return Ok(false);
        }

        let token = self.service_token.as_str();
        let patient = self
            .patients
            .get_or_create_by_whatsapp(&message.from, message.profile_name.as_deref(), token)
            .await?;
        let conversation = self.records.get_or_create_active(patient.id, token).await?;

        if let Err(err) = self
            .records
            .add_message(conversation.id, ChatRole::User, &body, "text", token)
            .await
        {
            warn!("User message for conversation {} not stored: {}", conversation.id, err);
        }

        let turn = TurnContext {
            patient_id: patient.id,
            conversation_id: conversation.id,
        };
        let reply = self
            .conversations
            .process_user_message(&message.from, &body, Some(turn))
            .await?;

        self.whatsapp.send_text_message(&message.from, &reply).await?;
        info!(patient_id = %patient.id, conversation_id = %conversation.id, "Chatbot reply sent");

        if let Err(err) = self
            .records
            .add_message(conversation.id, ChatRole::Model, &reply, "text", token)
            .await
        {
            warn!("Reply for conversation {} not stored: {}", conversation.id, err);
        }

        Ok(true)
    }
}
