// libs/chatbot-cell/src/services/whatsapp.rs
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::error::ChatbotError;
use crate::utils::formatters::truncate_text;
use crate::utils::validators::{format_whatsapp_number, validate_message_length, MAX_MESSAGE_LENGTH};

fn recipient(to: &str) -> Result<String, ChatbotError> {
    format_whatsapp_number(to).ok_or_else(|| ChatbotError::WhatsApp(format!("Invalid WhatsApp number: {}", to)))
}

/// WhatsApp Cloud API client for outbound messages.
pub struct WhatsAppService {
    client: Client,
    access_token: String,
    phone_number_id: String,
    base_url: String,
}

impl WhatsAppService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            access_token: config.whatsapp_access_token.clone(),
            phone_number_id: config.whatsapp_phone_number_id.clone(),
            base_url: config.whatsapp_api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    /// Bodies over the Cloud API limit are cut rather than rejected.
    pub async fn send_text_message(&self, to: &str, body: &str) -> Result<Value, ChatbotError> {
        let to = recipient(to)?;
        let body = if validate_message_length(body, MAX_MESSAGE_LENGTH) {
            body.to_string()
        } else {
            warn!("Outgoing message to {} exceeds {} characters, truncating", to, MAX_MESSAGE_LENGTH);
            truncate_text(body, MAX_MESSAGE_LENGTH, "...")
        };

        debug!("Sending WhatsApp text to {}", to);
        self.send(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body }
        }))
        .await
    }

    /// Sends an approved template; `language` defaults to `pt_BR`.
    pub async fn send_template_message(
        &self,
        to: &str,
        template: &str,
        language: Option<&str>,
    ) -> Result<Value, ChatbotError> {
        let to = recipient(to)?;
        debug!("Sending WhatsApp template {} to {}", template, to);
        self.send(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "template",
            "template": {
                "name": template,
                "language": { "code": language.unwrap_or("pt_BR") }
            }
        }))
        .await
    }

    async fn send(&self, payload: Value) -> Result<Value, ChatbotError> {
        if self.access_token.is_empty() || self.phone_number_id.is_empty() {
            return Err(ChatbotError::WhatsApp("WhatsApp credentials are not configured".to_string()));
        }

        let response = self
            .client
            .post(self.messages_url())
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("WhatsApp request failed: {}", e);
                ChatbotError::WhatsApp(e.to_string())
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ChatbotError::WhatsApp(e.to_string()))?;

        if !status.is_success() {
            error!("WhatsApp API returned {}: {}", status, response_text);
            return Err(ChatbotError::WhatsApp(format!("HTTP {}: {}", status, response_text)));
        }

        info!("WhatsApp message accepted ({})", status);
        Ok(serde_json::from_str(&response_text).unwrap_or(Value::Null))
    }
}
