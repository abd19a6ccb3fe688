use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ChatbotError;
use crate::models::{ChatRole, Conversation, ConversationMessage, ConversationStatus};

#[derive(Debug, Deserialize)]
struct ActiveConversationRow {
    patient: Option<PatientNumber>,
}

#[derive(Debug, Deserialize)]
struct PatientNumber {
    whatsapp_number: String,
}

/// Conversation and message rows backing the chatbot transcript.
pub struct ConversationRecordService {
    supabase: SupabaseClient,
}

impl ConversationRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_active(&self, patient_id: Uuid, auth_token: &str) -> Result<Option<Conversation>> {
        let path = format!(
            "/rest/v1/conversations?patient_id=eq.{}&status=eq.active&order=started_at.desc&limit=1",
            patient_id
        );
        self.supabase.select_one(&path, auth_token).await
    }

    /// A patient has at most one active conversation; this returns it or opens one.
    pub async fn get_or_create_active(&self, patient_id: Uuid, auth_token: &str) -> Result<Conversation> {
        if let Some(conversation) = self.find_active(patient_id, auth_token).await? {
            return Ok(conversation);
        }

        let conversation: Conversation = self
            .supabase
            .insert(
                "conversations",
                auth_token,
                json!({
                    "patient_id": patient_id,
                    "status": ConversationStatus::Active,
                    "started_at": Utc::now()
                }),
            )
            .await?;

        info!("Conversation {} opened for patient {}", conversation.id, patient_id);
        Ok(conversation)
    }

    pub async fn add_message(
        &self,
        conversation_id: Uuid,
        role: ChatRole,
        body: &str,
        message_type: &str,
        auth_token: &str,
    ) -> Result<ConversationMessage> {
        self.supabase
            .insert(
                "conversation_messages",
                auth_token,
                json!({
                    "conversation_id": conversation_id,
                    "role": role,
                    "body": body,
                    "message_type": message_type,
                    "created_at": Utc::now()
                }),
            )
            .await
    }

    /// The `limit` most recent messages, oldest first.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
        auth_token: &str,
    ) -> Result<Vec<ConversationMessage>> {
        let path = format!(
            "/rest/v1/conversation_messages?conversation_id=eq.{}&order=created_at.desc&limit={}",
            conversation_id,
            limit.max(1)
        );
        let mut messages: Vec<ConversationMessage> = self.supabase.select(&path, auth_token).await?;
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    pub async fn set_status(
        &self,
        conversation_id: Uuid,
        status: ConversationStatus,
        auth_token: &str,
    ) -> Result<Conversation> {
        let mut body = json!({ "status": status });
        if status != ConversationStatus::Active {
            body["finished_at"] = json!(Utc::now());
        }

        let filter = format!("id=eq.{}", conversation_id);
        let mut rows: Vec<Conversation> = self
            .supabase
            .update("conversations", &filter, auth_token, body)
            .await?;
        if rows.is_empty() {
            return Err(ChatbotError::ConversationNotFound.into());
        }

        debug!("Conversation {} is now {:?}", conversation_id, status);
        Ok(rows.remove(0))
    }

    pub async fn update_summary(&self, conversation_id: Uuid, summary: &str, auth_token: &str) -> Result<()> {
        let filter = format!("id=eq.{}", conversation_id);
        let _: Vec<Conversation> = self
            .supabase
            .update("conversations", &filter, auth_token, json!({ "summary": summary }))
            .await?;
        Ok(())
    }

    /// WhatsApp numbers of patients with an active conversation.
    pub async fn list_active_numbers(&self, auth_token: &str) -> Result<Vec<String>> {
        let rows: Vec<ActiveConversationRow> = self
            .supabase
            .select(
                "/rest/v1/conversations?status=eq.active&select=patient:patients(whatsapp_number)",
                auth_token,
            )
            .await?;

        let mut numbers: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row.patient.map(|p| p.whatsapp_number))
            .collect();
        numbers.sort();
        numbers.dedup();
        Ok(numbers)
    }
}
