// libs/chatbot-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ==============================================================================
// WHATSAPP WEBHOOK PAYLOADS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    pub field: Option<String>,
    pub value: WebhookValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookValue {
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    pub wa_id: String,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// A text message pulled out of a webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingText {
    pub from: String,
    pub profile_name: Option<String>,
    pub message_id: Option<String>,
    pub body: String,
}

impl WebhookPayload {
    pub fn is_whatsapp(&self) -> bool {
        self.object == "whatsapp_business_account"
    }

    /// Text messages in delivery order. Status updates and media are skipped.
    pub fn text_messages(&self) -> Vec<IncomingText> {
        if !self.is_whatsapp() {
            return Vec::new();
        }

        let mut texts = Vec::new();
        for change in self.entry.iter().flat_map(|e| &e.changes) {
            let value = &change.value;
            for message in &value.messages {
                if message.message_type != "text" {
                    continue;
                }
                let Some(text) = &message.text else {
                    continue;
                };
                let profile_name = value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id == message.from)
                    .or_else(|| value.contacts.first())
                    .and_then(|c| c.profile.as_ref())
                    .and_then(|p| p.name.clone());

                texts.push(IncomingText {
                    from: message.from.clone(),
                    profile_name,
                    message_id: message.id.clone(),
                    body: text.body.clone(),
                });
            }
        }
        texts
    }
}

// ==============================================================================
// CONVERSATION SESSION
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Start,
    AwaitingTimeChoice,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Start => "START",
            ConversationState::AwaitingTimeChoice => "AWAITING_TIME_CHOICE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "START" => Some(ConversationState::Start),
            "AWAITING_TIME_CHOICE" => Some(ConversationState::AwaitingTimeChoice),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub parts: Vec<String>,
}

impl HistoryEntry {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![text.into()],
        }
    }

    pub fn text(&self) -> String {
        self.parts.join("\n")
    }
}

/// Per-number session, stored as JSON in the conversation cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionData {
    #[serde(default)]
    pub state: ConversationState,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl SessionData {
    pub fn push(&mut self, role: ChatRole, text: impl Into<String>) {
        self.history.push(HistoryEntry::new(role, text));
    }

    /// Keeps the `limit` most recent entries.
    pub fn cap_history(&mut self, limit: usize) {
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            state: self.state,
            message_count: self.history.len(),
            last_message: self.history.last().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversationSummary {
    pub state: ConversationState,
    pub message_count: usize,
    pub last_message: Option<HistoryEntry>,
}

// ==============================================================================
// PERSISTED CONVERSATIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Active,
    Finished,
    Redirected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ConversationStatus,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: ChatRole,
    pub body: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_message_type() -> String {
    "text".to_string()
}

/// Identifies the patient and conversation a chatbot turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnContext {
    pub patient_id: Uuid,
    pub conversation_id: Uuid,
}

// ==============================================================================
// ROUTINGS (HAND-OFF TO STAFF)
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRequestType {
    AppointmentRequest,
    ComplexQuestion,
    #[default]
    HumanRequest,
    SpecificInformation,
}

impl RoutingRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingRequestType::AppointmentRequest => "appointment_request",
            RoutingRequestType::ComplexQuestion => "complex_question",
            RoutingRequestType::HumanRequest => "human_request",
            RoutingRequestType::SpecificInformation => "specific_information",
        }
    }

    /// Accepts the snake_case names and the Portuguese labels the assistant may emit.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "appointment_request" | "agendamento" => Some(RoutingRequestType::AppointmentRequest),
            "complex_question" | "duvida_complexa" | "dúvida_complexa" => {
                Some(RoutingRequestType::ComplexQuestion)
            }
            "human_request" | "solicitacao_humana" | "solicitação_humana" | "humano" => {
                Some(RoutingRequestType::HumanRequest)
            }
            "specific_information" | "informacao_especifica" | "informação_específica" => {
                Some(RoutingRequestType::SpecificInformation)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoutingRequestType::AppointmentRequest => "Solicitação de agendamento",
            RoutingRequestType::ComplexQuestion => "Dúvida complexa",
            RoutingRequestType::HumanRequest => "Pediu atendimento humano",
            RoutingRequestType::SpecificInformation => "Informação específica",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl RoutingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStatus::Pending => "pending",
            RoutingStatus::InProgress => "in_progress",
            RoutingStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub conversation_id: Uuid,
    pub request_type: RoutingRequestType,
    pub doctor_of_interest_id: Option<Uuid>,
    pub conversation_summary: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: RoutingStatus,
    pub handled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRouting {
    pub patient_id: Uuid,
    pub conversation_id: Uuid,
    pub request_type: RoutingRequestType,
    pub doctor_of_interest_id: Option<Uuid>,
    pub conversation_summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoutingRequest {
    pub status: RoutingStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingFilters {
    pub status: Option<RoutingStatus>,
}

// ==============================================================================
// REMINDERS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReminderReport {
    pub checked: usize,
    pub sent: usize,
    pub failed: usize,
}
