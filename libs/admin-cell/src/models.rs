// libs/admin-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// SYSTEM SETTINGS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettingValueType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub value_type: SettingValueType,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default = "default_category")]
    pub category: String,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "general".to_string()
}

/// A setting value converted according to its declared type.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Json(Value),
}

impl SettingValue {
    pub fn parse(raw: &str, value_type: SettingValueType) -> Result<Self, AdminError> {
        let trimmed = raw.trim();
        match value_type {
            SettingValueType::String => Ok(SettingValue::String(raw.to_string())),
            SettingValueType::Integer => trimmed
                .parse()
                .map(SettingValue::Integer)
                .map_err(|_| AdminError::InvalidSettingValue(format!("'{}' is not an integer", raw))),
            SettingValueType::Float => trimmed
                .parse()
                .map(SettingValue::Float)
                .map_err(|_| AdminError::InvalidSettingValue(format!("'{}' is not a number", raw))),
            SettingValueType::Boolean => Ok(SettingValue::Boolean(matches!(
                trimmed.to_lowercase().as_str(),
                "true" | "1" | "sim" | "yes"
            ))),
            SettingValueType::Json => serde_json::from_str(raw)
                .map(SettingValue::Json)
                .map_err(|e| AdminError::InvalidSettingValue(format!("Invalid JSON: {}", e))),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl SystemSetting {
    pub fn typed_value(&self) -> Result<SettingValue, AdminError> {
        SettingValue::parse(&self.value, self.value_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertSettingRequest {
    pub value: String,
    pub value_type: Option<SettingValueType>,
    pub description: Option<String>,
    pub category: Option<String>,
}

// ==============================================================================
// NOTIFICATIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNotification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: NotificationPriority,
    /// User ids; empty means every staff member.
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    pub action_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AdminNotification {
    pub fn is_for(&self, user_id: &str) -> bool {
        self.recipients.is_empty() || self.recipients.iter().any(|r| r == user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub action_url: Option<String>,
}

// ==============================================================================
// ACCESS LOG
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: Uuid,
    pub user_id: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub action: String,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAccessLog {
    pub user_id: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub action: String,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AdminError {
    #[error("Setting '{0}' not found")]
    SettingNotFound(String),

    #[error("Setting '{0}' cannot be edited")]
    SettingNotEditable(String),

    #[error("Invalid setting value: {0}")]
    InvalidSettingValue(String),

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::SettingNotFound(_) | AdminError::NotificationNotFound => {
                AppError::NotFound(err.to_string())
            }
            AdminError::SettingNotEditable(_) => AppError::Forbidden(err.to_string()),
            AdminError::InvalidSettingValue(msg) | AdminError::ValidationError(msg) => {
                AppError::ValidationError(msg)
            }
        }
    }
}
