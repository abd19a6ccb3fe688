use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ChatbotError {
    #[error("WhatsApp API error: {0}")]
    WhatsApp(String),

    #[error("AI service error: {0}")]
    Ai(String),

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Routing not found")]
    RoutingNotFound,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ChatbotError> for AppError {
    fn from(err: ChatbotError) -> Self {
        match err {
            ChatbotError::RoutingNotFound | ChatbotError::ConversationNotFound => {
                AppError::NotFound(err.to_string())
            }
            ChatbotError::InvalidSignature => AppError::Auth(err.to_string()),
            ChatbotError::ValidationError(msg) => AppError::ValidationError(msg),
            ChatbotError::WhatsApp(_) | ChatbotError::Ai(_) => AppError::ExternalService(err.to_string()),
            ChatbotError::Store(_) | ChatbotError::Redis(_) | ChatbotError::Serialization(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
