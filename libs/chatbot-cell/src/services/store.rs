// libs/chatbot-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use patient_cell::models::normalize_phone;
use patient_cell::services::PatientService;
use shared_config::AppConfig;

use crate::error::ChatbotError;
use crate::models::{ChatRole, ConversationState, ConversationStatus, SessionData};
use crate::services::records::ConversationRecordService;

const SESSION_KEY_PREFIX: &str = "whatsapp_session_";

pub fn session_key(user_number: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, user_number)
}

/// Per-number chatbot session storage. A number without a session loads as
/// the default `START` session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, user_number: &str) -> Result<SessionData, ChatbotError>;
    async fn save(&self, user_number: &str, session: &SessionData) -> Result<(), ChatbotError>;
    async fn reset(&self, user_number: &str) -> Result<(), ChatbotError>;
    async fn list_numbers(&self) -> Result<Vec<String>, ChatbotError>;
}

/// Picks the backend named by `conversation_backend`.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>, ChatbotError> {
    let ttl = config.conversation_ttl_seconds;
    match config.conversation_backend.as_str() {
        "redis" => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| ChatbotError::Store("REDIS_URL is required for the redis backend".to_string()))?;
            Ok(Arc::new(RedisConversationStore::new(url, ttl).await?))
        }
        "database" => Ok(Arc::new(DatabaseConversationStore::new(config))),
        "memory" => Ok(Arc::new(InMemoryConversationStore::new(ttl))),
        other => {
            warn!("Unknown conversation backend '{}', using in-memory sessions", other);
            Ok(Arc::new(InMemoryConversationStore::new(ttl)))
        }
    }
}

// ==============================================================================
// REDIS
// ==============================================================================

pub struct RedisConversationStore {
    pool: Pool,
    ttl_seconds: u64,
}

impl RedisConversationStore {
    pub async fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self, ChatbotError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ChatbotError::Store(format!("Failed to create Redis pool: {}", e)))?;

        let store = Self { pool, ttl_seconds };
        let mut conn = store.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis conversation store ready");
        Ok(store)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, ChatbotError> {
        self.pool
            .get()
            .await
            .map_err(|e| ChatbotError::Store(format!("Redis connection error: {}", e)))
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn load(&self, user_number: &str) -> Result<SessionData, ChatbotError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(session_key(user_number))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("Discarding unreadable session for {}: {}", user_number, e);
                SessionData::default()
            })),
            None => Ok(SessionData::default()),
        }
    }

    async fn save(&self, user_number: &str, session: &SessionData) -> Result<(), ChatbotError> {
        let json = serde_json::to_string(session)?;
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SETEX")
            .arg(session_key(user_number))
            .arg(self.ttl_seconds)
            .arg(json)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn reset(&self, user_number: &str) -> Result<(), ChatbotError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(session_key(user_number))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_numbers(&self) -> Result<Vec<String>, ChatbotError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}*", SESSION_KEY_PREFIX))
            .query_async(&mut conn)
            .await?;

        let mut numbers: Vec<String> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(SESSION_KEY_PREFIX))
            .map(str::to_string)
            .collect();
        numbers.sort();
        Ok(numbers)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, (SessionData, Instant)>>,
    ttl: Duration,
}

impl InMemoryConversationStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_number: &str) -> Result<SessionData, ChatbotError> {
        let sessions = self.sessions.read().await;
        Ok(match sessions.get(&session_key(user_number)) {
            Some((session, saved_at)) if saved_at.elapsed() < self.ttl => session.clone(),
            _ => SessionData::default(),
        })
    }

    async fn save(&self, user_number: &str, session: &SessionData) -> Result<(), ChatbotError> {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, (_, saved_at)| saved_at.elapsed() < self.ttl);
        sessions.insert(session_key(user_number), (session.clone(), Instant::now()));
        Ok(())
    }

    async fn reset(&self, user_number: &str) -> Result<(), ChatbotError> {
        self.sessions.write().await.remove(&session_key(user_number));
        Ok(())
    }

    async fn list_numbers(&self) -> Result<Vec<String>, ChatbotError> {
        let sessions = self.sessions.read().await;
        let mut numbers: Vec<String> = sessions
            .iter()
            .filter(|(_, (_, saved_at))| saved_at.elapsed() < self.ttl)
            .filter_map(|(key, _)| key.strip_prefix(SESSION_KEY_PREFIX))
            .map(str::to_string)
            .collect();
        numbers.sort();
        Ok(numbers)
    }
}

// ==============================================================================
// DATABASE
// ==============================================================================

/// Sessions rebuilt from the patient's active conversation. The webhook
/// persists each message, so `save` only records the state and context,
/// kept as JSON in the conversation summary.
pub struct DatabaseConversationStore {
    patients: PatientService,
    records: ConversationRecordService,
    service_token: String,
    history_limit: usize,
}

impl DatabaseConversationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            patients: PatientService::new(config),
            records: ConversationRecordService::new(config),
            service_token: config.service_token().to_string(),
            history_limit: config.conversation_history_limit,
        }
    }

    async fn active_conversation(&self, user_number: &str) -> Result<Option<crate::models::Conversation>, ChatbotError> {
        let number = normalize_phone(user_number);
        let Some(patient) = self
            .patients
            .get_by_whatsapp(&number, &self.service_token)
            .await
            .map_err(store_error)?
        else {
            return Ok(None);
        };

        self.records
            .find_active(patient.id, &self.service_token)
            .await
            .map_err(store_error)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSessionMeta {
    #[serde(default)]
    state: ConversationState,
    #[serde(default)]
    context: Map<String, Value>,
}

impl StoredSessionMeta {
    /// Rows written before the context was kept hold a bare state name.
    fn from_summary(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            state: ConversationState::parse(raw).unwrap_or_default(),
            context: Map::new(),
        })
    }
}

fn store_error(err: anyhow::Error) -> ChatbotError {
    ChatbotError::Store(err.to_string())
}

#[async_trait]
impl ConversationStore for DatabaseConversationStore {
    async fn load(&self, user_number: &str) -> Result<SessionData, ChatbotError> {
        let Some(conversation) = self.active_conversation(user_number).await? else {
            return Ok(SessionData::default());
        };

        let messages = self
            .records
            .list_messages(conversation.id, self.history_limit, &self.service_token)
            .await
            .map_err(store_error)?;

        let meta = conversation
            .summary
            .as_deref()
            .map(StoredSessionMeta::from_summary)
            .unwrap_or_default();
        let mut session = SessionData {
            state: meta.state,
            context: meta.context,
            ..Default::default()
        };
        for message in messages {
            session.push(message.role, message.body);
        }
        debug!("Rebuilt session for {} with {} messages", user_number, session.history.len());
        Ok(session)
    }

    async fn save(&self, user_number: &str, session: &SessionData) -> Result<(), ChatbotError> {
        if let Some(conversation) = self.active_conversation(user_number).await? {
            let summary = serde_json::to_string(&StoredSessionMeta {
                state: session.state,
                context: session.context.clone(),
            })?;
            self.records
                .update_summary(conversation.id, &summary, &self.service_token)
                .await
                .map_err(store_error)?;
        }
        Ok(())
    }

    async fn reset(&self, user_number: &str) -> Result<(), ChatbotError> {
        if let Some(conversation) = self.active_conversation(user_number).await? {
            self.records
                .set_status(conversation.id, ConversationStatus::Finished, &self.service_token)
                .await
                .map_err(store_error)?;
        }
        Ok(())
    }

    async fn list_numbers(&self) -> Result<Vec<String>, ChatbotError> {
        self.records
            .list_active_numbers(&self.service_token)
            .await
            .map_err(store_error)
    }
}

/// Whether the session already ends with this user message (database-backed
/// sessions include the message the webhook just stored).
pub fn ends_with_user_message(session: &SessionData, text: &str) -> bool {
    session
        .history
        .last()
        .is_some_and(|entry| entry.role == ChatRole::User && entry.text() == text)
}
