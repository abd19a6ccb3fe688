// libs/chatbot-cell/src/services/ai.rs
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::ChatbotError;
use crate::models::{ChatRole, HistoryEntry};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct AiService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AiService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.ai_api_key.clone(),
            base_url: config.ai_api_base_url.trim_end_matches('/').to_string(),
            model: config.ai_model.clone(),
        }
    }

    pub async fn generate_response(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ChatbotError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt.to_string(),
        });
        messages.extend(history.iter().map(|entry| ChatMessage {
            role: match entry.role {
                ChatRole::User => "user",
                ChatRole::Model => "assistant",
            },
            content: entry.text(),
        }));

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting completion from {} with {} history entries", url, history.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("AI request failed: {}", e);
                ChatbotError::Ai(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("AI API returned {}: {}", status, body);
            return Err(ChatbotError::Ai(format!("HTTP {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatbotError::Ai(format!("Invalid completion response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ChatbotError::Ai("Completion contained no text".to_string()))
    }
}
