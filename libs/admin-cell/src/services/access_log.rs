use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AccessLog, NewAccessLog};

pub struct AccessLogService {
    supabase: SupabaseClient,
}

impl AccessLogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn record(&self, entry: NewAccessLog, auth_token: &str) -> Result<AccessLog> {
        if entry.success {
            info!(
                user_id = %entry.user_id,
                ip_address = %entry.ip_address,
                object_type = ?entry.object_type,
                "ACCESS: {}", entry.action
            );
        } else {
            warn!(
                user_id = %entry.user_id,
                ip_address = %entry.ip_address,
                message = ?entry.message,
                "ACCESS FAILURE: {}", entry.action
            );
        }

        self.supabase
            .insert(
                "access_logs",
                auth_token,
                json!({
                    "user_id": entry.user_id,
                    "ip_address": entry.ip_address,
                    "user_agent": entry.user_agent,
                    "action": entry.action,
                    "object_type": entry.object_type,
                    "object_id": entry.object_id,
                    "success": entry.success,
                    "message": entry.message,
                    "created_at": Utc::now()
                }),
            )
            .await
    }

    pub async fn list_recent(
        &self,
        user_id: Option<&str>,
        limit: u32,
        auth_token: &str,
    ) -> Result<Vec<AccessLog>> {
        let mut path = format!(
            "/rest/v1/access_logs?order=created_at.desc&limit={}",
            limit.clamp(1, 500)
        );
        if let Some(user_id) = user_id {
            path.push_str(&format!("&user_id=eq.{}", urlencoding::encode(user_id)));
        }
        self.supabase.select(&path, auth_token).await
    }
}
