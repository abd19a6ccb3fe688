use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AdminError, AdminNotification, CreateNotificationRequest};

pub struct NotificationService {
    supabase: SupabaseClient,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_notification(
        &self,
        request: CreateNotificationRequest,
        created_by: Option<&str>,
        auth_token: &str,
    ) -> Result<AdminNotification> {
        if request.title.trim().is_empty() || request.message.trim().is_empty() {
            return Err(AdminError::ValidationError(
                "Notification title and message are required".to_string(),
            )
            .into());
        }

        let notification: AdminNotification = self
            .supabase
            .insert(
                "admin_notifications",
                auth_token,
                json!({
                    "title": request.title,
                    "message": request.message,
                    "kind": request.kind,
                    "priority": request.priority,
                    "recipients": request.recipients,
                    "read": false,
                    "active": true,
                    "action_url": request.action_url,
                    "created_by": created_by,
                    "created_at": Utc::now()
                }),
            )
            .await?;

        info!(
            notification_id = %notification.id,
            priority = ?notification.priority,
            "Admin notification created: {}", notification.title
        );
        Ok(notification)
    }

    /// Active notifications addressed to `user_id` or broadcast to all staff, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
        auth_token: &str,
    ) -> Result<Vec<AdminNotification>> {
        let mut path = format!(
            "/rest/v1/admin_notifications?active=eq.true&or=(recipients.cs.{{{}}},recipients.eq.{{}})&order=created_at.desc",
            urlencoding::encode(user_id)
        );
        if unread_only {
            path.push_str("&read=eq.false");
        }

        let notifications: Vec<AdminNotification> = self.supabase.select(&path, auth_token).await?;
        debug!("{} notifications for {}", notifications.len(), user_id);

        Ok(notifications
            .into_iter()
            .filter(|n| n.active && n.is_for(user_id))
            .collect())
    }

    pub async fn mark_read(&self, notification_id: Uuid, auth_token: &str) -> Result<AdminNotification> {
        let filter = format!("id=eq.{}", notification_id);
        let mut rows: Vec<AdminNotification> = self
            .supabase
            .update("admin_notifications", &filter, auth_token, json!({ "read": true }))
            .await?;
        if rows.is_empty() {
            return Err(AdminError::NotificationNotFound.into());
        }
        Ok(rows.remove(0))
    }
}
