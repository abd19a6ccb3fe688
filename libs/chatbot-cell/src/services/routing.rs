use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use admin_cell::models::{CreateNotificationRequest, NotificationKind, NotificationPriority};
use admin_cell::services::NotificationService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ChatbotError;
use crate::models::{NewRouting, Routing, RoutingRequestType, RoutingStatus, UpdateRoutingRequest};

/// Hand-offs from the assistant to the clinic staff.
pub struct RoutingService {
    supabase: SupabaseClient,
    notifications: NotificationService,
}

impl RoutingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            notifications: NotificationService::new(config),
        }
    }

    /// Stores the routing and raises a staff notification. A notification
    /// failure is logged and does not undo the routing.
    pub async fn create_routing(&self, routing: NewRouting, auth_token: &str) -> Result<Routing> {
        if routing.conversation_summary.trim().is_empty() {
            return Err(ChatbotError::ValidationError("Routing summary is required".to_string()).into());
        }

        let created: Routing = self
            .supabase
            .insert(
                "routings",
                auth_token,
                json!({
                    "patient_id": routing.patient_id,
                    "conversation_id": routing.conversation_id,
                    "request_type": routing.request_type,
                    "doctor_of_interest_id": routing.doctor_of_interest_id,
                    "conversation_summary": routing.conversation_summary,
                    "status": RoutingStatus::Pending,
                    "created_at": Utc::now()
                }),
            )
            .await?;

        info!(
            routing_id = %created.id,
            patient_id = %created.patient_id,
            request_type = created.request_type.as_str(),
            "Conversation routed to staff"
        );

        let priority = match created.request_type {
            RoutingRequestType::HumanRequest => NotificationPriority::High,
            _ => NotificationPriority::Medium,
        };
        let notification = CreateNotificationRequest {
            title: format!("Novo encaminhamento: {}", created.request_type.label()),
            message: created.conversation_summary.clone(),
            kind: NotificationKind::Info,
            priority,
            recipients: Vec::new(),
            action_url: Some(format!("/chatbot/routings/{}", created.id)),
        };
        if let Err(err) = self
            .notifications
            .create_notification(notification, None, auth_token)
            .await
        {
            warn!("Failed to notify staff about routing {}: {}", created.id, err);
        }

        Ok(created)
    }

    /// Newest first, optionally restricted to one status.
    pub async fn list_routings(&self, status: Option<RoutingStatus>, auth_token: &str) -> Result<Vec<Routing>> {
        let mut path = "/rest/v1/routings?order=created_at.desc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        self.supabase.select(&path, auth_token).await
    }

    pub async fn update_routing_status(
        &self,
        routing_id: Uuid,
        request: UpdateRoutingRequest,
        auth_token: &str,
    ) -> Result<Routing> {
        let mut body = json!({ "status": request.status });
        if let Some(notes) = request.notes {
            body["notes"] = json!(notes);
        }
        if request.status == RoutingStatus::Resolved {
            body["handled_at"] = json!(Utc::now());
        }

        let filter = format!("id=eq.{}", routing_id);
        let mut rows: Vec<Routing> = self
            .supabase
            .update("routings", &filter, auth_token, body)
            .await?;
        if rows.is_empty() {
            return Err(ChatbotError::RoutingNotFound.into());
        }

        info!("Routing {} moved to {}", routing_id, request.status.as_str());
        Ok(rows.remove(0))
    }
}
