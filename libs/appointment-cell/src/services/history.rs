use anyhow::Result;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentHistory, HistoryAction, NewHistoryEntry};

/// Append-only audit trail for appointments.
pub struct AppointmentHistoryService {
    supabase: SupabaseClient,
}

impl AppointmentHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn record(
        &self,
        appointment_id: Uuid,
        action: HistoryAction,
        entry: NewHistoryEntry,
        auth_token: &str,
    ) -> Result<AppointmentHistory> {
        debug!("Recording {:?} for appointment {}", action, appointment_id);

        self.supabase
            .insert(
                "appointment_history",
                auth_token,
                json!({
                    "appointment_id": appointment_id,
                    "action": action,
                    "description": entry.description,
                    "user_id": entry.user_id,
                    "previous_start_time": entry.previous_start_time,
                    "previous_doctor_id": entry.previous_doctor_id,
                }),
            )
            .await
    }

    pub async fn list(&self, appointment_id: Uuid, auth_token: &str) -> Result<Vec<AppointmentHistory>> {
        let path = format!(
            "/rest/v1/appointment_history?appointment_id=eq.{}&order=created_at.asc",
            appointment_id
        );
        self.supabase.select(&path, auth_token).await
    }
}
