use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, CreateScheduleBlockRequest, ScheduleBlock};

pub struct ScheduleBlockService {
    supabase: SupabaseClient,
}

impl ScheduleBlockService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_block(
        &self,
        request: CreateScheduleBlockRequest,
        created_by: Option<&str>,
        auth_token: &str,
    ) -> Result<ScheduleBlock> {
        request.validate()?;

        let block: ScheduleBlock = self
            .supabase
            .insert(
                "schedule_blocks",
                auth_token,
                json!({
                    "doctor_id": request.doctor_id,
                    "kind": request.kind,
                    "start_time": request.start_time,
                    "end_time": request.end_time,
                    "reason": request.reason,
                    "applies_to_all_doctors": request.applies_to_all_doctors,
                    "created_by": created_by,
                }),
            )
            .await?;

        info!("Schedule block {} created ({:?})", block.id, block.kind);
        Ok(block)
    }

    /// Blocks for one doctor (including clinic-wide ones), or every block.
    pub async fn list_blocks(&self, doctor_id: Option<Uuid>, auth_token: &str) -> Result<Vec<ScheduleBlock>> {
        let path = match doctor_id {
            Some(id) => format!(
                "/rest/v1/schedule_blocks?or=(doctor_id.eq.{},applies_to_all_doctors.eq.true)&order=start_time.asc",
                id
            ),
            None => "/rest/v1/schedule_blocks?order=start_time.asc".to_string(),
        };
        self.supabase.select(&path, auth_token).await
    }

    pub async fn blocks_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<ScheduleBlock>> {
        let path = format!(
            "/rest/v1/schedule_blocks?or=(doctor_id.eq.{},applies_to_all_doctors.eq.true)&start_time=lt.{}&end_time=gt.{}",
            doctor_id,
            to.to_rfc3339_opts(SecondsFormat::Secs, true),
            from.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let blocks: Vec<ScheduleBlock> = self.supabase.select(&path, auth_token).await?;
        Ok(blocks.into_iter().filter(|b| b.affects(doctor_id)).collect())
    }

    pub async fn delete_block(&self, block_id: Uuid, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/schedule_blocks?id=eq.{}", block_id);
        let existing: Option<ScheduleBlock> = self.supabase.select_one(&path, auth_token).await?;
        if existing.is_none() {
            return Err(AppointmentError::BlockNotFound.into());
        }

        let filter = format!("id=eq.{}", block_id);
        self.supabase.delete("schedule_blocks", &filter, auth_token).await
    }
}
