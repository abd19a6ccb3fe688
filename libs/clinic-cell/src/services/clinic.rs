use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicError, ClinicInfo, UpsertClinicInfoRequest};

pub struct ClinicService {
    supabase: SupabaseClient,
}

impl ClinicService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Returns the clinic profile, or `None` while it has not been filled in.
    pub async fn get_clinic_info(&self, auth_token: &str) -> Result<Option<ClinicInfo>> {
        debug!("Fetching clinic information");
        self.supabase
            .select_one("/rest/v1/clinic_info?limit=1", auth_token)
            .await
    }

    pub async fn upsert_clinic_info(
        &self,
        request: UpsertClinicInfoRequest,
        auth_token: &str,
    ) -> Result<ClinicInfo> {
        if request.name.trim().is_empty() {
            return Err(ClinicError::ValidationError("Clinic name is required".to_string()).into());
        }

        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), json!(request.name.trim()));

        let optional_fields: [(&str, Option<Value>); 11] = [
            ("general_goal", request.general_goal.map(Value::from)),
            ("secretary_name", request.secretary_name.map(Value::from)),
            ("contact_phone", request.contact_phone.map(Value::from)),
            ("whatsapp_number", request.whatsapp_number.map(Value::from)),
            ("address", request.address.map(Value::from)),
            ("location_reference", request.location_reference.map(Value::from)),
            ("scheduling_policy", request.scheduling_policy.map(Value::from)),
            ("opening_hours", request.opening_hours.map(Value::from)),
            ("accepted_insurances", request.accepted_insurances.map(|v| json!(v))),
            ("private_consultation_price", request.private_consultation_price.map(Value::from)),
            ("google_calendar_id", request.google_calendar_id.map(Value::from)),
        ];
        for (key, value) in optional_fields {
            if let Some(value) = value {
                data.insert(key.to_string(), value);
            }
        }
        data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        match self.get_clinic_info(auth_token).await? {
            Some(existing) => {
                debug!("Updating clinic information {}", existing.id);
                let filter = format!("id=eq.{}", existing.id);
                let mut rows: Vec<ClinicInfo> = self
                    .supabase
                    .update("clinic_info", &filter, auth_token, Value::Object(data))
                    .await?;
                if rows.is_empty() {
                    return Err(ClinicError::InfoNotConfigured.into());
                }
                Ok(rows.remove(0))
            }
            None => {
                info!("Creating clinic information row");
                self.supabase
                    .insert("clinic_info", auth_token, Value::Object(data))
                    .await
            }
        }
    }
}
