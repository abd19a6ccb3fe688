use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AdminError, SettingValue, SystemSetting, UpsertSettingRequest};

pub struct SettingsService {
    supabase: SupabaseClient,
}

impl SettingsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_setting(&self, key: &str, auth_token: &str) -> Result<Option<SystemSetting>> {
        let path = format!("/rest/v1/system_settings?key=eq.{}", urlencoding::encode(key));
        self.supabase.select_one(&path, auth_token).await
    }

    /// The setting converted to its declared type, or `None` when unset.
    pub async fn get_typed_value(&self, key: &str, auth_token: &str) -> Result<Option<SettingValue>> {
        let Some(setting) = self.get_setting(key, auth_token).await? else {
            return Ok(None);
        };
        Ok(Some(setting.typed_value()?))
    }

    pub async fn list_settings(&self, category: Option<&str>, auth_token: &str) -> Result<Vec<SystemSetting>> {
        let path = match category {
            Some(category) => format!(
                "/rest/v1/system_settings?category=eq.{}&order=key.asc",
                urlencoding::encode(category)
            ),
            None => "/rest/v1/system_settings?order=category.asc,key.asc".to_string(),
        };
        self.supabase.select(&path, auth_token).await
    }

    pub async fn upsert_setting(
        &self,
        key: &str,
        request: UpsertSettingRequest,
        updated_by: Option<&str>,
        auth_token: &str,
    ) -> Result<SystemSetting> {
        if key.trim().is_empty() {
            return Err(AdminError::ValidationError("Setting key is required".to_string()).into());
        }

        let existing = self.get_setting(key, auth_token).await?;

        if let Some(current) = &existing {
            if !current.editable {
                warn!("Rejected change to read-only setting {}", key);
                return Err(AdminError::SettingNotEditable(key.to_string()).into());
            }
        }

        let value_type = request
            .value_type
            .or_else(|| existing.as_ref().map(|s| s.value_type))
            .unwrap_or_default();
        SettingValue::parse(&request.value, value_type)?;

        let setting = match existing {
            Some(current) => {
                debug!("Updating setting {}", key);
                let filter = format!("key=eq.{}", urlencoding::encode(key));
                let mut rows: Vec<SystemSetting> = self
                    .supabase
                    .update(
                        "system_settings",
                        &filter,
                        auth_token,
                        json!({
                            "value": request.value,
                            "value_type": value_type,
                            "description": request.description.or(current.description),
                            "category": request.category.unwrap_or(current.category),
                            "updated_by": updated_by,
                            "updated_at": Utc::now()
                        }),
                    )
                    .await?;
                if rows.is_empty() {
                    return Err(AdminError::SettingNotFound(key.to_string()).into());
                }
                rows.remove(0)
            }
            None => {
                debug!("Creating setting {}", key);
                self.supabase
                    .insert(
                        "system_settings",
                        auth_token,
                        json!({
                            "key": key,
                            "value": request.value,
                            "value_type": value_type,
                            "description": request.description,
                            "editable": true,
                            "category": request.category.unwrap_or_else(|| "general".to_string()),
                            "updated_by": updated_by,
                            "updated_at": Utc::now()
                        }),
                    )
                    .await?
            }
        };

        info!("Setting {} saved", setting.key);
        Ok(setting)
    }
}
