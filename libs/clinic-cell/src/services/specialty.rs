use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicError, CreateSpecialtyRequest, Specialty, UpdateSpecialtyRequest};

pub struct SpecialtyService {
    supabase: SupabaseClient,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_specialties(&self, active_only: bool, auth_token: &str) -> Result<Vec<Specialty>> {
        let mut path = "/rest/v1/specialties?order=name.asc".to_string();
        if active_only {
            path.push_str("&active=eq.true");
        }
        self.supabase.select(&path, auth_token).await
    }

    pub async fn get_specialty(&self, specialty_id: Uuid, auth_token: &str) -> Result<Specialty> {
        let path = format!("/rest/v1/specialties?id=eq.{}", specialty_id);
        self.supabase
            .select_one(&path, auth_token)
            .await?
            .ok_or_else(|| ClinicError::SpecialtyNotFound.into())
    }

    async fn find_by_name(&self, name: &str, auth_token: &str) -> Result<Option<Specialty>> {
        // `ilike` without wildcards is an exact case-insensitive match.
        let path = format!(
            "/rest/v1/specialties?name=ilike.{}",
            urlencoding::encode(name)
        );
        self.supabase.select_one(&path, auth_token).await
    }

    /// Specialty names are unique regardless of case.
    pub async fn create_specialty(
        &self,
        request: CreateSpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ClinicError::ValidationError("Specialty name is required".to_string()).into());
        }

        if self.find_by_name(name, auth_token).await?.is_some() {
            return Err(ClinicError::DuplicateSpecialty(name.to_string()).into());
        }

        let specialty: Specialty = self
            .supabase
            .insert(
                "specialties",
                auth_token,
                json!({
                    "name": name,
                    "description": request.description,
                    "active": request.active.unwrap_or(true),
                }),
            )
            .await?;

        info!("Specialty created: {} ({})", specialty.name, specialty.id);
        Ok(specialty)
    }

    pub async fn update_specialty(
        &self,
        specialty_id: Uuid,
        request: UpdateSpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty> {
        debug!("Updating specialty {}", specialty_id);

        let mut data = serde_json::Map::new();
        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if let Some(existing) = self.find_by_name(&name, auth_token).await? {
                if existing.id != specialty_id {
                    return Err(ClinicError::DuplicateSpecialty(name).into());
                }
            }
            data.insert("name".to_string(), json!(name));
        }
        if let Some(description) = request.description {
            data.insert("description".to_string(), json!(description));
        }
        if let Some(active) = request.active {
            data.insert("active".to_string(), json!(active));
        }

        let filter = format!("id=eq.{}", specialty_id);
        let mut rows: Vec<Specialty> = self
            .supabase
            .update("specialties", &filter, auth_token, Value::Object(data))
            .await?;

        if rows.is_empty() {
            return Err(ClinicError::SpecialtyNotFound.into());
        }
        Ok(rows.remove(0))
    }
}

