use anyhow::Result;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, UpdateDoctorRequest};

const DOCTOR_SELECT: &str = "select=*,specialties:doctor_specialties(specialties(name))";

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub fn supabase(&self) -> &SupabaseClient {
        &self.supabase
    }

    /// List doctors, optionally restricted to active ones and to a specialty name.
    pub async fn list_doctors(
        &self,
        active_only: bool,
        specialty: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Doctor>> {
        let mut path = format!("/rest/v1/doctors?{}&order=name.asc", DOCTOR_SELECT);
        if active_only {
            path.push_str("&active=eq.true");
        }

        let doctors: Vec<Doctor> = self.supabase.select(&path, auth_token).await?;

        // The embedded join cannot be filtered without dropping the other specialty names.
        let doctors = match specialty {
            Some(wanted) => {
                let wanted = wanted.to_lowercase();
                doctors
                    .into_iter()
                    .filter(|d| d.specialties.iter().any(|s| s.to_lowercase() == wanted))
                    .collect()
            }
            None => doctors,
        };

        debug!("Listed {} doctors", doctors.len());
        Ok(doctors)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor> {
        let path = format!("/rest/v1/doctors?id=eq.{}&{}", doctor_id, DOCTOR_SELECT);
        self.supabase
            .select_one(&path, auth_token)
            .await?
            .ok_or_else(|| DoctorError::NotFound.into())
    }

    /// Case-insensitive partial match on the doctor's name, active doctors only.
    ///
    /// Titles such as "Dr." or "Dra." are ignored so that patient phrasing like
    /// "Dra. Helena" still resolves.
    pub async fn find_doctor_by_name(&self, name: &str, auth_token: &str) -> Result<Option<Doctor>> {
        let needle = strip_title(name);
        if needle.is_empty() {
            return Ok(None);
        }

        let path = format!(
            "/rest/v1/doctors?name=ilike.*{}*&active=eq.true&order=name.asc&{}",
            urlencoding::encode(needle),
            DOCTOR_SELECT
        );
        self.supabase.select_one(&path, auth_token).await
    }

    pub async fn create_doctor(&self, request: CreateDoctorRequest, auth_token: &str) -> Result<Doctor> {
        debug!("Creating doctor profile for CRM {}", request.crm);

        if request.name.trim().is_empty() || request.crm.trim().is_empty() {
            return Err(DoctorError::ValidationError("Name and CRM are required".to_string()).into());
        }
        if request.consultation_price < 0.0 || request.return_price.is_some_and(|p| p < 0.0) {
            return Err(DoctorError::ValidationError("Prices cannot be negative".to_string()).into());
        }

        let existing_path = format!(
            "/rest/v1/doctors?crm=eq.{}&select=id",
            urlencoding::encode(request.crm.trim())
        );
        let existing: Vec<Value> = self.supabase.select(&existing_path, auth_token).await?;
        if !existing.is_empty() {
            return Err(DoctorError::DuplicateCrm(request.crm).into());
        }

        let doctor_data = json!({
            "name": request.name.trim(),
            "crm": request.crm.trim(),
            "bio": request.bio.unwrap_or_default(),
            "education": request.education,
            "insurances": request.insurances.unwrap_or_default(),
            "accepts_private": request.accepts_private.unwrap_or(true),
            "consultation_price": request.consultation_price,
            "return_price": request.return_price,
            "payment_methods": request.payment_methods.unwrap_or_default(),
            "return_info": request.return_info.unwrap_or_default(),
            "consultation_minutes": request.consultation_minutes.unwrap_or(30),
            "active": true,
            "professional_email": request.professional_email,
            "professional_phone": request.professional_phone,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let doctor: Doctor = self.supabase.insert("doctors", auth_token, doctor_data).await?;
        info!("Doctor profile created: {} ({})", doctor.name, doctor.id);

        if request.specialty_ids.is_empty() {
            return Ok(doctor);
        }
        self.set_specialties(doctor.id, &request.specialty_ids, auth_token).await
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(education) = request.education {
            update_data.insert("education".to_string(), json!(education));
        }
        if let Some(insurances) = request.insurances {
            update_data.insert("insurances".to_string(), json!(insurances));
        }
        if let Some(accepts_private) = request.accepts_private {
            update_data.insert("accepts_private".to_string(), json!(accepts_private));
        }
        if let Some(price) = request.consultation_price {
            if price < 0.0 {
                return Err(DoctorError::ValidationError("Prices cannot be negative".to_string()).into());
            }
            update_data.insert("consultation_price".to_string(), json!(price));
        }
        if let Some(price) = request.return_price {
            if price < 0.0 {
                return Err(DoctorError::ValidationError("Prices cannot be negative".to_string()).into());
            }
            update_data.insert("return_price".to_string(), json!(price));
        }
        if let Some(methods) = request.payment_methods {
            update_data.insert("payment_methods".to_string(), json!(methods));
        }
        if let Some(info) = request.return_info {
            update_data.insert("return_info".to_string(), json!(info));
        }
        if let Some(minutes) = request.consultation_minutes {
            update_data.insert("consultation_minutes".to_string(), json!(minutes));
        }
        if let Some(active) = request.active {
            update_data.insert("active".to_string(), json!(active));
        }
        if let Some(email) = request.professional_email {
            update_data.insert("professional_email".to_string(), json!(email));
        }
        if let Some(phone) = request.professional_phone {
            update_data.insert("professional_phone".to_string(), json!(phone));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}", doctor_id);
        let updated: Vec<Value> = self
            .supabase
            .update("doctors", &filter, auth_token, Value::Object(update_data))
            .await?;

        if updated.is_empty() {
            return Err(DoctorError::NotFound.into());
        }

        // Re-read so the response carries the specialty names.
        self.get_doctor(doctor_id, auth_token).await
    }

    /// Replaces the doctor's specialty links.
    pub async fn set_specialties(
        &self,
        doctor_id: Uuid,
        specialty_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Setting {} specialties for doctor {}", specialty_ids.len(), doctor_id);

        let filter = format!("doctor_id=eq.{}", doctor_id);
        self.supabase.delete("doctor_specialties", &filter, auth_token).await?;

        if !specialty_ids.is_empty() {
            let links: Vec<Value> = specialty_ids
                .iter()
                .map(|specialty_id| json!({"doctor_id": doctor_id, "specialty_id": specialty_id}))
                .collect();

            let _: Vec<Value> = self
                .supabase
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/doctor_specialties",
                    Some(auth_token),
                    Some(Value::Array(links)),
                    Some(SupabaseClient::representation_headers()),
                )
                .await?;
        }

        self.get_doctor(doctor_id, auth_token).await
    }
}

fn strip_title(name: &str) -> &str {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    for title in ["dra.", "dr.", "dra ", "dr "] {
        if lower.starts_with(title) {
            return trimmed[title.len()..].trim();
        }
    }
    trimmed
}
