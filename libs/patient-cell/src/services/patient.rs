use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    normalize_phone, CreatePatientRequest, Patient, PatientError, PatientSearchQuery,
    UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        let whatsapp_number = normalize_phone(&request.whatsapp_number);
        debug!("Creating patient profile for: {}", whatsapp_number);

        if request.full_name.trim().is_empty() {
            return Err(PatientError::ValidationError("Full name is required".to_string()).into());
        }
        if whatsapp_number.len() < 10 {
            return Err(PatientError::ValidationError(format!(
                "Invalid WhatsApp number: {}",
                request.whatsapp_number
            ))
            .into());
        }

        if self.get_by_whatsapp(&whatsapp_number, auth_token).await?.is_some() {
            return Err(PatientError::DuplicateWhatsapp(whatsapp_number).into());
        }

        let patient_data = json!({
            "full_name": request.full_name.trim(),
            "whatsapp_number": whatsapp_number,
            "email": request.email,
            "cpf": request.cpf,
            "birth_date": request.birth_date,
            "address": request.address,
            "insurance": request.insurance,
            "medical_history": request.medical_history,
            "allergies": request.allergies,
            "continuous_medications": request.continuous_medications,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let patient: Patient = self.supabase.insert("patients", auth_token, patient_data).await?;
        info!("Patient profile created with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.supabase
            .select_one(&path, auth_token)
            .await?
            .ok_or_else(|| PatientError::NotFound.into())
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(cpf) = request.cpf {
            update_data.insert("cpf".to_string(), json!(cpf));
        }
        if let Some(birth_date) = request.birth_date {
            update_data.insert("birth_date".to_string(), json!(birth_date));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(insurance) = request.insurance {
            update_data.insert("insurance".to_string(), json!(insurance));
        }
        if let Some(history) = request.medical_history {
            update_data.insert("medical_history".to_string(), json!(history));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(medications) = request.continuous_medications {
            update_data.insert("continuous_medications".to_string(), json!(medications));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}", patient_id);
        let mut rows: Vec<Patient> = self
            .supabase
            .update("patients", &filter, auth_token, Value::Object(update_data))
            .await?;

        if rows.is_empty() {
            return Err(PatientError::NotFound.into());
        }
        Ok(rows.remove(0))
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec!["order=full_name.asc".to_string()];

        if let Some(name) = query.name.filter(|n| !n.trim().is_empty()) {
            query_parts.push(format!("full_name=ilike.*{}*", urlencoding::encode(name.trim())));
        }
        if let Some(phone) = query.phone {
            let digits = normalize_phone(&phone);
            if !digits.is_empty() {
                query_parts.push(format!("whatsapp_number=like.*{}*", digits));
            }
        }
        if let Some(cpf) = query.cpf {
            query_parts.push(format!("cpf=eq.{}", urlencoding::encode(&cpf)));
        }
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50).clamp(1, 200)));
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset.max(0)));
        }

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));
        self.supabase.select(&path, auth_token).await
    }

    pub async fn get_by_whatsapp(&self, whatsapp_number: &str, auth_token: &str) -> Result<Option<Patient>> {
        let path = format!(
            "/rest/v1/patients?whatsapp_number=eq.{}",
            normalize_phone(whatsapp_number)
        );
        self.supabase.select_one(&path, auth_token).await
    }

    /// Finds the patient behind an inbound WhatsApp number, registering a
    /// placeholder profile on first contact.
    pub async fn get_or_create_by_whatsapp(
        &self,
        whatsapp_number: &str,
        profile_name: Option<&str>,
        auth_token: &str,
    ) -> Result<Patient> {
        let number = normalize_phone(whatsapp_number);
        if let Some(patient) = self.get_by_whatsapp(&number, auth_token).await? {
            return Ok(patient);
        }

        let full_name = profile_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Paciente WhatsApp {}", number));

        let result = self
            .supabase
            .insert::<Patient>(
                "patients",
                auth_token,
                json!({
                    "full_name": full_name,
                    "whatsapp_number": number,
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339()
                }),
            )
            .await;

        match result {
            Ok(patient) => {
                info!("Registered new WhatsApp patient {}", patient.id);
                Ok(patient)
            }
            // A concurrent message from the same number may have created the row first.
            Err(err) if err.to_string().starts_with("Conflict") => {
                warn!("Patient {} was created concurrently, re-reading", number);
                self.get_by_whatsapp(&number, auth_token)
                    .await?
                    .ok_or_else(|| PatientError::NotFound.into())
            }
            Err(err) => Err(err),
        }
    }
}
