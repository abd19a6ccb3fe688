use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub whatsapp_api_base_url: String,
    pub ai_api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            whatsapp_api_base_url: "http://localhost:54322".to_string(),
            ai_api_base_url: "http://localhost:54323".to_string(),
        }
    }
}

impl TestConfig {
    /// Points every external dependency (PostgREST, Graph API, LLM) at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            whatsapp_api_base_url: uri.to_string(),
            ai_api_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            whatsapp_access_token: "test-whatsapp-token".to_string(),
            whatsapp_phone_number_id: "1234567890".to_string(),
            whatsapp_verify_token: "test-verify-token".to_string(),
            whatsapp_app_secret: None,
            whatsapp_api_base_url: self.whatsapp_api_base_url.clone(),
            ai_api_key: "test-ai-key".to_string(),
            ai_api_base_url: self.ai_api_base_url.clone(),
            ai_model: "test-model".to_string(),
            redis_url: None,
            conversation_backend: "memory".to_string(),
            conversation_ttl_seconds: 120,
            conversation_history_limit: 20,
            slot_duration_minutes: 30,
            clinic_utc_offset_hours: -3,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "secretary".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn secretary(email: &str) -> Self {
        Self::new(email, "secretary")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for the clinic schema.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_response(doctor_id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "name": name,
            "crm": "CRM-SP 123456",
            "specialties": ["Pneumologia", "Medicina do Sono"],
            "bio": "Pneumologista com foco em distúrbios do sono",
            "education": null,
            "insurances": ["Unimed", "Bradesco"],
            "accepts_private": true,
            "consultation_price": 500.0,
            "return_price": 250.0,
            "payment_methods": "Dinheiro, Cartão, PIX",
            "return_info": "Consulta de retorno em até 30 dias incluído no valor.",
            "consultation_minutes": 30,
            "active": true,
            "professional_email": null,
            "professional_phone": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn working_hours_response(doctor_id: &str, weekday: i32, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "weekday": weekday,
            "start_time": start,
            "end_time": end,
            "active": true
        })
    }

    pub fn patient_response(patient_id: &str, whatsapp_number: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": "Maria Souza",
            "whatsapp_number": whatsapp_number,
            "email": "maria@example.com",
            "cpf": "123.456.789-00",
            "birth_date": "1985-04-12",
            "address": null,
            "insurance": "Unimed",
            "medical_history": null,
            "allergies": null,
            "continuous_medications": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(doctor_id: &str, start: &str, end: &str, status: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": null,
            "patient_name": "Maria Souza",
            "patient_phone": "5511999998888",
            "patient_email": null,
            "patient_cpf": null,
            "doctor_id": doctor_id,
            "specialty_id": null,
            "appointment_type": "consultation",
            "start_time": start,
            "end_time": end,
            "status": status,
            "reason": null,
            "notes": null,
            "insurance_used": null,
            "price": 500.0,
            "google_event_id": null,
            "confirmed_by_patient": false,
            "confirmed_at": null,
            "reminder_sent": false,
            "reminder_sent_at": null,
            "booked_via": "chatbot",
            "booked_by": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
