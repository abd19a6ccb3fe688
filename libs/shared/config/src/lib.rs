use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub whatsapp_access_token: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_verify_token: String,
    pub whatsapp_app_secret: Option<String>,
    pub whatsapp_api_base_url: String,
    pub ai_api_key: String,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub redis_url: Option<String>,
    pub conversation_backend: String,
    pub conversation_ttl_seconds: u64,
    pub conversation_history_limit: usize,
    pub slot_duration_minutes: i64,
    pub clinic_utc_offset_hours: i32,
    pub port: u16,
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        let default_backend = if redis_url.is_some() { "redis" } else { "memory" };

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            whatsapp_access_token: required("WHATSAPP_ACCESS_TOKEN"),
            whatsapp_phone_number_id: required("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_verify_token: required("WHATSAPP_VERIFY_TOKEN"),
            whatsapp_app_secret: env::var("WHATSAPP_APP_SECRET").ok().filter(|s| !s.is_empty()),
            whatsapp_api_base_url: with_default(
                "WHATSAPP_API_BASE_URL",
                "https://graph.facebook.com/v19.0",
            ),
            ai_api_key: required("OPENAI_API_KEY"),
            ai_api_base_url: with_default("AI_API_BASE_URL", "https://api.openai.com/v1"),
            ai_model: with_default("AI_MODEL", "gpt-4o-mini"),
            conversation_backend: env::var("CONVERSATION_BACKEND")
                .unwrap_or_else(|_| default_backend.to_string()),
            redis_url,
            conversation_ttl_seconds: parsed("CONVERSATION_TTL_SECONDS", 120),
            conversation_history_limit: parsed("CONVERSATION_HISTORY_LIMIT", 20),
            slot_duration_minutes: parsed("SLOT_DURATION_MINUTES", 30),
            clinic_utc_offset_hours: parsed("CLINIC_UTC_OFFSET_HOURS", -3),
            port: parsed("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_whatsapp_configured() {
            warn!("WhatsApp credentials missing - chatbot replies will not be delivered");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_whatsapp_configured(&self) -> bool {
        !self.whatsapp_access_token.is_empty()
            && !self.whatsapp_phone_number_id.is_empty()
            && !self.whatsapp_verify_token.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.ai_api_key.is_empty() && !self.ai_model.is_empty()
    }

    /// Token used for PostgREST calls that run without a staff session (webhook, reminders).
    pub fn service_token(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }

    /// Local wall-clock offset of the clinic; working hours are expressed in it.
    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_offset(hours: i32) -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            supabase_service_role_key: String::new(),
            whatsapp_access_token: String::new(),
            whatsapp_phone_number_id: String::new(),
            whatsapp_verify_token: String::new(),
            whatsapp_app_secret: None,
            whatsapp_api_base_url: String::new(),
            ai_api_key: String::new(),
            ai_api_base_url: String::new(),
            ai_model: String::new(),
            redis_url: None,
            conversation_backend: "memory".to_string(),
            conversation_ttl_seconds: 120,
            conversation_history_limit: 20,
            slot_duration_minutes: 30,
            clinic_utc_offset_hours: hours,
            port: 3000,
        }
    }

    #[test]
    fn clinic_offset_uses_configured_hours() {
        assert_eq!(config_with_offset(-3).clinic_offset().local_minus_utc(), -3 * 3600);
        assert_eq!(config_with_offset(0).clinic_offset().local_minus_utc(), 0);
    }

    #[test]
    fn out_of_range_offsets_fall_back_to_utc() {
        assert_eq!(config_with_offset(30).clinic_offset().local_minus_utc(), 0);
        assert_eq!(config_with_offset(i32::MAX).clinic_offset().local_minus_utc(), 0);
        assert_eq!(config_with_offset(i32::MIN).clinic_offset().local_minus_utc(), 0);
    }

    #[test]
    fn service_token_prefers_the_service_role_key() {
        let mut config = config_with_offset(-3);
        assert_eq!(config.service_token(), "anon");
        config.supabase_service_role_key = "service-role".to_string();
        assert_eq!(config.service_token(), "service-role");
    }
}
