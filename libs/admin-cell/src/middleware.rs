// libs/admin-cell/src/middleware.rs
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token;

use crate::models::NewAccessLog;
use crate::services::AccessLogService;

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

/// Resource name and id from a path such as `/appointments/<uuid>/cancel`.
pub fn object_from_path(path: &str) -> (Option<String>, Option<String>) {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let object_type = segments.next().map(str::to_string);
    let object_id = segments
        .find(|s| Uuid::parse_str(s).is_ok())
        .map(str::to_string);
    (object_type, object_id)
}

fn staff_user(request: &Request<Body>, config: &AppConfig) -> Option<User> {
    if let Some(user) = request.extensions().get::<User>() {
        return Some(user.clone());
    }
    let token = bearer_token(request).ok()?;
    validate_token(token, &config.supabase_jwt_secret).ok()
}

// Records authenticated back-office requests; anonymous traffic passes through untouched
pub async fn access_log_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = staff_user(&request, &config) else {
        return next.run(request).await;
    };

    let ip_address = client_ip(request.headers());
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = request.uri().path().to_string();
    let action = format!("{} {}", request.method(), path);
    let (object_type, object_id) = object_from_path(&path);

    let response = next.run(request).await;
    let status = response.status();

    let entry = NewAccessLog {
        user_id: user.id,
        ip_address,
        user_agent,
        action,
        object_type,
        object_id,
        success: status.as_u16() < 400,
        message: (!status.is_success()).then(|| status.to_string()),
    };

    tokio::spawn(async move {
        let service = AccessLogService::new(&config);
        if let Err(e) = service.record(entry, config.service_token()).await {
            warn!("Failed to store access log: {}", e);
        }
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers), "10.0.0.2");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn object_is_taken_from_the_path() {
        let id = Uuid::new_v4().to_string();
        let (kind, object_id) = object_from_path(&format!("/appointments/{}/cancel", id));
        assert_eq!(kind.as_deref(), Some("appointments"));
        assert_eq!(object_id, Some(id));

        let (kind, object_id) = object_from_path("/admin/settings");
        assert_eq!(kind.as_deref(), Some("admin"));
        assert_eq!(object_id, None);
    }
}
