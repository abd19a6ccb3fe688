use std::time::Duration;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use admin_cell::middleware::access_log_middleware;
use admin_cell::models::{AdminError, SettingValue, SettingValueType, UpsertSettingRequest};
use admin_cell::router::admin_routes;
use admin_cell::services::{NotificationService, SettingsService};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn setting_row(key: &str, value: &str, value_type: &str, editable: bool) -> serde_json::Value {
    json!({
        "key": key,
        "value": value,
        "value_type": value_type,
        "description": null,
        "editable": editable,
        "category": "chatbot",
        "updated_by": null,
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn typed_value_follows_the_declared_type() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/system_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            setting_row("chatbot_enabled", "Sim", "boolean", true)
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = SettingsService::new(&config);

    let value = service.get_typed_value("chatbot_enabled", "token").await.unwrap();
    assert_eq!(value, Some(SettingValue::Boolean(true)));
}

#[tokio::test]
async fn read_only_settings_cannot_be_changed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/system_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            setting_row("clinic_timezone", "-3", "integer", false)
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/system_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = SettingsService::new(&config);

    let err = service
        .upsert_setting(
            "clinic_timezone",
            UpsertSettingRequest {
                value: "-2".into(),
                value_type: None,
                description: None,
                category: None,
            },
            Some("admin-1"),
            "token",
        )
        .await
        .unwrap_err();

    assert_matches!(err.downcast_ref::<AdminError>(), Some(AdminError::SettingNotEditable(_)));
}

#[tokio::test]
async fn new_settings_are_validated_and_inserted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/system_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/system_settings"))
        .and(body_partial_json(json!({ "key": "max_daily_bookings", "editable": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            setting_row("max_daily_bookings", "40", "integer", true)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = SettingsService::new(&config);

    let bad = service
        .upsert_setting(
            "max_daily_bookings",
            UpsertSettingRequest {
                value: "quarenta".into(),
                value_type: Some(SettingValueType::Integer),
                description: None,
                category: None,
            },
            None,
            "token",
        )
        .await
        .unwrap_err();
    assert_matches!(bad.downcast_ref::<AdminError>(), Some(AdminError::InvalidSettingValue(_)));

    let saved = service
        .upsert_setting(
            "max_daily_bookings",
            UpsertSettingRequest {
                value: "40".into(),
                value_type: Some(SettingValueType::Integer),
                description: None,
                category: Some("chatbot".into()),
            },
            None,
            "token",
        )
        .await
        .unwrap();
    assert_eq!(saved.typed_value().unwrap(), SettingValue::Integer(40));
}

#[tokio::test]
async fn notifications_for_other_users_are_filtered_out() {
    let mock_server = MockServer::start().await;
    let row = |recipients: serde_json::Value| {
        json!({
            "id": Uuid::new_v4(),
            "title": "Novo encaminhamento",
            "message": "Paciente pediu atendimento humano",
            "kind": "info",
            "priority": "high",
            "recipients": recipients,
            "read": false,
            "active": true,
            "action_url": null,
            "created_by": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    };
    Mock::given(method("GET"))
        .and(path("/rest/v1/admin_notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            row(json!([])),
            row(json!(["user-1"])),
            row(json!(["user-2"]))
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = NotificationService::new(&config);

    let notifications = service.list_for_user("user-1", false, "token").await.unwrap();
    assert_eq!(notifications.len(), 2);
}

#[tokio::test]
async fn secretaries_cannot_read_access_logs() {
    let config = TestConfig::default();
    let secretary = TestUser::secretary("ana@clinica.com");
    let token = JwtTestUtils::create_test_token(&secretary, &config.jwt_secret, None);
    let app = admin_routes(config.to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/access-logs")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn authenticated_requests_are_logged() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/access_logs"))
        .and(body_partial_json(json!({
            "action": "GET /appointments",
            "ip_address": "203.0.113.7",
            "success": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "user_id": "user-1",
            "ip_address": "203.0.113.7",
            "user_agent": null,
            "action": "GET /appointments",
            "object_type": "appointments",
            "object_id": null,
            "success": true,
            "message": null,
            "created_at": "2024-01-01T00:00:00Z"
        }])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri());
    let state = config.to_arc();
    let app = Router::new()
        .route("/appointments", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(state.clone(), access_log_middleware));

    let secretary = TestUser::secretary("ana@clinica.com");
    let token = JwtTestUtils::create_test_token(&secretary, &config.jwt_secret, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/appointments")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The log is written in the background.
    let mut logged = false;
    for _ in 0..50 {
        let requests = mock_server.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| r.url.path() == "/rest/v1/access_logs") {
            logged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(logged);
}

#[tokio::test]
async fn anonymous_requests_are_not_logged() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/access_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri());
    let state = config.to_arc();
    let app = Router::new()
        .route("/webhook", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(state, access_log_middleware));

    let response = app
        .oneshot(Request::builder().uri("/webhook").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
}
