// libs/admin-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{AdminError, CreateNotificationRequest, UpsertSettingRequest};
use crate::services::{AccessLogService, NotificationService, SettingsService};

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct AccessLogQuery {
    pub user_id: Option<String>,
    pub limit: Option<u32>,
}

fn map_error(err: anyhow::Error) -> AppError {
    match err.downcast::<AdminError>() {
        Ok(admin_err) => admin_err.into(),
        Err(other) => AppError::Database(other.to_string()),
    }
}

// ==============================================================================
// SETTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_settings(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SettingsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let settings_service = SettingsService::new(&state);
    let settings = settings_service
        .list_settings(query.category.as_deref(), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "settings": settings,
        "total": settings.len()
    })))
}

#[axum::debug_handler]
pub async fn get_setting(
    State(state): State<Arc<AppConfig>>,
    Path(key): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let settings_service = SettingsService::new(&state);
    let setting = settings_service
        .get_setting(&key, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::from(AdminError::SettingNotFound(key.clone())))?;

    let typed_value = setting.typed_value()?;

    Ok(Json(json!({
        "setting": setting,
        "typed_value": typed_value
    })))
}

#[axum::debug_handler]
pub async fn upsert_setting(
    State(state): State<Arc<AppConfig>>,
    Path(key): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertSettingRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin"])?;

    let settings_service = SettingsService::new(&state);
    let setting = settings_service
        .upsert_setting(&key, request, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(setting)))
}

// ==============================================================================
// NOTIFICATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<NotificationQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let notifications = notification_service
        .list_for_user(&user.id, query.unread_only, auth.token())
        .await
        .map_err(map_error)?;

    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(json!({
        "notifications": notifications,
        "unread": unread
    })))
}

#[axum::debug_handler]
pub async fn create_notification(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin"])?;

    let notification_service = NotificationService::new(&state);
    let notification = notification_service
        .create_notification(request, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<Arc<AppConfig>>,
    Path(notification_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let notification = notification_service
        .mark_read(notification_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(notification)))
}

// ==============================================================================
// ACCESS LOG
// ==============================================================================

#[axum::debug_handler]
pub async fn list_access_logs(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AccessLogQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin"])?;

    let access_log_service = AccessLogService::new(&state);
    let logs = access_log_service
        .list_recent(query.user_id.as_deref(), query.limit.unwrap_or(100), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "logs": logs,
        "total": logs.len()
    })))
}
