// libs/chatbot-cell/src/handlers.rs
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::error::ChatbotError;
use crate::models::{RoutingFilters, UpdateRoutingRequest, VerifyQuery, WebhookPayload};
use crate::router::ChatbotState;
use crate::services::conversation::ConversationService;
use crate::services::reminder::ReminderService;
use crate::services::routing::RoutingService;
use crate::services::webhook::{verify_signature, verify_subscription, WebhookProcessor, SIGNATURE_HEADER};

const FRONT_DESK: &[&str] = &["admin", "secretary"];
const STAFF: &[&str] = &["admin", "secretary", "doctor"];

fn map_error(err: anyhow::Error) -> AppError {
    match err.downcast::<ChatbotError>() {
        Ok(chatbot_err) => chatbot_err.into(),
        Err(other) => AppError::Database(other.to_string()),
    }
}

// ==============================================================================
// WEBHOOK
// ==============================================================================

#[axum::debug_handler]
pub async fn verify_webhook(
    State(state): State<ChatbotState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    match verify_subscription(&query, &state.config.whatsapp_verify_token) {
        Some(challenge) => {
            info!("WhatsApp webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("WhatsApp webhook verification rejected");
            (StatusCode::FORBIDDEN, "Verification failed").into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn receive_webhook(
    State(state): State<ChatbotState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    verify_signature(state.config.whatsapp_app_secret.as_deref(), signature, &body)?;

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Ignoring malformed webhook body: {}", err);
            return Ok(Json(json!({ "status": "ignored" })));
        }
    };

    let processor = WebhookProcessor::new(&state.config, state.store.clone());
    let processed = processor.handle_payload(&payload).await;
    debug!("Webhook delivery handled, {} messages answered", processed);

    Ok(Json(json!({
        "status": "ok",
        "processed": processed
    })))
}

// ==============================================================================
// CONVERSATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<ChatbotState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let service = ConversationService::new(&state.config, state.store.clone());
    let conversations = service.list_conversations().await?;

    Ok(Json(json!({
        "conversations": conversations,
        "total": conversations.len()
    })))
}

#[axum::debug_handler]
pub async fn get_conversation(
    State(state): State<ChatbotState>,
    Path(user_number): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let service = ConversationService::new(&state.config, state.store.clone());
    let summary = service.get_conversation_summary(&user_number).await?;

    Ok(Json(json!({
        "user_number": user_number,
        "summary": summary
    })))
}

#[axum::debug_handler]
pub async fn reset_conversation(
    State(state): State<ChatbotState>,
    Path(user_number): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let service = ConversationService::new(&state.config, state.store.clone());
    service.reset_conversation(&user_number).await?;

    Ok(Json(json!({
        "user_number": user_number,
        "reset": true
    })))
}

// ==============================================================================
// ROUTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_routings(
    State(state): State<ChatbotState>,
    Query(filters): Query<RoutingFilters>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let routing_service = RoutingService::new(&state.config);
    let routings = routing_service
        .list_routings(filters.status, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "routings": routings,
        "total": routings.len()
    })))
}

#[axum::debug_handler]
pub async fn update_routing(
    State(state): State<ChatbotState>,
    Path(routing_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateRoutingRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let routing_service = RoutingService::new(&state.config);
    let routing = routing_service
        .update_routing_status(routing_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(routing)))
}

// ==============================================================================
// REMINDERS
// ==============================================================================

#[axum::debug_handler]
pub async fn dispatch_reminders(
    State(state): State<ChatbotState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let reminder_service = ReminderService::new(&state.config);
    let report = reminder_service
        .send_due_reminders(auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(report)))
}
