// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    AppointmentError, AppointmentFilters, CancelAppointmentRequest, CreateAppointmentRequest,
    CreateScheduleBlockRequest, RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::{ScheduleBlockService, SchedulingService};

const FRONT_DESK: &[&str] = &["admin", "secretary"];
const STAFF: &[&str] = &["admin", "secretary", "doctor"];

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct OptionalDateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct BlockQuery {
    pub doctor_id: Option<Uuid>,
}

fn map_error(err: anyhow::Error) -> AppError {
    match err.downcast::<AppointmentError>() {
        Ok(appointment_err) => appointment_err.into(),
        Err(other) => AppError::Database(other.to_string()),
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scheduling_service = SchedulingService::new(&state);

    let slots = scheduling_service
        .get_available_slots(doctor_id, query.date, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots,
        "total_slots": slots.len()
    })))
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<AppointmentFilters>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scheduling_service = SchedulingService::new(&state);

    let appointments = scheduling_service
        .list_appointments(filters, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let scheduling_service = SchedulingService::new(&state);
    let appointment = scheduling_service
        .create_appointment(request, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scheduling_service = SchedulingService::new(&state);

    let appointment = scheduling_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    // Doctors may close their own visits (completed / no-show)
    require_role(&user, STAFF)?;

    let scheduling_service = SchedulingService::new(&state);
    let appointment = scheduling_service
        .update_status(appointment_id, request.status, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let scheduling_service = SchedulingService::new(&state);
    let cancelled = scheduling_service
        .cancel_appointment(appointment_id, request.reason, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    if !cancelled {
        return Err(AppointmentError::NotFound.into());
    }

    Ok(Json(json!({
        "id": appointment_id,
        "cancelled": true
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let scheduling_service = SchedulingService::new(&state);
    let confirmed = scheduling_service
        .confirm_appointment(appointment_id, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "id": appointment_id,
        "confirmed": confirmed
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let scheduling_service = SchedulingService::new(&state);
    let appointment = scheduling_service
        .reschedule_appointment(appointment_id, request, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment_history(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scheduling_service = SchedulingService::new(&state);

    let history = scheduling_service
        .get_history(appointment_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "history": history
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(phone): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scheduling_service = SchedulingService::new(&state);

    let appointments = scheduling_service
        .get_patient_appointments(&phone, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<OptionalDateQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scheduling_service = SchedulingService::new(&state);

    let appointments = scheduling_service
        .get_doctor_appointments(doctor_id, query.date, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// SCHEDULE BLOCKS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_blocks(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<BlockQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let block_service = ScheduleBlockService::new(&state);

    let blocks = block_service
        .list_blocks(query.doctor_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "blocks": blocks })))
}

#[axum::debug_handler]
pub async fn create_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleBlockRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let block_service = ScheduleBlockService::new(&state);
    let block = block_service
        .create_block(request, Some(&user.id), auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(block)))
}

#[axum::debug_handler]
pub async fn delete_block(
    State(state): State<Arc<AppConfig>>,
    Path(block_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let block_service = ScheduleBlockService::new(&state);
    block_service
        .delete_block(block_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "id": block_id,
        "deleted": true
    })))
}
