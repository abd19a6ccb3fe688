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

use crate::models::{
    CreateDoctorRequest, CreateUnavailabilityRequest, CreateWorkingHoursRequest, DoctorError,
    SetSpecialtiesRequest, UpdateDoctorRequest,
};
use crate::services::{DoctorService, WorkingHoursService};

#[derive(Debug, Deserialize)]
pub struct DoctorListQuery {
    pub active_only: Option<bool>,
    pub specialty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorNameQuery {
    pub name: String,
}

fn map_error(err: anyhow::Error) -> AppError {
    match err.downcast::<DoctorError>() {
        Ok(doctor_err) => doctor_err.into(),
        Err(other) => AppError::Database(other.to_string()),
    }
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctors = doctor_service
        .list_doctors(
            query.active_only.unwrap_or(true),
            query.specialty.as_deref(),
            &state.supabase_anon_key,
        )
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn search_doctor_by_name(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorNameQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .find_doctor_by_name(&query.name, &state.supabase_anon_key)
        .await
        .map_err(map_error)?
        .ok_or(DoctorError::NotFound)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .get_doctor(doctor_id, &state.supabase_anon_key)
        .await
        .map_err(map_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn list_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let hours_service = WorkingHoursService::new(&state);

    let hours = hours_service
        .list_working_hours(doctor_id, &state.supabase_anon_key)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "working_hours": hours
    })))
}

// ==============================================================================
// PROTECTED DOCTOR PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    // Only admins register new doctors
    require_role(&user, &["admin"])?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service
        .create_doctor(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service
        .update_doctor(doctor_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn set_doctor_specialties(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetSpecialtiesRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service
        .set_specialties(doctor_id, &request.specialty_ids, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// PROTECTED SCHEDULE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWorkingHoursRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let hours_service = WorkingHoursService::new(&state);
    let hours = hours_service
        .create_working_hours(doctor_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(hours)))
}

#[axum::debug_handler]
pub async fn delete_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, working_hours_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let hours_service = WorkingHoursService::new(&state);
    hours_service
        .delete_working_hours(doctor_id, working_hours_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "deleted": true,
        "id": working_hours_id
    })))
}

#[axum::debug_handler]
pub async fn list_unavailability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let hours_service = WorkingHoursService::new(&state);

    let periods = hours_service
        .list_unavailability(doctor_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "unavailability": periods
    })))
}

#[axum::debug_handler]
pub async fn create_unavailability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUnavailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin", "secretary"])?;

    let hours_service = WorkingHoursService::new(&state);
    let period = hours_service
        .create_unavailability(doctor_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(period)))
}
