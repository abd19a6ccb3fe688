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
    ClinicError, CreateExamRequest, CreateSpecialtyRequest, UpdateExamRequest,
    UpdateSpecialtyRequest, UpsertClinicInfoRequest,
};
use crate::services::{ClinicService, ExamService, SpecialtyService};

const MANAGERS: &[&str] = &["admin", "secretary"];

#[derive(Debug, Deserialize)]
pub struct SpecialtyQuery {
    pub active_only: Option<bool>,
}

fn map_error(err: anyhow::Error) -> AppError {
    match err.downcast::<ClinicError>() {
        Ok(clinic_err) => clinic_err.into(),
        Err(other) => AppError::Database(other.to_string()),
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_clinic_info(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let info = service
        .get_clinic_info(&state.supabase_anon_key)
        .await
        .map_err(map_error)?
        .ok_or(ClinicError::InfoNotConfigured)?;

    Ok(Json(json!(info)))
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SpecialtyQuery>,
) -> Result<Json<Value>, AppError> {
    let service = SpecialtyService::new(&state);

    let specialties = service
        .list_specialties(query.active_only.unwrap_or(true), &state.supabase_anon_key)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "specialties": specialties,
        "total": specialties.len()
    })))
}

#[axum::debug_handler]
pub async fn get_specialty(
    State(state): State<Arc<AppConfig>>,
    Path(specialty_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SpecialtyService::new(&state);

    let specialty = service
        .get_specialty(specialty_id, &state.supabase_anon_key)
        .await
        .map_err(map_error)?;

    Ok(Json(json!(specialty)))
}

#[axum::debug_handler]
pub async fn list_exams(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = ExamService::new(&state);

    let exams = service
        .list_exams(&state.supabase_anon_key)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "exams": exams,
        "total": exams.len()
    })))
}

#[axum::debug_handler]
pub async fn get_exam(
    State(state): State<Arc<AppConfig>>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ExamService::new(&state);

    let exam = service
        .get_exam(exam_id, &state.supabase_anon_key)
        .await
        .map_err(map_error)?;

    Ok(Json(json!(exam)))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn upsert_clinic_info(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertClinicInfoRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, MANAGERS)?;

    let service = ClinicService::new(&state);
    let info = service
        .upsert_clinic_info(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(info)))
}

#[axum::debug_handler]
pub async fn create_specialty(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, MANAGERS)?;

    let service = SpecialtyService::new(&state);
    let specialty = service
        .create_specialty(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(specialty)))
}

#[axum::debug_handler]
pub async fn update_specialty(
    State(state): State<Arc<AppConfig>>,
    Path(specialty_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, MANAGERS)?;

    let service = SpecialtyService::new(&state);
    let specialty = service
        .update_specialty(specialty_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(specialty)))
}

#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExamRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, MANAGERS)?;

    let service = ExamService::new(&state);
    let exam = service
        .create_exam(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(exam)))
}

#[axum::debug_handler]
pub async fn update_exam(
    State(state): State<Arc<AppConfig>>,
    Path(exam_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateExamRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, MANAGERS)?;

    let service = ExamService::new(&state);
    let exam = service
        .update_exam(exam_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(exam)))
}
