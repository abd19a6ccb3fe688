use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn clinic_routes(state: Arc<AppConfig>) -> Router {
    // Read-only catalogue, consumed by the public site and the chatbot
    let public_routes = Router::new()
        .route("/info", get(handlers::get_clinic_info))
        .route("/specialties", get(handlers::list_specialties))
        .route("/specialties/{specialty_id}", get(handlers::get_specialty))
        .route("/exams", get(handlers::list_exams))
        .route("/exams/{exam_id}", get(handlers::get_exam));

    let protected_routes = Router::new()
        .route("/info", put(handlers::upsert_clinic_info))
        .route("/specialties", post(handlers::create_specialty))
        .route("/specialties/{specialty_id}", put(handlers::update_specialty))
        .route("/exams", post(handlers::create_exam))
        .route("/exams/{exam_id}", put(handlers::update_exam))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
