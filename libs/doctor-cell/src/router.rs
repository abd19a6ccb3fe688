use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/search", get(handlers::search_doctor_by_name))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/working-hours", get(handlers::list_working_hours));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", put(handlers::update_doctor))
        .route("/{doctor_id}/specialties", put(handlers::set_doctor_specialties))
        .route("/{doctor_id}/working-hours", post(handlers::create_working_hours))
        .route(
            "/{doctor_id}/working-hours/{working_hours_id}",
            delete(handlers::delete_working_hours),
        )
        .route(
            "/{doctor_id}/unavailability",
            get(handlers::list_unavailability).post(handlers::create_unavailability),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
