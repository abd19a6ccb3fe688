use std::sync::Arc;

use axum::{
    middleware,
    Router,
    routing::get,
};

use admin_cell::middleware::access_log_middleware;
use admin_cell::router::admin_routes;
use appointment_cell::router::appointment_routes;
use chatbot_cell::router::chatbot_routes;
use chatbot_cell::services::ConversationStore;
use clinic_cell::router::clinic_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>, store: Arc<dyn ConversationStore>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/clinic", clinic_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/chatbot", chatbot_routes(state.clone(), store))
        .nest("/admin", admin_routes(state.clone()))
        // Back-office requests with a valid session are written to the access log
        .layer(middleware::from_fn_with_state(state, access_log_middleware))
}
