// libs/admin-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn admin_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/settings", get(handlers::list_settings))
        .route("/settings/{key}", get(handlers::get_setting).put(handlers::upsert_setting))
        .route("/notifications", get(handlers::list_notifications).post(handlers::create_notification))
        .route("/notifications/{notification_id}/read", post(handlers::mark_notification_read))
        .route("/access-logs", get(handlers::list_access_logs))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
