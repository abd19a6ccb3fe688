// libs/chatbot-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::store::ConversationStore;

#[derive(Clone)]
pub struct ChatbotState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ConversationStore>,
}

pub fn chatbot_routes(config: Arc<AppConfig>, store: Arc<dyn ConversationStore>) -> Router {
    let state = ChatbotState {
        config: config.clone(),
        store,
    };

    // Meta calls the webhook without a user session.
    let public_routes = Router::new().route(
        "/webhook",
        get(handlers::verify_webhook).post(handlers::receive_webhook),
    );

    let protected_routes = Router::new()
        .route("/conversations", get(handlers::list_conversations))
        .route(
            "/conversations/{user_number}",
            get(handlers::get_conversation).delete(handlers::reset_conversation),
        )
        .route("/routings", get(handlers::list_routings))
        .route("/routings/{routing_id}", patch(handlers::update_routing))
        .route("/reminders/dispatch", post(handlers::dispatch_reminders))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
