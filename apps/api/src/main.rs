use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use chatbot_cell::services::{build_store, ConversationStore, InMemoryConversationStore};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    
    info!("Starting clinic API server");
    
    // Load configuration
    let config = AppConfig::from_env();

    // Chatbot sessions; a Redis outage at boot falls back to process memory
    let store: Arc<dyn ConversationStore> = match build_store(&config).await {
        Ok(store) => {
            info!("Conversation backend: {}", config.conversation_backend);
            store
        }
        Err(err) => {
            warn!("Conversation backend unavailable ({}), using in-memory sessions", err);
            Arc::new(InMemoryConversationStore::new(config.conversation_ttl_seconds))
        }
    };
    
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    
    // Create shared state
    let port = config.port;
    let state = Arc::new(config);
    
    // Build the application router
    let app = router::create_router(state, store)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);
    
    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
