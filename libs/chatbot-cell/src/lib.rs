pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod utils;

pub use error::ChatbotError;
pub use models::*;
pub use router::{chatbot_routes, ChatbotState};
pub use services::*;
