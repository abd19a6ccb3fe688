pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;

pub use middleware::access_log_middleware;
pub use models::*;
pub use router::admin_routes;
pub use services::*;
