pub mod agents;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod releases;
pub mod routes;
pub mod settings;
pub mod sources;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
