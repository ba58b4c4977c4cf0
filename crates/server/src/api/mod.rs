pub mod downloads;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod songs;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
