// HTTP server setup (Axum)
pub mod app;
pub mod bootstrap;
pub mod error;
pub mod extract;
pub mod routes;

pub use app::*;
pub use bootstrap::{connect_database, production_deps};
pub use error::{ApiError, ApiResult};
