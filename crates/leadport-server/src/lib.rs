//! Leadport HTTP API: axum routing over the lead, billing and auth
//! services, with cookie sessions and per-client rate limiting.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use app::build_router;
pub use config::{BootstrapConfig, ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use state::AppState;
