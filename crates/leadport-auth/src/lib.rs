//! Leadport Auth — password login, opaque cookie sessions and role guards.

pub mod config;
pub mod error;
pub mod password;
pub mod principal;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use principal::AuthenticatedUser;
pub use service::{AuthService, LoginInput, LoginOutput, RegisterInput};
