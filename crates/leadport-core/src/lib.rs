//! Leadport Core — domain models, error types and repository traits
//! shared by every other Leadport crate.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{LeadportError, LeadportResult};
