//! Domain models for Leadport.
//!
//! These are the core types shared across all crates.

pub mod invoice;
pub mod lead;
pub mod package;
pub mod purchase;
pub mod session;
pub mod tenant;
pub mod user;

use std::fmt;

/// Returned when a stored or submitted enum value has no matching variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl From<UnknownVariant> for crate::error::LeadportError {
    fn from(err: UnknownVariant) -> Self {
        crate::error::LeadportError::Validation {
            message: err.to_string(),
        }
    }
}
