//! Leadport Leads — the lead state machine and invoice creation.
//!
//! ```text
//! NEW --assign--> PENDING --accept--> ACCEPTED --invoice--> INVOICED --webhook--> PAID
//!  ^                 |
//!  +----decline------+
//! ```
//!
//! The final `INVOICED -> PAID` edge is driven by `leadport-billing`.

pub mod config;
pub mod service;

pub use config::LeadsConfig;
pub use service::{LeadService, SubmitLead};
