//! SurrealDB repository implementations.

use surrealdb_types::SurrealValue;

mod invoice;
mod lead;
mod package;
mod purchase;
mod session;
mod tenant;
mod user;

pub use invoice::SurrealInvoiceRepository;
pub use lead::SurrealLeadRepository;
pub use package::SurrealPackageRepository;
pub use purchase::SurrealPurchaseRepository;
pub use session::SurrealSessionRepository;
pub use tenant::SurrealTenantRepository;
pub use user::{SurrealUserRepository, hash_password};

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}
