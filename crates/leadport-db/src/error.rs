//! Database-specific error types and conversions.

use std::str::FromStr;

use leadport_core::error::LeadportError;
use leadport_core::models::UnknownVariant;
use uuid::Uuid;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index or record id rejected the write.
    #[error("Duplicate {entity}: {detail}")]
    Duplicate { entity: String, detail: String },

    /// The storage engine aborted the transaction because a concurrent
    /// transaction touched the same rows.
    #[error("Write conflict on {entity}: {detail}")]
    WriteConflict { entity: String, detail: String },

    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl DbError {
    /// Classify a statement error raised while writing `entity`.
    ///
    /// SurrealDB reports constraint violations only through the error
    /// message, so classification is textual.
    pub fn classify(err: surrealdb::Error, entity: &str) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            DbError::Duplicate {
                entity: entity.into(),
                detail: message,
            }
        } else if message.contains("read or write conflict") || message.contains("can be retried")
        {
            DbError::WriteConflict {
                entity: entity.into(),
                detail: message,
            }
        } else {
            DbError::Surreal(err)
        }
    }
}

impl From<DbError> for LeadportError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LeadportError::NotFound { entity, id },
            DbError::Duplicate { entity, .. } => LeadportError::AlreadyExists { entity },
            DbError::WriteConflict { entity, .. } => LeadportError::Conflict {
                reason: format!("concurrent update of {entity}"),
            },
            DbError::PasswordHash(msg) => LeadportError::Crypto(msg),
            other => LeadportError::Database(other.to_string()),
        }
    }
}

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::InvalidRow(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, field: &str) -> Result<Option<Uuid>, DbError> {
    value.as_deref().map(|v| parse_uuid(v, field)).transpose()
}

pub(crate) fn parse_enum<T>(value: &str) -> Result<T, DbError>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|e: UnknownVariant| DbError::InvalidRow(e.to_string()))
}
