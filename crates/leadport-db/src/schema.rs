//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as their upper-case
//! wire names with ASSERT constraints for validation. UNIQUE indexes
//! back every idempotency guarantee the payment flow relies on.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant \
    COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['USER', 'AGENT', 'ADMIN'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['ACTIVE', 'DISABLED'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;
DEFINE INDEX idx_user_tenant_role ON TABLE user \
    COLUMNS tenant_id, role;

-- =======================================================================
-- Sessions (tenant scope, looked up globally by token hash)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE session TYPE string;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE option<string>;
DEFINE FIELD user_agent ON TABLE session TYPE option<string>;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_user ON TABLE session \
    COLUMNS tenant_id, user_id;

-- =======================================================================
-- Packages (tenant scope)
-- =======================================================================
DEFINE TABLE package SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE package TYPE string;
DEFINE FIELD name ON TABLE package TYPE string;
DEFINE FIELD description ON TABLE package TYPE string;
DEFINE FIELD price_cents ON TABLE package TYPE int \
    ASSERT $value > 0;
DEFINE FIELD currency ON TABLE package TYPE string;
DEFINE FIELD duration_days ON TABLE package TYPE int \
    ASSERT $value > 0;
DEFINE FIELD active ON TABLE package TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE package TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE package TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_package_tenant_name ON TABLE package \
    COLUMNS tenant_id, name UNIQUE;

-- =======================================================================
-- Leads (tenant scope)
-- =======================================================================
DEFINE TABLE lead SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE lead TYPE string;
DEFINE FIELD first_name ON TABLE lead TYPE string;
DEFINE FIELD last_name ON TABLE lead TYPE string;
DEFINE FIELD email ON TABLE lead TYPE option<string>;
DEFINE FIELD phone ON TABLE lead TYPE option<string>;
DEFINE FIELD company ON TABLE lead TYPE option<string>;
DEFINE FIELD job_title ON TABLE lead TYPE option<string>;
DEFINE FIELD notes ON TABLE lead TYPE option<string>;
DEFINE FIELD status ON TABLE lead TYPE string \
    ASSERT $value IN ['NEW', 'PENDING', 'ACCEPTED', 'INVOICED', \
    'PAID'];
DEFINE FIELD agent_id ON TABLE lead TYPE string;
DEFINE FIELD assigned_user_id ON TABLE lead TYPE option<string>;
DEFINE FIELD invoice_id ON TABLE lead TYPE option<string>;
DEFINE FIELD created_at ON TABLE lead TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE lead TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_lead_tenant_status ON TABLE lead \
    COLUMNS tenant_id, status;
DEFINE INDEX idx_lead_tenant_agent ON TABLE lead \
    COLUMNS tenant_id, agent_id;
DEFINE INDEX idx_lead_tenant_assignee ON TABLE lead \
    COLUMNS tenant_id, assigned_user_id;

-- =======================================================================
-- Invoices (tenant scope, one per lead)
-- =======================================================================
DEFINE TABLE invoice SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE invoice TYPE string;
DEFINE FIELD lead_id ON TABLE invoice TYPE string;
DEFINE FIELD user_id ON TABLE invoice TYPE string;
DEFINE FIELD amount_cents ON TABLE invoice TYPE int \
    ASSERT $value > 0;
DEFINE FIELD currency ON TABLE invoice TYPE string;
DEFINE FIELD status ON TABLE invoice TYPE string \
    ASSERT $value IN ['PENDING', 'PAID'];
DEFINE FIELD stripe_session_id ON TABLE invoice TYPE option<string>;
DEFINE FIELD paid_at ON TABLE invoice TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE invoice TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE invoice TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invoice_lead ON TABLE invoice \
    COLUMNS lead_id UNIQUE;
DEFINE INDEX idx_invoice_stripe_session ON TABLE invoice \
    COLUMNS stripe_session_id UNIQUE;
DEFINE INDEX idx_invoice_tenant_user ON TABLE invoice \
    COLUMNS tenant_id, user_id;

-- =======================================================================
-- Purchases (tenant scope, created by payment webhooks)
-- =======================================================================
DEFINE TABLE purchase SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE purchase TYPE string;
DEFINE FIELD user_id ON TABLE purchase TYPE string;
DEFINE FIELD package_id ON TABLE purchase TYPE string;
DEFINE FIELD amount_cents ON TABLE purchase TYPE int;
DEFINE FIELD status ON TABLE purchase TYPE string \
    ASSERT $value IN ['ACTIVE', 'EXPIRED', 'CANCELLED'];
DEFINE FIELD expires_at ON TABLE purchase TYPE datetime;
DEFINE FIELD stripe_session_id ON TABLE purchase TYPE string;
DEFINE FIELD created_at ON TABLE purchase TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE purchase TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_purchase_stripe_session ON TABLE purchase \
    COLUMNS stripe_session_id UNIQUE;
DEFINE INDEX idx_purchase_tenant_user_status ON TABLE purchase \
    COLUMNS tenant_id, user_id, status;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the recorded maximum, in order.
/// Returns the schema version in effect afterwards.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let applied = current_version(db).await?;
    let mut version = applied;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}': {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("recording v{}: {}", migration.version, e))
            })?;

        version = migration.version;
    }

    info!(version, "Schema up to date");
    Ok(version)
}

/// Highest applied migration version, `0` on a fresh database.
pub async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
