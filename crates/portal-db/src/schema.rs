//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings, both as record ids and as weak references between tables.
//! Requirement sets hang off qualifications as relation tables so each
//! association is an individually addressable edge.

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
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Members
-- =======================================================================
DEFINE TABLE member SCHEMAFULL;
DEFINE FIELD first_name ON TABLE member TYPE string;
DEFINE FIELD last_name ON TABLE member TYPE string;
DEFINE FIELD rank ON TABLE member TYPE string \
    ASSERT $value IN ['AB', 'Amn', 'A1C', 'SrA', 'SSgt', 'TSgt', 'MSgt', \
    'SMSgt', 'CMSgt'];
DEFINE FIELD username ON TABLE member TYPE string;
DEFINE FIELD password_hash ON TABLE member TYPE string;
DEFINE FIELD supervisor_id ON TABLE member TYPE option<string>;
DEFINE FIELD admin ON TABLE member TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE member TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE member TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_member_username ON TABLE member \
    COLUMNS username UNIQUE;
DEFINE INDEX idx_member_supervisor ON TABLE member \
    COLUMNS supervisor_id;

-- =======================================================================
-- Training catalogue
-- =======================================================================
DEFINE TABLE reference SCHEMAFULL;
DEFINE FIELD name ON TABLE reference TYPE string;
DEFINE FIELD volume ON TABLE reference TYPE option<int> \
    ASSERT $value = NONE OR $value > 0;
DEFINE FIELD paragraph ON TABLE reference TYPE string;
DEFINE FIELD created_at ON TABLE reference TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE reference TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_reference_name ON TABLE reference \
    COLUMNS name UNIQUE;

DEFINE TABLE requirement SCHEMAFULL;
DEFINE FIELD name ON TABLE requirement TYPE string;
DEFINE FIELD description ON TABLE requirement TYPE string;
DEFINE FIELD notes ON TABLE requirement TYPE string DEFAULT '';
DEFINE FIELD days_valid_for ON TABLE requirement TYPE int \
    ASSERT $value > 0;
DEFINE FIELD reference_id ON TABLE requirement TYPE option<string>;
DEFINE FIELD created_at ON TABLE requirement TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE requirement TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_requirement_name ON TABLE requirement \
    COLUMNS name UNIQUE;
DEFINE INDEX idx_requirement_reference ON TABLE requirement \
    COLUMNS reference_id;

DEFINE TABLE qualification SCHEMAFULL;
DEFINE FIELD name ON TABLE qualification TYPE string;
DEFINE FIELD notes ON TABLE qualification TYPE string DEFAULT '';
DEFINE FIELD expires ON TABLE qualification TYPE bool DEFAULT false;
DEFINE FIELD expiration_days ON TABLE qualification TYPE option<int> \
    ASSERT $value = NONE OR $value > 0;
DEFINE FIELD created_at ON TABLE qualification TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE qualification TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_qualification_name ON TABLE qualification \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Assignments
-- =======================================================================
DEFINE TABLE member_qualification SCHEMAFULL;
DEFINE FIELD member_id ON TABLE member_qualification TYPE string;
DEFINE FIELD qualification_id ON TABLE member_qualification TYPE string;
DEFINE FIELD active ON TABLE member_qualification TYPE bool DEFAULT false;
DEFINE FIELD active_since ON TABLE member_qualification \
    TYPE option<datetime>;
DEFINE FIELD assigned_at ON TABLE member_qualification TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_member_qualification_pair ON TABLE member_qualification \
    COLUMNS member_id, qualification_id UNIQUE;
DEFINE INDEX idx_member_qualification_qualification \
    ON TABLE member_qualification COLUMNS qualification_id;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD member_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD fingerprint ON TABLE session TYPE string;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token_hash ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_member ON TABLE session COLUMNS member_id;
DEFINE INDEX idx_session_expires ON TABLE session COLUMNS expires_at;

-- =======================================================================
-- Graph edges (qualification -> requirement)
-- =======================================================================
DEFINE TABLE initial_requirement TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_initial_requirement_pair ON TABLE initial_requirement \
    COLUMNS in, out UNIQUE;

DEFINE TABLE recurring_requirement TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_recurring_requirement_pair ON TABLE recurring_requirement \
    COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
    {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
