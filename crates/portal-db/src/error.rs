//! Database-specific error types and conversions.

use portal_core::error::{EntityKind, PortalError};

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A statement in a query (or a transaction block) failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt record: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: String },
}

impl DbError {
    pub(crate) fn query(err: impl ToString) -> Self {
        DbError::Query(err.to_string())
    }

    pub(crate) fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        DbError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a failed write hit a `UNIQUE` index.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Query(msg) => msg.contains("already contains"),
            DbError::Surreal(err) => err.to_string().contains("already contains"),
            _ => false,
        }
    }
}

impl From<DbError> for PortalError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PortalError::NotFound { entity, id },
            other => PortalError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_keeps_its_kind() {
        let err: PortalError = DbError::not_found(EntityKind::Requirement, "abc").into();
        assert!(matches!(
            err,
            PortalError::NotFound {
                entity: EntityKind::Requirement,
                ..
            }
        ));
    }

    #[test]
    fn other_errors_become_database_errors() {
        let err: PortalError = DbError::query("boom").into();
        assert!(matches!(err, PortalError::Database(_)));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn unique_violations_are_detected() {
        let err = DbError::query(
            "Database index `idx_member_username` already contains 'jdoe', with record `member:x`",
        );
        assert!(err.is_unique_violation());
        assert!(!DbError::query("parse error").is_unique_violation());
    }
}
