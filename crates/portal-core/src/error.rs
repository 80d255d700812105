//! Error types for the PORTal system.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Entity kinds that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Member,
    Qualification,
    Requirement,
    Reference,
    MemberQualification,
    Session,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Member => "member",
            EntityKind::Qualification => "qualification",
            EntityKind::Requirement => "requirement",
            EntityKind::Reference => "reference",
            EntityKind::MemberQualification => "member qualification",
            EntityKind::Session => "session",
        };
        f.write_str(name)
    }
}

/// Fields whose values must be unique across their collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    QualificationName,
    RequirementName,
    ReferenceName,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniqueField::Username => "username",
            UniqueField::QualificationName => "qualification name",
            UniqueField::RequirementName => "requirement name",
            UniqueField::ReferenceName => "reference name",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("{field} already exists: {value}")]
    Duplicate { field: UniqueField, value: String },

    #[error("qualification {qualification_id} already assigned to member {member_id}")]
    AlreadyAssigned {
        member_id: Uuid,
        qualification_id: Uuid,
    },

    #[error("requirement {requirement_id} is assigned to qualifications {qualification_ids:?}")]
    RequirementInUse {
        requirement_id: Uuid,
        qualification_ids: Vec<Uuid>,
    },

    #[error("missing required arguments: {}", fields.join(", "))]
    MissingArgs { fields: Vec<&'static str> },

    #[error("invalid update: {reason}")]
    BadUpdate { reason: String },

    #[error("password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("password exceeds maximum length of {max_bytes} bytes")]
    PasswordTooLong { max_bytes: usize },

    #[error("unable to authenticate member")]
    AuthenticationFailed,

    #[error("failed to validate session")]
    SessionValidationFailed,

    #[error("unauthorized")]
    Unauthorized,

    #[error("supervisor not found: {id}")]
    SupervisorNotFound { id: Uuid },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        PortalError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn bad_update(reason: impl Into<String>) -> Self {
        PortalError::BadUpdate {
            reason: reason.into(),
        }
    }

    /// HTTP status the API boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            PortalError::NotFound { .. } => 404,
            PortalError::Duplicate { .. }
            | PortalError::AlreadyAssigned { .. }
            | PortalError::RequirementInUse { .. }
            | PortalError::MissingArgs { .. }
            | PortalError::BadUpdate { .. }
            | PortalError::WeakPassword { .. }
            | PortalError::PasswordTooLong { .. }
            | PortalError::SupervisorNotFound { .. }
            | PortalError::InvalidInput { .. } => 400,
            PortalError::AuthenticationFailed
            | PortalError::SessionValidationFailed
            | PortalError::Unauthorized => 401,
            PortalError::Database(_) | PortalError::Crypto(_) | PortalError::Internal(_) => 500,
        }
    }

    /// Whether this error is an unexpected infrastructure failure rather
    /// than a typed, caller-correctable condition.
    pub fn is_internal(&self) -> bool {
        self.http_status() == 500
    }

    /// Message safe to hand back to a caller. Internal failures are
    /// never detailed.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(
            PortalError::not_found(EntityKind::Member, "x").http_status(),
            404
        );
        assert_eq!(
            PortalError::Duplicate {
                field: UniqueField::Username,
                value: "jdoe".into()
            }
            .http_status(),
            400
        );
        assert_eq!(PortalError::bad_update("nope").http_status(), 400);
        assert_eq!(PortalError::AuthenticationFailed.http_status(), 401);
        assert_eq!(PortalError::SessionValidationFailed.http_status(), 401);
        assert_eq!(PortalError::Unauthorized.http_status(), 401);
        assert_eq!(PortalError::Database("boom".into()).http_status(), 500);
    }

    #[test]
    fn internal_errors_are_not_detailed() {
        let err = PortalError::Database("connection reset by peer".into());
        assert!(err.is_internal());
        assert_eq!(err.public_message(), "internal server error");

        let err = PortalError::MissingArgs {
            fields: vec!["name", "description"],
        };
        assert!(!err.is_internal());
        assert_eq!(
            err.public_message(),
            "missing required arguments: name, description"
        );
    }
}
