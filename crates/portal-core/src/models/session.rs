//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A login session bound to one member and one device fingerprint.
///
/// Only the SHA-256 of the opaque session token is stored; the raw token
/// is returned to the client once, at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub member_id: Uuid,
    pub token_hash: String,
    pub fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub member_id: Uuid,
    pub token_hash: String,
    pub fingerprint: String,
    pub expires_at: DateTime<Utc>,
}
