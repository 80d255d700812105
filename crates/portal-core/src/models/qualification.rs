//! Qualification domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A certification a member can hold. Completing it requires the one-time
/// `initial_requirements`, and keeping it requires the periodically
/// repeated `recurring_requirements`.
///
/// `expiration_days` is `Some(n)` with `n > 0` exactly when `expires` is
/// set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Qualification {
    pub id: Uuid,
    pub name: String,
    pub notes: String,
    pub expires: bool,
    pub expiration_days: Option<u32>,
    /// Sorted, deduplicated requirement ids.
    pub initial_requirements: Vec<Uuid>,
    /// Sorted, deduplicated requirement ids.
    pub recurring_requirements: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateQualification {
    pub name: String,
    pub notes: String,
    pub expires: bool,
    pub expiration_days: Option<u32>,
    pub initial_requirements: Vec<Uuid>,
    pub recurring_requirements: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQualification {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub expires: Option<bool>,
    pub expiration_days: Option<u32>,
    /// `Some` (even empty) replaces the whole set.
    pub initial_requirements: Option<Vec<Uuid>>,
    /// `Some` (even empty) replaces the whole set.
    pub recurring_requirements: Option<Vec<Uuid>>,
}
