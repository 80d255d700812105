//! Requirement domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub notes: String,
    /// How long a completion stays valid.
    pub days_valid_for: u32,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRequirement {
    pub name: String,
    pub description: String,
    pub notes: String,
    pub days_valid_for: u32,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequirement {
    pub name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub days_valid_for: Option<u32>,
    /// `Some(Some(id))` = cite, `Some(None)` = drop citation, `None` = no change.
    pub reference_id: Option<Option<Uuid>>,
}
