//! Reference (governing document citation) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    pub id: Uuid,
    pub name: String,
    /// `None` when the document has no volume number.
    pub volume: Option<u32>,
    pub paragraph: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateReference {
    pub name: String,
    pub volume: Option<u32>,
    pub paragraph: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReference {
    pub name: Option<String>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub volume: Option<Option<u32>>,
    pub paragraph: Option<String>,
}
