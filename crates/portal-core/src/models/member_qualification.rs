//! Member ↔ qualification assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// At most one assignment exists per (member, qualification) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberQualification {
    pub member_id: Uuid,
    pub qualification_id: Uuid,
    pub active: bool,
    pub active_since: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMemberQualification {
    pub active: Option<bool>,
    /// `Some(Some(t))` = set, `Some(None)` = clear, `None` = no change.
    pub active_since: Option<Option<DateTime<Utc>>>,
}
