//! Member domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortalError;

/// Enlisted grade of a member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Rank {
    #[serde(rename = "AB")]
    Ab,
    #[serde(rename = "Amn")]
    Amn,
    #[serde(rename = "A1C")]
    A1c,
    #[serde(rename = "SrA")]
    SrA,
    #[serde(rename = "SSgt")]
    SSgt,
    #[serde(rename = "TSgt")]
    TSgt,
    #[serde(rename = "MSgt")]
    MSgt,
    #[serde(rename = "SMSgt")]
    SmSgt,
    #[serde(rename = "CMSgt")]
    CmSgt,
}

impl Rank {
    pub const ALL: [Rank; 9] = [
        Rank::Ab,
        Rank::Amn,
        Rank::A1c,
        Rank::SrA,
        Rank::SSgt,
        Rank::TSgt,
        Rank::MSgt,
        Rank::SmSgt,
        Rank::CmSgt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Ab => "AB",
            Rank::Amn => "Amn",
            Rank::A1c => "A1C",
            Rank::SrA => "SrA",
            Rank::SSgt => "SSgt",
            Rank::TSgt => "TSgt",
            Rank::MSgt => "MSgt",
            Rank::SmSgt => "SMSgt",
            Rank::CmSgt => "CMSgt",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| PortalError::InvalidInput {
                message: format!("unknown rank: {s}"),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub rank: Rank,
    pub username: String,
    /// Argon2id PHC string. Never leaves the service boundary.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Weak reference to the supervising member.
    pub supervisor_id: Option<Uuid>,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMember {
    pub first_name: String,
    pub last_name: String,
    pub rank: Rank,
    pub username: String,
    /// Already-hashed password; plaintext never reaches storage.
    pub password_hash: String,
    pub supervisor_id: Option<Uuid>,
    pub admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMember {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub rank: Option<Rank>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    /// `Some(Some(id))` = set, `Some(None)` = clear, `None` = no change.
    pub supervisor_id: Option<Option<Uuid>>,
    pub admin: Option<bool>,
}
