//! SurrealDB repository implementations.

mod member;
mod member_qualification;
mod qualification;
mod reference;
mod requirement;
mod session;

pub use member::SurrealMemberRepository;
pub use member_qualification::SurrealMemberQualificationRepository;
pub use qualification::{MAX_RECONCILE_ATTEMPTS, SurrealQualificationRepository};
pub use reference::SurrealReferenceRepository;
pub use requirement::SurrealRequirementRepository;
pub use session::SurrealSessionRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Row struct for queries projecting a single record id.
#[derive(Debug, SurrealValue)]
pub(crate) struct IdRow {
    pub(crate) record_id: String,
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_optional_uuid(field: &str, value: Option<&str>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(field, v)).transpose()
}

/// Parse and sort the ids projected by an `IdRow` query.
pub(crate) fn collect_ids(field: &str, rows: Vec<IdRow>) -> Result<Vec<Uuid>, DbError> {
    let mut ids = rows
        .iter()
        .map(|r| parse_uuid(field, &r.record_id))
        .collect::<Result<Vec<_>, _>>()?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}

pub(crate) fn total(rows: Vec<CountRow>) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}
