//! Partial-update merging.
//!
//! A patch carries only the fields a caller wants to change. Merging is
//! pure: it produces the entity that *should* be persisted, and the
//! storage engine decides how to get there.
//!
//! Field policies:
//! - text: `None` or empty keeps the current value, anything else replaces it
//! - positive counts: `Some(0)` is rejected
//! - nullable: `Some(None)` clears, `Some(Some(v))` sets
//! - id collections: `Some` replaces the whole set with its sorted, deduplicated form

use crate::error::{PortalError, PortalResult};
use crate::models::{
    member::{Member, UpdateMember},
    member_qualification::{MemberQualification, UpdateMemberQualification},
    qualification::{Qualification, UpdateQualification},
    reference::{Reference, UpdateReference},
    requirement::{Requirement, UpdateRequirement},
};
use crate::reconcile::normalize_ids;
use crate::validation::expiration_is_consistent;

pub trait Merge: Sized {
    type Patch;

    fn merge(&self, patch: &Self::Patch) -> PortalResult<Self>;
}

fn merge_text(current: &str, patch: &Option<String>) -> String {
    match patch {
        Some(value) if !value.is_empty() => value.clone(),
        _ => current.to_owned(),
    }
}

fn merge_positive(field: &str, current: u32, patch: Option<u32>) -> PortalResult<u32> {
    match patch {
        None => Ok(current),
        Some(0) => Err(PortalError::bad_update(format!("{field} must be positive"))),
        Some(n) => Ok(n),
    }
}

fn merge_nullable<T: Clone>(current: &Option<T>, patch: &Option<Option<T>>) -> Option<T> {
    match patch {
        None => current.clone(),
        Some(next) => next.clone(),
    }
}

impl Merge for Member {
    type Patch = UpdateMember;

    fn merge(&self, patch: &UpdateMember) -> PortalResult<Self> {
        let supervisor_id = merge_nullable(&self.supervisor_id, &patch.supervisor_id);
        if supervisor_id == Some(self.id) {
            return Err(PortalError::bad_update("a member cannot supervise themselves"));
        }

        Ok(Member {
            first_name: merge_text(&self.first_name, &patch.first_name),
            last_name: merge_text(&self.last_name, &patch.last_name),
            rank: patch.rank.unwrap_or(self.rank),
            username: merge_text(&self.username, &patch.username),
            password_hash: merge_text(&self.password_hash, &patch.password_hash),
            supervisor_id,
            admin: patch.admin.unwrap_or(self.admin),
            ..self.clone()
        })
    }
}

impl Merge for Qualification {
    type Patch = UpdateQualification;

    fn merge(&self, patch: &UpdateQualification) -> PortalResult<Self> {
        let (expires, expiration_days) = match (patch.expires, patch.expiration_days) {
            (Some(false), Some(_)) => {
                return Err(PortalError::bad_update(
                    "expiration_days given while disabling expiration",
                ));
            }
            (Some(false), None) => (false, None),
            (Some(true), days) => (true, days.or(self.expiration_days)),
            (None, Some(days)) if self.expires => (true, Some(days)),
            (None, Some(_)) => {
                return Err(PortalError::bad_update(
                    "expiration_days given for a qualification that does not expire",
                ));
            }
            (None, None) => (self.expires, self.expiration_days),
        };

        if !expiration_is_consistent(expires, expiration_days) {
            return Err(PortalError::bad_update(
                "an expiring qualification needs a positive expiration_days",
            ));
        }

        let initial_requirements = match &patch.initial_requirements {
            Some(ids) => normalize_ids(ids),
            None => self.initial_requirements.clone(),
        };
        let recurring_requirements = match &patch.recurring_requirements {
            Some(ids) => normalize_ids(ids),
            None => self.recurring_requirements.clone(),
        };

        Ok(Qualification {
            name: merge_text(&self.name, &patch.name),
            notes: merge_text(&self.notes, &patch.notes),
            expires,
            expiration_days,
            initial_requirements,
            recurring_requirements,
            ..self.clone()
        })
    }
}

impl Merge for Requirement {
    type Patch = UpdateRequirement;

    fn merge(&self, patch: &UpdateRequirement) -> PortalResult<Self> {
        Ok(Requirement {
            name: merge_text(&self.name, &patch.name),
            description: merge_text(&self.description, &patch.description),
            notes: merge_text(&self.notes, &patch.notes),
            days_valid_for: merge_positive(
                "days_valid_for",
                self.days_valid_for,
                patch.days_valid_for,
            )?,
            reference_id: merge_nullable(&self.reference_id, &patch.reference_id),
            ..self.clone()
        })
    }
}

impl Merge for Reference {
    type Patch = UpdateReference;

    fn merge(&self, patch: &UpdateReference) -> PortalResult<Self> {
        Ok(Reference {
            name: merge_text(&self.name, &patch.name),
            volume: merge_nullable(&self.volume, &patch.volume).filter(|v| *v != 0),
            paragraph: merge_text(&self.paragraph, &patch.paragraph),
            ..self.clone()
        })
    }
}

impl Merge for MemberQualification {
    type Patch = UpdateMemberQualification;

    fn merge(&self, patch: &UpdateMemberQualification) -> PortalResult<Self> {
        Ok(MemberQualification {
            active: patch.active.unwrap_or(self.active),
            active_since: merge_nullable(&self.active_since, &patch.active_since),
            ..self.clone()
        })
    }
}
