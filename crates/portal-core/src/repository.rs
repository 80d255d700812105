//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async and return [`PortalResult`].
//! Implementations live in `portal-db`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PortalResult;
use crate::models::{
    member::{CreateMember, Member, UpdateMember},
    member_qualification::{MemberQualification, UpdateMemberQualification},
    qualification::{CreateQualification, Qualification, UpdateQualification},
    reference::{CreateReference, Reference, UpdateReference},
    requirement::{CreateRequirement, Requirement, UpdateRequirement},
    session::{CreateSession, Session},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Personnel
// ---------------------------------------------------------------------------

pub trait MemberRepository: Send + Sync {
    /// Fails with `Duplicate(Username)` or `SupervisorNotFound`.
    fn create(&self, input: CreateMember) -> impl Future<Output = PortalResult<Member>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = PortalResult<Member>> + Send;
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = PortalResult<Member>> + Send;
    /// Looks up by id when `identifier` parses as a UUID, else by username.
    fn get_by_identifier(
        &self,
        identifier: &str,
    ) -> impl Future<Output = PortalResult<Member>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = PortalResult<PaginatedResult<Member>>> + Send;
    fn list_subordinates(
        &self,
        supervisor_id: Uuid,
    ) -> impl Future<Output = PortalResult<Vec<Member>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateMember,
    ) -> impl Future<Output = PortalResult<Member>> + Send;
    /// Clears subordinates' supervisor and drops the member's sessions and
    /// assignments along with the member.
    fn delete(&self, id: Uuid) -> impl Future<Output = PortalResult<()>> + Send;
    fn delete_by_username(&self, username: &str) -> impl Future<Output = PortalResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Training catalogue
// ---------------------------------------------------------------------------

pub trait QualificationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateQualification,
    ) -> impl Future<Output = PortalResult<Qualification>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = PortalResult<Qualification>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = PortalResult<PaginatedResult<Qualification>>> + Send;
    /// Merges scalars and reconciles both requirement sets atomically.
    fn update(
        &self,
        id: Uuid,
        input: UpdateQualification,
    ) -> impl Future<Output = PortalResult<Qualification>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = PortalResult<()>> + Send;
}

pub trait RequirementRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRequirement,
    ) -> impl Future<Output = PortalResult<Requirement>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = PortalResult<Requirement>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = PortalResult<PaginatedResult<Requirement>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateRequirement,
    ) -> impl Future<Output = PortalResult<Requirement>> + Send;
    /// Fails with `RequirementInUse` while any qualification lists it.
    fn delete(&self, id: Uuid) -> impl Future<Output = PortalResult<()>> + Send;
    /// Qualifications listing the requirement as initial or recurring, sorted.
    fn qualification_ids_for(
        &self,
        requirement_id: Uuid,
    ) -> impl Future<Output = PortalResult<Vec<Uuid>>> + Send;
}

pub trait ReferenceRepository: Send + Sync {
    fn create(
        &self,
        input: CreateReference,
    ) -> impl Future<Output = PortalResult<Reference>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = PortalResult<Reference>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = PortalResult<PaginatedResult<Reference>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateReference,
    ) -> impl Future<Output = PortalResult<Reference>> + Send;
    /// Citing requirements lose their `reference_id`.
    fn delete(&self, id: Uuid) -> impl Future<Output = PortalResult<()>> + Send;
}

pub trait MemberQualificationRepository: Send + Sync {
    /// Fails with `AlreadyAssigned` when the pair exists.
    fn assign(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
    ) -> impl Future<Output = PortalResult<MemberQualification>> + Send;
    fn get(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
    ) -> impl Future<Output = PortalResult<MemberQualification>> + Send;
    fn list_for_member(
        &self,
        member_id: Uuid,
    ) -> impl Future<Output = PortalResult<Vec<MemberQualification>>> + Send;
    fn update(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
        input: UpdateMemberQualification,
    ) -> impl Future<Output = PortalResult<MemberQualification>> + Send;
    fn remove(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
    ) -> impl Future<Output = PortalResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = PortalResult<Session>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = PortalResult<Session>> + Send;
    fn exists_for_member(
        &self,
        member_id: Uuid,
        token_hash: &str,
    ) -> impl Future<Output = PortalResult<bool>> + Send;
    /// Deleting a missing session is not an error.
    fn delete(&self, id: Uuid) -> impl Future<Output = PortalResult<()>> + Send;
    fn delete_for_member(&self, member_id: Uuid) -> impl Future<Output = PortalResult<u64>> + Send;
    /// Removes sessions expiring at or before `now`; returns how many.
    fn delete_expired(&self, now: DateTime<Utc>)
    -> impl Future<Output = PortalResult<u64>> + Send;
}
