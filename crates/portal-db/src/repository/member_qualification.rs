//! SurrealDB implementation of [`MemberQualificationRepository`].

use chrono::{DateTime, Utc};
use portal_core::error::{EntityKind, PortalError, PortalResult};
use portal_core::merge::Merge;
use portal_core::models::member_qualification::{
    MemberQualification, UpdateMemberQualification,
};
use portal_core::repository::MemberQualificationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_uuid, total};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AssignmentRow {
    member_id: String,
    qualification_id: String,
    active: bool,
    active_since: Option<DateTime<Utc>>,
    assigned_at: DateTime<Utc>,
}

impl AssignmentRow {
    fn try_into_assignment(self) -> Result<MemberQualification, DbError> {
        Ok(MemberQualification {
            member_id: parse_uuid("member", &self.member_id)?,
            qualification_id: parse_uuid("qualification", &self.qualification_id)?,
            active: self.active,
            active_since: self.active_since,
            assigned_at: self.assigned_at,
        })
    }
}

fn pair_id(member_id: Uuid, qualification_id: Uuid) -> String {
    format!("member={member_id},qualification={qualification_id}")
}

/// SurrealDB implementation of the member qualification repository.
#[derive(Clone)]
pub struct SurrealMemberQualificationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMemberQualificationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn ensure_parties(&self, member_id: Uuid, qualification_id: Uuid) -> PortalResult<()> {
        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM member \
                 WHERE id = type::record('member', $member_id) GROUP ALL; \
                 SELECT count() AS total FROM qualification \
                 WHERE id = type::record('qualification', $qualification_id) GROUP ALL;",
            )
            .bind(("member_id", member_id.to_string()))
            .bind(("qualification_id", qualification_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let members: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if total(members) == 0 {
            return Err(DbError::not_found(EntityKind::Member, member_id).into());
        }
        let qualifications: Vec<CountRow> = check.take(1).map_err(DbError::from)?;
        if total(qualifications) == 0 {
            return Err(DbError::not_found(EntityKind::Qualification, qualification_id).into());
        }
        Ok(())
    }

    async fn find(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
    ) -> Result<Option<MemberQualification>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM member_qualification \
                 WHERE member_id = $member_id AND qualification_id = $qualification_id",
            )
            .bind(("member_id", member_id.to_string()))
            .bind(("qualification_id", qualification_id.to_string()))
            .await?;
        let rows: Vec<AssignmentRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(AssignmentRow::try_into_assignment)
            .transpose()
    }
}

impl<C: Connection> MemberQualificationRepository for SurrealMemberQualificationRepository<C> {
    async fn assign(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
    ) -> PortalResult<MemberQualification> {
        self.ensure_parties(member_id, qualification_id).await?;

        let already = PortalError::AlreadyAssigned {
            member_id,
            qualification_id,
        };
        if self.find(member_id, qualification_id).await?.is_some() {
            return Err(already);
        }

        let result = self
            .db
            .query(
                "CREATE member_qualification SET \
                 member_id = $member_id, qualification_id = $qualification_id, \
                 active = false, active_since = NONE",
            )
            .bind(("member_id", member_id.to_string()))
            .bind(("qualification_id", qualification_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(result) => result,
            Err(e) => {
                let err = DbError::query(e);
                if err.is_unique_violation() {
                    return Err(already);
                }
                return Err(err.into());
            }
        };

        let rows: Vec<AssignmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| {
            DbError::not_found(
                EntityKind::MemberQualification,
                pair_id(member_id, qualification_id),
            )
        })?;

        info!(%member_id, %qualification_id, "Qualification assigned");
        Ok(row.try_into_assignment()?)
    }

    async fn get(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
    ) -> PortalResult<MemberQualification> {
        self.find(member_id, qualification_id).await?.ok_or_else(|| {
            DbError::not_found(
                EntityKind::MemberQualification,
                pair_id(member_id, qualification_id),
            )
            .into()
        })
    }

    async fn list_for_member(&self, member_id: Uuid) -> PortalResult<Vec<MemberQualification>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM member_qualification WHERE member_id = $member_id \
                 ORDER BY assigned_at ASC",
            )
            .bind(("member_id", member_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssignmentRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(AssignmentRow::try_into_assignment)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn update(
        &self,
        member_id: Uuid,
        qualification_id: Uuid,
        input: UpdateMemberQualification,
    ) -> PortalResult<MemberQualification> {
        let existing = self.get(member_id, qualification_id).await?;
        let merged = existing.merge(&input)?;

        let mut result = self
            .db
            .query(
                "UPDATE member_qualification SET \
                 active = $active, active_since = $active_since \
                 WHERE member_id = $member_id AND qualification_id = $qualification_id",
            )
            .bind(("member_id", member_id.to_string()))
            .bind(("qualification_id", qualification_id.to_string()))
            .bind(("active", merged.active))
            .bind(("active_since", merged.active_since))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        let rows: Vec<AssignmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| {
            DbError::not_found(
                EntityKind::MemberQualification,
                pair_id(member_id, qualification_id),
            )
        })?;

        Ok(row.try_into_assignment()?)
    }

    async fn remove(&self, member_id: Uuid, qualification_id: Uuid) -> PortalResult<()> {
        self.get(member_id, qualification_id).await?;

        self.db
            .query(
                "DELETE member_qualification \
                 WHERE member_id = $member_id AND qualification_id = $qualification_id",
            )
            .bind(("member_id", member_id.to_string()))
            .bind(("qualification_id", qualification_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        info!(%member_id, %qualification_id, "Qualification unassigned");
        Ok(())
    }
}
