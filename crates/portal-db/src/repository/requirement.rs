//! SurrealDB implementation of [`RequirementRepository`].
//!
//! A requirement may be listed by any number of qualifications through
//! the `initial_requirement` and `recurring_requirement` edges. Deletion is
//! refused while such an edge exists, and the refusal is re-checked inside
//! the deleting transaction.

use chrono::{DateTime, Utc};
use portal_core::error::{EntityKind, PortalError, PortalResult, UniqueField};
use portal_core::merge::Merge;
use portal_core::models::requirement::{CreateRequirement, Requirement, UpdateRequirement};
use portal_core::repository::{PaginatedResult, Pagination, RequirementRepository};
use portal_core::validation::validate_new_requirement;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::{CountRow, IdRow, collect_ids, parse_optional_uuid, parse_uuid, total};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RequirementRow {
    name: String,
    description: String,
    notes: String,
    days_valid_for: u32,
    reference_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RequirementRowWithId {
    record_id: String,
    name: String,
    description: String,
    notes: String,
    days_valid_for: u32,
    reference_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequirementRow {
    fn into_requirement(self, id: Uuid) -> Result<Requirement, DbError> {
        Ok(Requirement {
            id,
            name: self.name,
            description: self.description,
            notes: self.notes,
            days_valid_for: self.days_valid_for,
            reference_id: parse_optional_uuid("reference", self.reference_id.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RequirementRowWithId {
    fn try_into_requirement(self) -> Result<Requirement, DbError> {
        Ok(Requirement {
            id: parse_uuid("requirement", &self.record_id)?,
            name: self.name,
            description: self.description,
            notes: self.notes,
            days_valid_for: self.days_valid_for,
            reference_id: parse_optional_uuid("reference", self.reference_id.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn duplicate_name(name: &str) -> PortalError {
    PortalError::Duplicate {
        field: UniqueField::RequirementName,
        value: name.to_string(),
    }
}

/// SurrealDB implementation of the Requirement repository.
#[derive(Clone)]
pub struct SurrealRequirementRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRequirementRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM requirement \
                 WHERE name = $name AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total(rows) > 0)
    }

    async fn ensure_reference(&self, reference_id: Option<Uuid>) -> PortalResult<()> {
        let Some(reference_id) = reference_id else {
            return Ok(());
        };
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM reference \
                 WHERE id = type::record('reference', $id) GROUP ALL",
            )
            .bind(("id", reference_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        if total(rows) == 0 {
            return Err(DbError::not_found(EntityKind::Reference, reference_id).into());
        }
        Ok(())
    }

    /// Run a CREATE or UPDATE that sets every column and return the row.
    async fn write(&self, query: &str, id: Uuid, r: Requirement) -> PortalResult<Requirement> {
        let id_str = id.to_string();
        let name = r.name.clone();
        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("name", r.name))
            .bind(("description", r.description))
            .bind(("notes", r.notes))
            .bind(("days_valid_for", r.days_valid_for))
            .bind(("reference_id", r.reference_id.map(|id| id.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(result) => result,
            Err(e) => {
                let err = DbError::query(e);
                if err.is_unique_violation() {
                    return Err(duplicate_name(&name));
                }
                return Err(err.into());
            }
        };

        let rows: Vec<RequirementRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Requirement, id_str))?;
        Ok(row.into_requirement(id)?)
    }
}

impl<C: Connection> RequirementRepository for SurrealRequirementRepository<C> {
    async fn create(&self, input: CreateRequirement) -> PortalResult<Requirement> {
        validate_new_requirement(&input)?;
        if self.name_taken(&input.name, None).await? {
            return Err(duplicate_name(&input.name));
        }
        self.ensure_reference(input.reference_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let requirement = self
            .write(
                "CREATE type::record('requirement', $id) SET \
                 name = $name, description = $description, notes = $notes, \
                 days_valid_for = $days_valid_for, reference_id = $reference_id",
                id,
                Requirement {
                    id,
                    name: input.name,
                    description: input.description,
                    notes: input.notes,
                    days_valid_for: input.days_valid_for,
                    reference_id: input.reference_id,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?;

        info!(requirement_id = %id, "Requirement created");
        Ok(requirement)
    }

    async fn get_by_id(&self, id: Uuid) -> PortalResult<Requirement> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('requirement', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequirementRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Requirement, id_str))?;

        Ok(row.into_requirement(id)?)
    }

    async fn list(&self, pagination: Pagination) -> PortalResult<PaginatedResult<Requirement>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM requirement GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM requirement \
                 ORDER BY name ASC LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequirementRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(RequirementRowWithId::try_into_requirement)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(&self, id: Uuid, input: UpdateRequirement) -> PortalResult<Requirement> {
        let existing = self.get_by_id(id).await?;
        let merged = existing.merge(&input)?;

        if merged.name != existing.name && self.name_taken(&merged.name, Some(id)).await? {
            return Err(duplicate_name(&merged.name));
        }
        if merged.reference_id != existing.reference_id {
            self.ensure_reference(merged.reference_id).await?;
        }

        self.write(
            "UPDATE type::record('requirement', $id) SET \
             name = $name, description = $description, notes = $notes, \
             days_valid_for = $days_valid_for, reference_id = $reference_id, \
             updated_at = time::now()",
            id,
            merged,
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> PortalResult<()> {
        self.get_by_id(id).await?;

        let in_use = self.qualification_ids_for(id).await?;
        if !in_use.is_empty() {
            return Err(PortalError::RequirementInUse {
                requirement_id: id,
                qualification_ids: in_use,
            });
        }

        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $req = type::record('requirement', $id); \
                 IF array::len((SELECT id FROM initial_requirement WHERE out = $req)) \
                    + array::len((SELECT id FROM recurring_requirement WHERE out = $req)) > 0 \
                 { THROW 'requirement in use' }; \
                 DELETE $req; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            // A qualification picked the requirement up between the check
            // and the transaction.
            let in_use = self.qualification_ids_for(id).await?;
            if !in_use.is_empty() {
                warn!(requirement_id = %id, "Requirement became in use during delete");
                return Err(PortalError::RequirementInUse {
                    requirement_id: id,
                    qualification_ids: in_use,
                });
            }
            return Err(DbError::query(e).into());
        }

        info!(requirement_id = %id, "Requirement deleted");
        Ok(())
    }

    async fn qualification_ids_for(&self, requirement_id: Uuid) -> PortalResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(in) AS record_id FROM initial_requirement \
                 WHERE out = type::record('requirement', $id); \
                 SELECT meta::id(in) AS record_id FROM recurring_requirement \
                 WHERE out = type::record('requirement', $id);",
            )
            .bind(("id", requirement_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        let recurring: Vec<IdRow> = result.take(1).map_err(DbError::from)?;
        rows.extend(recurring);

        Ok(collect_ids("qualification", rows)?)
    }
}
