//! SurrealDB implementation of [`ReferenceRepository`].

use chrono::{DateTime, Utc};
use portal_core::error::{EntityKind, PortalError, PortalResult, UniqueField};
use portal_core::merge::Merge;
use portal_core::models::reference::{CreateReference, Reference, UpdateReference};
use portal_core::repository::{PaginatedResult, Pagination, ReferenceRepository};
use portal_core::validation::validate_new_reference;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_uuid, total};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ReferenceRow {
    name: String,
    volume: Option<u32>,
    paragraph: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ReferenceRowWithId {
    record_id: String,
    name: String,
    volume: Option<u32>,
    paragraph: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReferenceRow {
    fn into_reference(self, id: Uuid) -> Reference {
        Reference {
            id,
            name: self.name,
            volume: self.volume,
            paragraph: self.paragraph,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ReferenceRowWithId {
    fn try_into_reference(self) -> Result<Reference, DbError> {
        Ok(Reference {
            id: parse_uuid("reference", &self.record_id)?,
            name: self.name,
            volume: self.volume,
            paragraph: self.paragraph,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn duplicate_name(name: &str) -> PortalError {
    PortalError::Duplicate {
        field: UniqueField::ReferenceName,
        value: name.to_string(),
    }
}

/// SurrealDB implementation of the Reference repository.
#[derive(Clone)]
pub struct SurrealReferenceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealReferenceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM reference \
                 WHERE name = $name AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total(rows) > 0)
    }

    /// Run a CREATE or UPDATE that sets every column and return the row.
    async fn write(
        &self,
        query: &str,
        id: Uuid,
        name: String,
        volume: Option<u32>,
        paragraph: String,
    ) -> PortalResult<Reference> {
        let id_str = id.to_string();
        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("name", name.clone()))
            .bind(("volume", volume))
            .bind(("paragraph", paragraph))
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

        let rows: Vec<ReferenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Reference, id_str))?;
        Ok(row.into_reference(id))
    }
}

impl<C: Connection> ReferenceRepository for SurrealReferenceRepository<C> {
    async fn create(&self, input: CreateReference) -> PortalResult<Reference> {
        validate_new_reference(&input)?;
        if self.name_taken(&input.name, None).await? {
            return Err(duplicate_name(&input.name));
        }

        let id = Uuid::new_v4();
        let reference = self
            .write(
                "CREATE type::record('reference', $id) SET \
                 name = $name, volume = $volume, paragraph = $paragraph",
                id,
                input.name,
                input.volume.filter(|v| *v != 0),
                input.paragraph,
            )
            .await?;

        info!(reference_id = %id, "Reference created");
        Ok(reference)
    }

    async fn get_by_id(&self, id: Uuid) -> PortalResult<Reference> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('reference', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReferenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Reference, id_str))?;

        Ok(row.into_reference(id))
    }

    async fn list(&self, pagination: Pagination) -> PortalResult<PaginatedResult<Reference>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM reference GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM reference \
                 ORDER BY name ASC LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReferenceRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(ReferenceRowWithId::try_into_reference)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(&self, id: Uuid, input: UpdateReference) -> PortalResult<Reference> {
        let existing = self.get_by_id(id).await?;
        let merged = existing.merge(&input)?;

        if merged.name != existing.name && self.name_taken(&merged.name, Some(id)).await? {
            return Err(duplicate_name(&merged.name));
        }

        self.write(
            "UPDATE type::record('reference', $id) SET \
             name = $name, volume = $volume, paragraph = $paragraph, \
             updated_at = time::now()",
            id,
            merged.name,
            merged.volume,
            merged.paragraph,
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> PortalResult<()> {
        self.get_by_id(id).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE requirement SET reference_id = NONE, updated_at = time::now() \
                 WHERE reference_id = $id; \
                 DELETE type::record('reference', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        info!(reference_id = %id, "Reference deleted");
        Ok(())
    }
}
