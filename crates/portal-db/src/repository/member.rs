//! SurrealDB implementation of [`MemberRepository`].
//!
//! Members carry an already-hashed password; hashing and policy belong to
//! `portal-auth`. Deleting a member orphans its subordinates rather than
//! removing them.

use chrono::{DateTime, Utc};
use portal_core::error::{EntityKind, PortalError, PortalResult, UniqueField};
use portal_core::merge::Merge;
use portal_core::models::member::{CreateMember, Member, Rank, UpdateMember};
use portal_core::repository::{MemberRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid, total};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct MemberRow {
    first_name: String,
    last_name: String,
    rank: String,
    username: String,
    password_hash: String,
    supervisor_id: Option<String>,
    admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct MemberRowWithId {
    record_id: String,
    first_name: String,
    last_name: String,
    rank: String,
    username: String,
    password_hash: String,
    supervisor_id: Option<String>,
    admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_rank(s: &str) -> Result<Rank, DbError> {
    s.parse()
        .map_err(|_| DbError::Decode(format!("unknown rank: {s}")))
}

impl MemberRow {
    fn into_member(self, id: Uuid) -> Result<Member, DbError> {
        Ok(Member {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            rank: parse_rank(&self.rank)?,
            username: self.username,
            password_hash: self.password_hash,
            supervisor_id: parse_optional_uuid("supervisor", self.supervisor_id.as_deref())?,
            admin: self.admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl MemberRowWithId {
    fn try_into_member(self) -> Result<Member, DbError> {
        let id = parse_uuid("member", &self.record_id)?;
        MemberRow {
            first_name: self.first_name,
            last_name: self.last_name,
            rank: self.rank,
            username: self.username,
            password_hash: self.password_hash,
            supervisor_id: self.supervisor_id,
            admin: self.admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_member(id)
    }
}

/// SurrealDB implementation of the Member repository.
#[derive(Clone)]
pub struct SurrealMemberRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMemberRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM member \
                 WHERE id = type::record('member', $id) GROUP ALL",
            )
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total(rows) > 0)
    }

    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM member \
                 WHERE username = $username AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("username", username.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total(rows) > 0)
    }

    async fn ensure_supervisor(&self, supervisor_id: Option<Uuid>) -> PortalResult<()> {
        match supervisor_id {
            Some(id) if !self.exists(id).await? => Err(PortalError::SupervisorNotFound { id }),
            _ => Ok(()),
        }
    }
}

fn duplicate_username(username: &str) -> PortalError {
    PortalError::Duplicate {
        field: UniqueField::Username,
        value: username.to_string(),
    }
}

impl<C: Connection> MemberRepository for SurrealMemberRepository<C> {
    async fn create(&self, input: CreateMember) -> PortalResult<Member> {
        if self.username_taken(&input.username, None).await? {
            return Err(duplicate_username(&input.username));
        }
        self.ensure_supervisor(input.supervisor_id).await?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let username = input.username.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('member', $id) SET \
                 first_name = $first_name, last_name = $last_name, \
                 rank = $rank, username = $username, \
                 password_hash = $password_hash, \
                 supervisor_id = $supervisor_id, admin = $admin",
            )
            .bind(("id", id_str.clone()))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("rank", input.rank.to_string()))
            .bind(("username", input.username))
            .bind(("password_hash", input.password_hash))
            .bind(("supervisor_id", input.supervisor_id.map(|s| s.to_string())))
            .bind(("admin", input.admin))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(result) => result,
            Err(e) => {
                let err = DbError::query(e);
                if err.is_unique_violation() {
                    return Err(duplicate_username(&username));
                }
                return Err(err.into());
            }
        };

        let rows: Vec<MemberRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Member, &id_str))?;

        info!(member_id = %id, "Member created");
        Ok(row.into_member(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> PortalResult<Member> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('member', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Member, id_str))?;

        Ok(row.into_member(id)?)
    }

    async fn get_by_username(&self, username: &str) -> PortalResult<Member> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM member \
                 WHERE username = $username",
            )
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| {
            DbError::not_found(EntityKind::Member, format!("username={username}"))
        })?;

        Ok(row.try_into_member()?)
    }

    async fn get_by_identifier(&self, identifier: &str) -> PortalResult<Member> {
        match Uuid::parse_str(identifier) {
            Ok(id) => self.get_by_id(id).await,
            Err(_) => self.get_by_username(identifier).await,
        }
    }

    async fn list(&self, pagination: Pagination) -> PortalResult<PaginatedResult<Member>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM member GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM member \
                 ORDER BY last_name ASC, first_name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(MemberRowWithId::try_into_member)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_subordinates(&self, supervisor_id: Uuid) -> PortalResult<Vec<Member>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM member \
                 WHERE supervisor_id = $supervisor_id \
                 ORDER BY last_name ASC, first_name ASC",
            )
            .bind(("supervisor_id", supervisor_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(MemberRowWithId::try_into_member)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn update(&self, id: Uuid, input: UpdateMember) -> PortalResult<Member> {
        let existing = self.get_by_id(id).await?;
        let merged = existing.merge(&input)?;

        if merged.username != existing.username
            && self.username_taken(&merged.username, Some(id)).await?
        {
            return Err(duplicate_username(&merged.username));
        }
        if merged.supervisor_id != existing.supervisor_id {
            self.ensure_supervisor(merged.supervisor_id).await?;
        }

        let id_str = id.to_string();
        let result = self
            .db
            .query(
                "UPDATE type::record('member', $id) SET \
                 first_name = $first_name, last_name = $last_name, \
                 rank = $rank, username = $username, \
                 password_hash = $password_hash, \
                 supervisor_id = $supervisor_id, admin = $admin, \
                 updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("first_name", merged.first_name))
            .bind(("last_name", merged.last_name))
            .bind(("rank", merged.rank.to_string()))
            .bind(("username", merged.username.clone()))
            .bind(("password_hash", merged.password_hash))
            .bind(("supervisor_id", merged.supervisor_id.map(|s| s.to_string())))
            .bind(("admin", merged.admin))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(result) => result,
            Err(e) => {
                let err = DbError::query(e);
                if err.is_unique_violation() {
                    return Err(duplicate_username(&merged.username));
                }
                return Err(err.into());
            }
        };

        let rows: Vec<MemberRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Member, id_str))?;

        debug!(member_id = %id, "Member updated");
        Ok(row.into_member(id)?)
    }

    async fn delete(&self, id: Uuid) -> PortalResult<()> {
        if !self.exists(id).await? {
            return Err(DbError::not_found(EntityKind::Member, id).into());
        }

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE member SET supervisor_id = NONE, updated_at = time::now() \
                 WHERE supervisor_id = $id; \
                 DELETE session WHERE member_id = $id; \
                 DELETE member_qualification WHERE member_id = $id; \
                 DELETE type::record('member', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        info!(member_id = %id, "Member deleted");
        Ok(())
    }

    async fn delete_by_username(&self, username: &str) -> PortalResult<()> {
        let member = self.get_by_username(username).await?;
        self.delete(member.id).await
    }
}
