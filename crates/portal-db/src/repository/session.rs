//! SurrealDB implementation of [`SessionRepository`].

use chrono::{DateTime, Utc};
use portal_core::error::{EntityKind, PortalResult};
use portal_core::models::session::{CreateSession, Session};
use portal_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{CountRow, parse_uuid, total};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRow {
    member_id: String,
    token_hash: String,
    fingerprint: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    member_id: String,
    token_hash: String,
    fingerprint: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

fn row_to_session(row: SessionRow, id: Uuid) -> Result<Session, DbError> {
    Ok(Session {
        id,
        member_id: parse_uuid("member", &row.member_id)?,
        token_hash: row.token_hash,
        fingerprint: row.fingerprint,
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            id: parse_uuid("session", &self.record_id)?,
            member_id: parse_uuid("member", &self.member_id)?,
            token_hash: self.token_hash,
            fingerprint: self.fingerprint,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> PortalResult<Session> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 member_id = $member_id, \
                 token_hash = $token_hash, \
                 fingerprint = $fingerprint, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("member_id", input.member_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("fingerprint", input.fingerprint))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Session, id_str))?;

        Ok(row_to_session(row, id)?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> PortalResult<Session> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        // The hash itself stays out of error messages and logs.
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Session, "token"))?;

        Ok(row.try_into_session()?)
    }

    async fn exists_for_member(&self, member_id: Uuid, token_hash: &str) -> PortalResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE member_id = $member_id AND token_hash = $token_hash GROUP ALL",
            )
            .bind(("member_id", member_id.to_string()))
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total(rows) > 0)
    }

    async fn delete(&self, id: Uuid) -> PortalResult<()> {
        self.db
            .query("DELETE type::record('session', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        debug!(session_id = %id, "Session deleted");
        Ok(())
    }

    async fn delete_for_member(&self, member_id: Uuid) -> PortalResult<u64> {
        let mut result = self
            .db
            .query("DELETE session WHERE member_id = $member_id RETURN BEFORE")
            .bind(("member_id", member_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> PortalResult<u64> {
        let mut result = self
            .db
            .query("DELETE session WHERE expires_at <= $now RETURN BEFORE")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
