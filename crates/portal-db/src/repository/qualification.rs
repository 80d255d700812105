//! SurrealDB implementation of [`QualificationRepository`].
//!
//! A qualification's requirement sets are stored as graph edges
//! (`qualification -> initial_requirement -> requirement`, and likewise for
//! `recurring_requirement`). Updating a qualification reconciles those edges
//! against the requested sets:
//!
//! 1. read the qualification and both edge sets
//! 2. merge the patch and compute a [`SetDiff`] per set
//! 3. apply scalars and both diffs in one transaction guarded by the snapshot
//!    read in step 1
//!
//! When the guard trips the failure is classified by re-reading, and
//! unexplained conflicts are retried up to [`MAX_RECONCILE_ATTEMPTS`] times.
//! Unchanged edges are never touched, so their record ids survive repeated
//! identical updates.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use portal_core::error::{EntityKind, PortalError, PortalResult, UniqueField};
use portal_core::merge::Merge;
use portal_core::models::qualification::{
    CreateQualification, Qualification, UpdateQualification,
};
use portal_core::reconcile::{SetDiff, normalize_ids};
use portal_core::repository::{PaginatedResult, Pagination, QualificationRepository};
use portal_core::validation::validate_new_qualification;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CountRow, IdRow, collect_ids, parse_uuid, total};
use crate::error::DbError;

/// Attempts made by [`QualificationRepository::update`] before a
/// persistent concurrent conflict is reported as a database error.
pub const MAX_RECONCILE_ATTEMPTS: u32 = 3;

#[derive(Debug, SurrealValue)]
struct QualificationRow {
    name: String,
    notes: String,
    expires: bool,
    expiration_days: Option<u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct QualificationRowWithId {
    record_id: String,
    name: String,
    notes: String,
    expires: bool,
    expiration_days: Option<u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

type EdgeSets = (Vec<Uuid>, Vec<Uuid>);

#[derive(Debug, SurrealValue)]
struct EdgeRow {
    qualification_id: String,
    requirement_id: String,
}

impl QualificationRow {
    fn into_qualification(
        self,
        id: Uuid,
        initial_requirements: Vec<Uuid>,
        recurring_requirements: Vec<Uuid>,
    ) -> Qualification {
        Qualification {
            id,
            name: self.name,
            notes: self.notes,
            expires: self.expires,
            expiration_days: self.expiration_days,
            initial_requirements,
            recurring_requirements,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Which of the two requirement sets an edge belongs to.
#[derive(Debug, Clone, Copy)]
enum Edge {
    Initial,
    Recurring,
}

impl Edge {
    fn table(self) -> &'static str {
        match self {
            Edge::Initial => "initial_requirement",
            Edge::Recurring => "recurring_requirement",
        }
    }
}

fn id_strings(ids: &[Uuid]) -> Vec<String> {
    let mut out: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    out.sort();
    out
}

fn duplicate_name(name: &str) -> PortalError {
    PortalError::Duplicate {
        field: UniqueField::QualificationName,
        value: name.to_string(),
    }
}

/// Statements relating `$qual` to every requirement in `$<param>`, failing
/// the transaction if one has gone missing.
fn relate_block(edge: Edge, param: &str) -> String {
    format!(
        "FOR $rid IN ${param} {{ \
             LET $req = type::record('requirement', $rid); \
             IF array::len((SELECT id FROM $req)) = 0 {{ THROW 'requirement not found' }}; \
             RELATE $qual->{table}->$req; \
         }}; ",
        table = edge.table(),
    )
}

/// Guard that the persisted edge set still equals `$<param>`.
fn snapshot_guard(edge: Edge, param: &str) -> String {
    format!(
        "IF array::sort((SELECT VALUE meta::id(out) FROM {table} WHERE in = $qual)) != ${param} \
         {{ THROW '{table} changed concurrently' }}; ",
        table = edge.table(),
    )
}

/// The transaction applying one reconciliation step.
fn reconcile_query(initial: &SetDiff, recurring: &SetDiff) -> String {
    let mut query = String::from(
        "BEGIN TRANSACTION; \
         LET $qual = type::record('qualification', $id); \
         IF array::len((SELECT id FROM $qual)) = 0 { THROW 'qualification not found' }; ",
    );
    query.push_str(&snapshot_guard(Edge::Initial, "initial_before"));
    query.push_str(&snapshot_guard(Edge::Recurring, "recurring_before"));
    query.push_str(
        "UPDATE $qual SET name = $name, notes = $notes, expires = $expires, \
         expiration_days = $expiration_days, updated_at = time::now(); ",
    );
    if !initial.to_remove.is_empty() {
        query.push_str(
            "DELETE initial_requirement WHERE in = $qual AND meta::id(out) IN $initial_remove; ",
        );
    }
    if !recurring.to_remove.is_empty() {
        query.push_str(
            "DELETE recurring_requirement WHERE in = $qual \
             AND meta::id(out) IN $recurring_remove; ",
        );
    }
    if !initial.to_add.is_empty() {
        query.push_str(&relate_block(Edge::Initial, "initial_add"));
    }
    if !recurring.to_add.is_empty() {
        query.push_str(&relate_block(Edge::Recurring, "recurring_add"));
    }
    query.push_str("COMMIT TRANSACTION;");
    query
}

/// SurrealDB implementation of the Qualification repository.
#[derive(Clone)]
pub struct SurrealQualificationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealQualificationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM qualification \
                 WHERE name = $name AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total(rows) > 0)
    }

    /// First id, in the given order, that names no stored requirement.
    async fn first_missing_requirement(&self, ids: &[Uuid]) -> Result<Option<Uuid>, DbError> {
        if ids.is_empty() {
            return Ok(None);
        }
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM requirement \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", id_strings(ids)))
            .await?;
        let rows: Vec<IdRow> = result.take(0)?;
        let found: HashSet<Uuid> = collect_ids("requirement", rows)?.into_iter().collect();
        Ok(ids.iter().copied().find(|id| !found.contains(id)))
    }

    async fn ensure_requirements(&self, ids: &[Uuid]) -> PortalResult<()> {
        match self.first_missing_requirement(ids).await? {
            Some(missing) => Err(DbError::not_found(EntityKind::Requirement, missing).into()),
            None => Ok(()),
        }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM qualification \
                 WHERE id = type::record('qualification', $id) GROUP ALL",
            )
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(total(rows) > 0)
    }

    /// Explain a failed transaction by re-reading state. `Ok(())` means no
    /// typed cause was found and the caller may retry.
    async fn classify_failure(
        &self,
        id: Option<Uuid>,
        name: &str,
        added: &[Uuid],
    ) -> PortalResult<()> {
        if let Some(id) = id {
            if !self.exists(id).await? {
                return Err(DbError::not_found(EntityKind::Qualification, id).into());
            }
        }
        self.ensure_requirements(added).await?;
        if self.name_taken(name, id).await? {
            return Err(duplicate_name(name));
        }
        Ok(())
    }

    /// Initial and recurring requirement ids keyed by qualification record id.
    async fn edges_for(&self, ids: &[String]) -> Result<HashMap<String, EdgeSets>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(in) AS qualification_id, meta::id(out) AS requirement_id \
                 FROM initial_requirement WHERE meta::id(in) IN $ids; \
                 SELECT meta::id(in) AS qualification_id, meta::id(out) AS requirement_id \
                 FROM recurring_requirement WHERE meta::id(in) IN $ids;",
            )
            .bind(("ids", ids.to_vec()))
            .await?;
        let initial: Vec<EdgeRow> = result.take(0)?;
        let recurring: Vec<EdgeRow> = result.take(1)?;

        let mut edges: HashMap<String, EdgeSets> = HashMap::new();
        for row in initial {
            let req = parse_uuid("requirement", &row.requirement_id)?;
            edges.entry(row.qualification_id).or_default().0.push(req);
        }
        for row in recurring {
            let req = parse_uuid("requirement", &row.requirement_id)?;
            edges.entry(row.qualification_id).or_default().1.push(req);
        }
        Ok(edges)
    }

    /// Apply scalars and both diffs in one transaction, guarded by the edge
    /// sets the diffs were computed from.
    async fn apply_reconcile(
        &self,
        target: &Qualification,
        before: &Qualification,
        initial: &SetDiff,
        recurring: &SetDiff,
    ) -> Result<(), surrealdb::Error> {
        self.db
            .query(reconcile_query(initial, recurring))
            .bind(("id", target.id.to_string()))
            .bind(("name", target.name.clone()))
            .bind(("notes", target.notes.clone()))
            .bind(("expires", target.expires))
            .bind(("expiration_days", target.expiration_days))
            .bind(("initial_before", id_strings(&before.initial_requirements)))
            .bind(("recurring_before", id_strings(&before.recurring_requirements)))
            .bind(("initial_remove", id_strings(&initial.to_remove)))
            .bind(("recurring_remove", id_strings(&recurring.to_remove)))
            .bind(("initial_add", id_strings(&initial.to_add)))
            .bind(("recurring_add", id_strings(&recurring.to_add)))
            .await?
            .check()?;
        Ok(())
    }

    /// One read-diff-write pass. `Ok(Err(cause))` means the transaction
    /// failed for no typed reason and may be retried.
    async fn try_reconcile(
        &self,
        id: Uuid,
        input: &UpdateQualification,
    ) -> PortalResult<Result<Qualification, String>> {
        let current = self.get_by_id(id).await?;
        let target = current.merge(input)?;

        if target.name != current.name && self.name_taken(&target.name, Some(id)).await? {
            return Err(duplicate_name(&target.name));
        }

        let initial = SetDiff::between(
            &current.initial_requirements,
            &target.initial_requirements,
        );
        let recurring = SetDiff::between(
            &current.recurring_requirements,
            &target.recurring_requirements,
        );
        let added: Vec<Uuid> = initial
            .to_add
            .iter()
            .chain(recurring.to_add.iter())
            .copied()
            .collect();
        self.ensure_requirements(&added).await?;

        debug!(
            qualification_id = %id,
            initial_add = initial.to_add.len(),
            initial_remove = initial.to_remove.len(),
            recurring_add = recurring.to_add.len(),
            recurring_remove = recurring.to_remove.len(),
            "Reconciling qualification requirements"
        );

        match self
            .apply_reconcile(&target, &current, &initial, &recurring)
            .await
        {
            Ok(()) => Ok(Ok(self.get_by_id(id).await?)),
            Err(e) => {
                self.classify_failure(Some(id), &target.name, &added).await?;
                warn!(qualification_id = %id, error = %e, "Qualification reconcile conflicted");
                Ok(Err(e.to_string()))
            }
        }
    }
}

fn reconcile_exhausted(id: Uuid, last_cause: &str) -> PortalError {
    PortalError::Database(format!(
        "qualification {id} update failed after {MAX_RECONCILE_ATTEMPTS} attempts: {last_cause}"
    ))
}

impl<C: Connection> QualificationRepository for SurrealQualificationRepository<C> {
    async fn create(&self, input: CreateQualification) -> PortalResult<Qualification> {
        validate_new_qualification(&input)?;
        if self.name_taken(&input.name, None).await? {
            return Err(duplicate_name(&input.name));
        }

        let initial = normalize_ids(&input.initial_requirements);
        let recurring = normalize_ids(&input.recurring_requirements);
        let added: Vec<Uuid> = initial.iter().chain(recurring.iter()).copied().collect();
        self.ensure_requirements(&added).await?;

        let id = Uuid::new_v4();
        let mut query = String::from(
            "BEGIN TRANSACTION; \
             LET $qual = type::record('qualification', $id); \
             CREATE $qual SET name = $name, notes = $notes, expires = $expires, \
             expiration_days = $expiration_days; ",
        );
        if !initial.is_empty() {
            query.push_str(&relate_block(Edge::Initial, "initial_add"));
        }
        if !recurring.is_empty() {
            query.push_str(&relate_block(Edge::Recurring, "recurring_add"));
        }
        query.push_str("COMMIT TRANSACTION;");

        let outcome = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("notes", input.notes))
            .bind(("expires", input.expires))
            .bind(("expiration_days", input.expiration_days))
            .bind(("initial_add", id_strings(&initial)))
            .bind(("recurring_add", id_strings(&recurring)))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            self.classify_failure(None, &input.name, &added).await?;
            return Err(DbError::query(e).into());
        }

        info!(qualification_id = %id, "Qualification created");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> PortalResult<Qualification> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('qualification', $id); \
                 SELECT meta::id(out) AS record_id FROM initial_requirement \
                 WHERE in = type::record('qualification', $id); \
                 SELECT meta::id(out) AS record_id FROM recurring_requirement \
                 WHERE in = type::record('qualification', $id);",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<QualificationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(EntityKind::Qualification, id_str))?;
        let initial: Vec<IdRow> = result.take(1).map_err(DbError::from)?;
        let recurring: Vec<IdRow> = result.take(2).map_err(DbError::from)?;

        Ok(row.into_qualification(
            id,
            collect_ids("requirement", initial)?,
            collect_ids("requirement", recurring)?,
        ))
    }

    async fn list(&self, pagination: Pagination) -> PortalResult<PaginatedResult<Qualification>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM qualification GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM qualification \
                 ORDER BY name ASC LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<QualificationRowWithId> = result.take(0).map_err(DbError::from)?;

        let ids: Vec<String> = rows.iter().map(|r| r.record_id.clone()).collect();
        let mut edges = self.edges_for(&ids).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let id = parse_uuid("qualification", &row.record_id)?;
                let (initial, recurring) = edges.remove(&row.record_id).unwrap_or_default();
                Ok(QualificationRow {
                    name: row.name,
                    notes: row.notes,
                    expires: row.expires,
                    expiration_days: row.expiration_days,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                }
                .into_qualification(id, normalize_ids(&initial), normalize_ids(&recurring)))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(&self, id: Uuid, input: UpdateQualification) -> PortalResult<Qualification> {
        let mut last_cause = String::new();
        for attempt in 1..=MAX_RECONCILE_ATTEMPTS {
            match self.try_reconcile(id, &input).await? {
                Ok(updated) => {
                    debug!(qualification_id = %id, attempt, "Qualification updated");
                    return Ok(updated);
                }
                Err(cause) => last_cause = cause,
            }
        }
        Err(reconcile_exhausted(id, &last_cause))
    }

    async fn delete(&self, id: Uuid) -> PortalResult<()> {
        if !self.exists(id).await? {
            return Err(DbError::not_found(EntityKind::Qualification, id).into());
        }

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $qual = type::record('qualification', $id); \
                 DELETE initial_requirement WHERE in = $qual; \
                 DELETE recurring_requirement WHERE in = $qual; \
                 DELETE member_qualification WHERE qualification_id = $id; \
                 DELETE $qual; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        info!(qualification_id = %id, "Qualification deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use portal_core::models::requirement::CreateRequirement;
    use portal_core::repository::RequirementRepository;
    use surrealdb::engine::local::{Db, Mem};

    use super::*;
    use crate::repository::SurrealRequirementRepository;

    /// In-memory DB with requirements A and B and a qualification that
    /// holds A as its only initial requirement.
    async fn setup() -> (SurrealQualificationRepository<Db>, Qualification, Uuid, Uuid) {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        crate::run_migrations(&db).await.unwrap();

        let reqs = SurrealRequirementRepository::new(db.clone());
        let mut ids = Vec::new();
        for name in ["A", "B"] {
            let r = reqs
                .create(CreateRequirement {
                    name: name.into(),
                    description: format!("requirement {name}"),
                    days_valid_for: 30,
                    ..Default::default()
                })
                .await
                .unwrap();
            ids.push(r.id);
        }

        let repo = SurrealQualificationRepository::new(db);
        let qualification = repo
            .create(CreateQualification {
                name: "Q".into(),
                notes: "orig".into(),
                initial_requirements: vec![ids[0]],
                ..Default::default()
            })
            .await
            .unwrap();
        (repo, qualification, ids[0], ids[1])
    }

    #[tokio::test]
    async fn vanished_requirement_rolls_back_the_whole_transaction() {
        let (repo, current, a, _) = setup().await;
        let missing = Uuid::new_v4();

        let mut target = current.clone();
        target.notes = "changed".into();
        target.initial_requirements = normalize_ids(&[a, missing]);
        let initial = SetDiff::between(&current.initial_requirements, &target.initial_requirements);
        assert_eq!(initial.to_add, vec![missing]);

        let result = repo
            .apply_reconcile(&target, &current, &initial, &SetDiff::default())
            .await;
        assert!(result.is_err());

        let after = repo.get_by_id(current.id).await.unwrap();
        assert_eq!(after.notes, "orig");
        assert_eq!(after.initial_requirements, vec![a]);
        assert!(after.recurring_requirements.is_empty());
    }

    #[tokio::test]
    async fn stale_snapshot_aborts_the_transaction() {
        let (repo, current, a, b) = setup().await;

        // Diff computed from a read that predates A being attached.
        let mut stale = current.clone();
        stale.initial_requirements = Vec::new();
        let mut target = current.clone();
        target.name = "Renamed".into();
        target.notes = "changed".into();
        target.initial_requirements = normalize_ids(&[a, b]);
        target.recurring_requirements = vec![b];
        let initial = SetDiff::between(&stale.initial_requirements, &target.initial_requirements);
        let recurring = SetDiff::between(
            &stale.recurring_requirements,
            &target.recurring_requirements,
        );

        let result = repo
            .apply_reconcile(&target, &stale, &initial, &recurring)
            .await;
        assert!(result.is_err());

        let after = repo.get_by_id(current.id).await.unwrap();
        assert_eq!(after.name, "Q");
        assert_eq!(after.notes, "orig");
        assert_eq!(after.initial_requirements, vec![a]);
        assert!(after.recurring_requirements.is_empty());

        // An unexplained failure leaves no typed cause to report.
        repo.classify_failure(Some(current.id), &target.name, &[a, b])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fresh_snapshot_applies_both_diffs() {
        let (repo, current, a, b) = setup().await;

        let mut target = current.clone();
        target.initial_requirements = vec![b];
        target.recurring_requirements = vec![a];
        let initial = SetDiff::between(&current.initial_requirements, &target.initial_requirements);
        let recurring = SetDiff::between(
            &current.recurring_requirements,
            &target.recurring_requirements,
        );

        repo.apply_reconcile(&target, &current, &initial, &recurring)
            .await
            .unwrap();

        let after = repo.get_by_id(current.id).await.unwrap();
        assert_eq!(after.initial_requirements, vec![b]);
        assert_eq!(after.recurring_requirements, vec![a]);
    }

    #[test]
    fn exhausted_retries_carry_the_last_cause() {
        let id = Uuid::new_v4();
        let err = reconcile_exhausted(id, "Parse error: unexpected token");
        assert!(err.is_internal());
        let message = err.to_string();
        assert!(message.contains(&id.to_string()));
        assert!(message.contains("3 attempts"));
        assert!(message.contains("Parse error: unexpected token"));
    }

    #[test]
    fn empty_diffs_issue_no_edge_statements() {
        let query = reconcile_query(&SetDiff::default(), &SetDiff::default());
        assert!(!query.contains("RELATE"));
        assert!(!query.contains("DELETE"));
        assert!(query.contains("UPDATE $qual"));
    }

    #[test]
    fn non_empty_diffs_touch_only_their_table() {
        let diff = SetDiff {
            to_remove: vec![Uuid::new_v4()],
            to_add: vec![Uuid::new_v4()],
        };
        let query = reconcile_query(&diff, &SetDiff::default());
        assert!(query.contains("DELETE initial_requirement"));
        assert!(query.contains("RELATE $qual->initial_requirement->$req"));
        assert!(!query.contains("DELETE recurring_requirement"));
        assert!(!query.contains("RELATE $qual->recurring_requirement"));
    }

    #[test]
    fn id_strings_are_sorted() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let strings = id_strings(&ids);
        assert!(strings.windows(2).all(|w| w[0] <= w[1]));
    }
}
