//! Integration tests for qualification requirement reconciliation using
//! in-memory SurrealDB.

use portal_core::error::{EntityKind, PortalError, UniqueField};
use portal_core::models::qualification::{CreateQualification, UpdateQualification};
use portal_core::models::requirement::CreateRequirement;
use portal_core::reconcile::SetDiff;
use portal_core::repository::{Pagination, QualificationRepository, RequirementRepository};
use portal_db::repository::{SurrealQualificationRepository, SurrealRequirementRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

#[derive(Debug, SurrealValue)]
struct EdgeIdRow {
    record_id: String,
}

struct Fixture {
    db: Surreal<Db>,
    quals: SurrealQualificationRepository<Db>,
    a: Uuid,
    b: Uuid,
    c: Uuid,
}

/// Helper: in-memory DB with three requirements A, B and C.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portal_db::run_migrations(&db).await.unwrap();

    let reqs = SurrealRequirementRepository::new(db.clone());
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let r = reqs
            .create(CreateRequirement {
                name: name.into(),
                description: format!("requirement {name}"),
                notes: String::new(),
                days_valid_for: 365,
                reference_id: None,
            })
            .await
            .unwrap();
        ids.push(r.id);
    }

    Fixture {
        quals: SurrealQualificationRepository::new(db.clone()),
        db,
        a: ids[0],
        b: ids[1],
        c: ids[2],
    }
}

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}

async fn initial_edge_ids(db: &Surreal<Db>, qualification_id: Uuid) -> Vec<String> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id FROM initial_requirement \
             WHERE in = type::record('qualification', $id)",
        )
        .bind(("id", qualification_id.to_string()))
        .await
        .unwrap();
    let rows: Vec<EdgeIdRow> = result.take(0).unwrap();
    let mut ids: Vec<String> = rows.into_iter().map(|r| r.record_id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn create_relates_both_sets() {
    let f = setup().await;

    let q = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            initial_requirements: vec![f.a, f.b, f.a],
            recurring_requirements: vec![f.c],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(q.initial_requirements, sorted(vec![f.a, f.b]));
    assert_eq!(q.recurring_requirements, vec![f.c]);
    assert!(!q.expires);
    assert_eq!(q.expiration_days, None);
}

#[tokio::test]
async fn create_with_missing_requirement_writes_nothing() {
    let f = setup().await;
    let ghost = Uuid::new_v4();

    let err = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            initial_requirements: vec![f.a, ghost],
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::NotFound { entity: EntityKind::Requirement, ref id } if *id == ghost.to_string()
    ));

    let page = f.quals.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn reconciliation_converges_on_target() {
    let f = setup().await;
    let q = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            initial_requirements: vec![f.a, f.b],
            ..Default::default()
        })
        .await
        .unwrap();

    let updated = f
        .quals
        .update(
            q.id,
            UpdateQualification {
                initial_requirements: Some(vec![f.b, f.c]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.initial_requirements, sorted(vec![f.b, f.c]));
    assert!(updated.recurring_requirements.is_empty());

    let reread = f.quals.get_by_id(q.id).await.unwrap();
    assert_eq!(reread.initial_requirements, sorted(vec![f.b, f.c]));
}

#[tokio::test]
async fn repeated_update_leaves_edges_untouched() {
    let f = setup().await;
    let q = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            initial_requirements: vec![f.a],
            ..Default::default()
        })
        .await
        .unwrap();

    let patch = UpdateQualification {
        initial_requirements: Some(vec![f.b, f.c]),
        ..Default::default()
    };
    let first = f.quals.update(q.id, patch.clone()).await.unwrap();
    let edges_after_first = initial_edge_ids(&f.db, q.id).await;

    let second = f.quals.update(q.id, patch).await.unwrap();
    let edges_after_second = initial_edge_ids(&f.db, q.id).await;

    assert_eq!(first.initial_requirements, second.initial_requirements);
    assert!(
        SetDiff::between(&first.initial_requirements, &second.initial_requirements).is_empty()
    );
    assert_eq!(edges_after_first.len(), 2);
    assert_eq!(
        edges_after_first, edges_after_second,
        "unchanged associations must keep their edge records"
    );
}

#[tokio::test]
async fn failed_reconciliation_changes_nothing() {
    let f = setup().await;
    let q = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            notes: "original".into(),
            initial_requirements: vec![f.a],
            recurring_requirements: vec![f.b],
            ..Default::default()
        })
        .await
        .unwrap();
    let ghost = Uuid::new_v4();

    let err = f
        .quals
        .update(
            q.id,
            UpdateQualification {
                notes: Some("changed".into()),
                initial_requirements: Some(vec![f.c, ghost]),
                recurring_requirements: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::NotFound {
            entity: EntityKind::Requirement,
            ..
        }
    ));

    let after = f.quals.get_by_id(q.id).await.unwrap();
    assert_eq!(after.notes, "original");
    assert_eq!(after.initial_requirements, vec![f.a]);
    assert_eq!(after.recurring_requirements, vec![f.b]);
}

#[tokio::test]
async fn update_of_missing_qualification_is_not_found() {
    let f = setup().await;
    let err = f
        .quals
        .update(Uuid::new_v4(), UpdateQualification::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::NotFound {
            entity: EntityKind::Qualification,
            ..
        }
    ));
}

#[tokio::test]
async fn expiration_rules_apply_on_update() {
    let f = setup().await;
    let q = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            expires: true,
            expiration_days: Some(365),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = f
        .quals
        .update(
            q.id,
            UpdateQualification {
                expires: Some(false),
                expiration_days: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::BadUpdate { .. }));

    let permanent = f
        .quals
        .update(
            q.id,
            UpdateQualification {
                expires: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!permanent.expires);
    assert_eq!(permanent.expiration_days, None);
}

#[tokio::test]
async fn duplicate_name_is_rejected() {
    let f = setup().await;
    f.quals
        .create(CreateQualification {
            name: "Forklift".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let other = f
        .quals
        .create(CreateQualification {
            name: "Crane".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = f
        .quals
        .update(
            other.id,
            UpdateQualification {
                name: Some("Forklift".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::Duplicate {
            field: UniqueField::QualificationName,
            ..
        }
    ));
}

#[tokio::test]
async fn list_carries_requirement_sets() {
    let f = setup().await;
    f.quals
        .create(CreateQualification {
            name: "Crane".into(),
            recurring_requirements: vec![f.c],
            ..Default::default()
        })
        .await
        .unwrap();
    f.quals
        .create(CreateQualification {
            name: "Forklift".into(),
            initial_requirements: vec![f.a, f.b],
            ..Default::default()
        })
        .await
        .unwrap();

    let page = f.quals.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].name, "Crane");
    assert_eq!(page.items[0].recurring_requirements, vec![f.c]);
    assert_eq!(page.items[1].initial_requirements, sorted(vec![f.a, f.b]));
}

#[tokio::test]
async fn delete_removes_edges() {
    let f = setup().await;
    let q = f
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            initial_requirements: vec![f.a],
            ..Default::default()
        })
        .await
        .unwrap();

    f.quals.delete(q.id).await.unwrap();

    assert!(initial_edge_ids(&f.db, q.id).await.is_empty());
    assert!(f.quals.get_by_id(q.id).await.is_err());
}
