//! Integration tests for the Requirement and Reference repositories using
//! in-memory SurrealDB.

use portal_core::error::{EntityKind, PortalError, UniqueField};
use portal_core::models::qualification::{CreateQualification, UpdateQualification};
use portal_core::models::reference::{CreateReference, UpdateReference};
use portal_core::models::requirement::{CreateRequirement, UpdateRequirement};
use portal_core::repository::{
    Pagination, QualificationRepository, ReferenceRepository, RequirementRepository,
};
use portal_db::repository::{
    SurrealQualificationRepository, SurrealReferenceRepository, SurrealRequirementRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Repos {
    refs: SurrealReferenceRepository<Db>,
    reqs: SurrealRequirementRepository<Db>,
    quals: SurrealQualificationRepository<Db>,
}

async fn setup() -> Repos {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portal_db::run_migrations(&db).await.unwrap();

    Repos {
        refs: SurrealReferenceRepository::new(db.clone()),
        reqs: SurrealRequirementRepository::new(db.clone()),
        quals: SurrealQualificationRepository::new(db),
    }
}

fn requirement(name: &str, reference_id: Option<Uuid>) -> CreateRequirement {
    CreateRequirement {
        name: name.into(),
        description: "Annual refresher".into(),
        notes: String::new(),
        days_valid_for: 365,
        reference_id,
    }
}

#[tokio::test]
async fn requirement_create_validates_arguments() {
    let r = setup().await;
    let err = r
        .reqs
        .create(CreateRequirement {
            name: "Safety".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err {
        PortalError::MissingArgs { fields } => {
            assert_eq!(fields, vec!["description", "days_valid_for"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn requirement_citing_missing_reference_is_rejected() {
    let r = setup().await;
    let err = r
        .reqs
        .create(requirement("Safety", Some(Uuid::new_v4())))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::NotFound {
            entity: EntityKind::Reference,
            ..
        }
    ));
}

#[tokio::test]
async fn requirement_update_merges_fields() {
    let r = setup().await;
    let reference = r
        .refs
        .create(CreateReference {
            name: "AFI 36-2905".into(),
            volume: Some(1),
            paragraph: "2.1".into(),
        })
        .await
        .unwrap();
    let req = r
        .reqs
        .create(requirement("Safety", Some(reference.id)))
        .await
        .unwrap();

    let updated = r
        .reqs
        .update(
            req.id,
            UpdateRequirement {
                days_valid_for: Some(180),
                reference_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.days_valid_for, 180);
    assert_eq!(updated.reference_id, None);
    assert_eq!(updated.description, "Annual refresher");

    let err = r
        .reqs
        .update(
            req.id,
            UpdateRequirement {
                days_valid_for: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::BadUpdate { .. }));
}

#[tokio::test]
async fn requirement_names_are_unique() {
    let r = setup().await;
    r.reqs.create(requirement("Safety", None)).await.unwrap();
    let err = r.reqs.create(requirement("Safety", None)).await.unwrap_err();
    assert!(matches!(
        err,
        PortalError::Duplicate {
            field: UniqueField::RequirementName,
            ..
        }
    ));
}

#[tokio::test]
async fn requirement_delete_is_gated_by_qualifications() {
    let r = setup().await;
    let req = r.reqs.create(requirement("Safety", None)).await.unwrap();
    let q = r
        .quals
        .create(CreateQualification {
            name: "Forklift".into(),
            recurring_requirements: vec![req.id],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(r.reqs.qualification_ids_for(req.id).await.unwrap(), vec![q.id]);

    let err = r.reqs.delete(req.id).await.unwrap_err();
    match err {
        PortalError::RequirementInUse {
            requirement_id,
            qualification_ids,
        } => {
            assert_eq!(requirement_id, req.id);
            assert_eq!(qualification_ids, vec![q.id]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    r.quals
        .update(
            q.id,
            UpdateQualification {
                recurring_requirements: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(r.reqs.qualification_ids_for(req.id).await.unwrap().is_empty());
    r.reqs.delete(req.id).await.unwrap();
    assert!(r.reqs.get_by_id(req.id).await.is_err());
}

#[tokio::test]
async fn reference_zero_volume_is_absent() {
    let r = setup().await;
    let reference = r
        .refs
        .create(CreateReference {
            name: "AFI 36-2905".into(),
            volume: Some(0),
            paragraph: "2.1".into(),
        })
        .await
        .unwrap();
    assert_eq!(reference.volume, None);

    let updated = r
        .refs
        .update(
            reference.id,
            UpdateReference {
                volume: Some(Some(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.volume, Some(2));
    assert_eq!(updated.paragraph, "2.1");
}

#[tokio::test]
async fn reference_delete_clears_citations() {
    let r = setup().await;
    let reference = r
        .refs
        .create(CreateReference {
            name: "AFI 36-2905".into(),
            volume: None,
            paragraph: "2.1".into(),
        })
        .await
        .unwrap();
    let req = r
        .reqs
        .create(requirement("Safety", Some(reference.id)))
        .await
        .unwrap();

    r.refs.delete(reference.id).await.unwrap();

    assert!(r.refs.get_by_id(reference.id).await.is_err());
    let req = r.reqs.get_by_id(req.id).await.unwrap();
    assert_eq!(req.reference_id, None);
}

#[tokio::test]
async fn references_list_by_name() {
    let r = setup().await;
    for name in ["b-ref", "a-ref"] {
        r.refs
            .create(CreateReference {
                name: name.into(),
                volume: None,
                paragraph: "1".into(),
            })
            .await
            .unwrap();
    }

    let page = r.refs.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].name, "a-ref");
}
