//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    portal_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "member",
        "qualification",
        "requirement",
        "reference",
        "member_qualification",
        "session",
        "initial_requirement",
        "recurring_requirement",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    portal_db::run_migrations(&db).await.unwrap();
    portal_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn rank_outside_the_grade_list_is_rejected() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portal_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE member SET first_name = 'A', last_name = 'B', rank = 'General', \
             username = 'ab', password_hash = 'x'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown rank should be rejected");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_usernames() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portal_db::run_migrations(&db).await.unwrap();

    let create = "CREATE member SET first_name = 'A', last_name = 'B', rank = 'SrA', \
                  username = 'dup', password_hash = 'x'";
    db.query(create).await.unwrap().check().unwrap();

    let result = db.query(create).await.unwrap().check();
    assert!(result.is_err(), "duplicate username should be rejected");
}

#[tokio::test]
async fn zero_days_valid_for_is_rejected() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portal_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE requirement SET name = 'r', description = 'd', days_valid_for = 0",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "days_valid_for must be positive");
}
