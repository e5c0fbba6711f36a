//! Delete and drop path tests over the in-memory executor.

mod common;

use std::sync::Arc;

use common::MockExecutor;
use docrel::backend::SchemaUpdater;
use docrel::error::{DocrelError, UserError};
use docrel::{
    AttributeReference, DocValue, MetaSnapshot, PostgresDialect, PostgresErrorHandler,
    WriteTransaction, WriterConfig,
};

async fn bootstrap(executor: &mut MockExecutor) {
    let updater = SchemaUpdater::new(
        Arc::new(PostgresDialect::new()),
        PostgresErrorHandler::shared(),
    );
    updater.check_or_create(executor).await.unwrap();
}

fn new_tx(executor: MockExecutor, snapshot: MetaSnapshot) -> WriteTransaction<MockExecutor> {
    WriteTransaction::new(
        executor,
        snapshot,
        Arc::new(PostgresDialect::new()),
        PostgresErrorHandler::shared(),
        &WriterConfig::default(),
    )
}

fn order_doc(id: i32, customer: &str, tags: &[&str]) -> DocValue {
    DocValue::object([
        ("_id", DocValue::from(id)),
        ("customer", DocValue::from(customer)),
        (
            "tags",
            DocValue::Array(tags.iter().map(|t| DocValue::from(*t)).collect()),
        ),
        (
            "shipping",
            DocValue::object([("city", DocValue::from("zrh"))]),
        ),
    ])
}

#[tokio::test]
async fn test_delete_all_empties_every_doc_part() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    let docs = [
        order_doc(1, "ada", &["new", "eu"]),
        order_doc(2, "bob", &["new"]),
    ];
    tx.insert("db1", "orders", docs).await.unwrap();

    let deleted = tx.delete_all("db1", "orders").await.unwrap();
    assert_eq!(deleted, 2);
    tx.commit().await.unwrap();

    let state = state.lock().unwrap();
    for table in ["orders", "orders_tags", "orders_shipping"] {
        assert_eq!(state.row_count("db1", table), 0, "{table} must be empty");
    }
    // The catalog structure itself survives a delete.
    assert!(state.table("db1", "orders").is_some());
    assert_eq!(state.row_count("torodb", "meta_doc_part"), 3);
}

#[tokio::test]
async fn test_delete_all_on_unknown_targets_is_zero() {
    let (mut executor, _state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    assert_eq!(tx.delete_all("nope", "orders").await.unwrap(), 0);
    tx.insert("db1", "orders", [order_doc(1, "ada", &[])])
        .await
        .unwrap();
    assert_eq!(tx.delete_all("db1", "nope").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_by_att_ref_removes_whole_documents() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    let docs = [
        order_doc(1, "ada", &["new"]),
        order_doc(2, "bob", &["old"]),
        order_doc(3, "ada", &["vip"]),
    ];
    tx.insert("db1", "orders", docs).await.unwrap();

    let att_ref = AttributeReference::parse("customer");
    let deleted = tx
        .delete_by_att_ref("db1", "orders", &att_ref, &DocValue::from("ada"))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    tx.commit().await.unwrap();

    let state = state.lock().unwrap();
    // Only bob's document remains, in the root and in every child table.
    assert_eq!(state.row_count("db1", "orders"), 1);
    assert_eq!(state.row_count("db1", "orders_tags"), 1);
    assert_eq!(state.row_count("db1", "orders_shipping"), 1);
}

#[tokio::test]
async fn test_delete_by_att_ref_reaches_nested_fields() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    let doc_a = order_doc(1, "ada", &[]);
    let doc_b = DocValue::object([
        ("_id", DocValue::from(2)),
        (
            "shipping",
            DocValue::object([("city", DocValue::from("gva"))]),
        ),
    ]);
    tx.insert("db1", "orders", [doc_a, doc_b]).await.unwrap();

    let att_ref = AttributeReference::parse("shipping.city");
    let deleted = tx
        .delete_by_att_ref("db1", "orders", &att_ref, &DocValue::from("zrh"))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let state = state.lock().unwrap();
    assert_eq!(state.row_count("db1", "orders"), 1);
    assert_eq!(state.row_count("db1", "orders_shipping"), 1);
}

#[tokio::test]
async fn test_delete_by_att_ref_counts_documents_not_rows() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    // One document matches twice in the array doc-part.
    let doc = DocValue::object([
        ("_id", DocValue::from(1)),
        (
            "items",
            DocValue::Array(vec![
                DocValue::object([("sku", DocValue::from("a"))]),
                DocValue::object([("sku", DocValue::from("a"))]),
            ]),
        ),
    ]);
    let other = DocValue::object([
        ("_id", DocValue::from(2)),
        (
            "items",
            DocValue::Array(vec![DocValue::object([("sku", DocValue::from("b"))])]),
        ),
    ]);
    tx.insert("db1", "orders", [doc, other]).await.unwrap();

    let att_ref = AttributeReference::parse("items.sku");
    let deleted = tx
        .delete_by_att_ref("db1", "orders", &att_ref, &DocValue::from("a"))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let state = state.lock().unwrap();
    assert_eq!(state.row_count("db1", "orders"), 1);
    assert_eq!(state.row_count("db1", "orders_items"), 1);
}

#[tokio::test]
async fn test_delete_by_att_ref_edge_cases() {
    let (mut executor, _state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();
    tx.insert("db1", "orders", [order_doc(1, "ada", &[])])
        .await
        .unwrap();

    // Empty reference is a caller mistake.
    let err = tx
        .delete_by_att_ref("db1", "orders", &AttributeReference::parse(""), &DocValue::from(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocrelError::User(UserError::InvalidAttributeReference)
    ));

    // Unknown field, unknown type pairing, unknown collection: all zero.
    let customer = AttributeReference::parse("customer");
    assert_eq!(
        tx.delete_by_att_ref("db1", "orders", &AttributeReference::parse("nope"), &DocValue::from(1))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        tx.delete_by_att_ref("db1", "orders", &customer, &DocValue::from(42))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        tx.delete_by_att_ref("db1", "nope", &customer, &DocValue::from("ada"))
            .await
            .unwrap(),
        0
    );

    // Searching by a container value is a caller mistake.
    let err = tx
        .delete_by_att_ref(
            "db1",
            "orders",
            &customer,
            &DocValue::Object(std::collections::BTreeMap::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocrelError::User(UserError::UnindexableType(_))
    ));
}

#[tokio::test]
async fn test_drop_collection_removes_tables_meta_and_catalog() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    tx.insert("db1", "orders", [order_doc(1, "ada", &["new"])])
        .await
        .unwrap();
    tx.insert("db1", "users", [DocValue::object([("name", DocValue::from("x"))])])
        .await
        .unwrap();

    tx.drop_collection("db1", "orders").await.unwrap();
    let snapshot = tx.commit().await.unwrap();

    let db = snapshot.database_by_name("db1").unwrap();
    assert!(db.collection_by_name("orders").is_none());
    assert!(db.collection_by_name("users").is_some());

    let state = state.lock().unwrap();
    let tables = state.table_names_of("db1");
    assert_eq!(tables, vec!["users".to_string()]);
    // Meta rows of the dropped collection are gone; the other survives.
    assert_eq!(state.row_count("torodb", "meta_collection"), 1);
    assert_eq!(state.row_count("torodb", "meta_doc_part"), 1);
    assert_eq!(state.row_count("torodb", "meta_database"), 1);
}

#[tokio::test]
async fn test_drop_database_removes_schema_and_meta() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    tx.insert("db1", "orders", [order_doc(1, "ada", &["new"])])
        .await
        .unwrap();
    tx.drop_database("db1").await.unwrap();
    let snapshot = tx.commit().await.unwrap();

    assert!(snapshot.database_by_name("db1").is_none());

    let state = state.lock().unwrap();
    assert!(!state.schemas.contains_key("db1"));
    assert_eq!(state.row_count("torodb", "meta_database"), 0);
    assert_eq!(state.row_count("torodb", "meta_collection"), 0);
    assert_eq!(state.row_count("torodb", "meta_doc_part"), 0);
    assert_eq!(state.row_count("torodb", "meta_field"), 0);
    assert_eq!(state.row_count("torodb", "meta_scalar"), 0);
}

#[tokio::test]
async fn test_drop_unknown_targets_error() {
    let (mut executor, _state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    let err = tx.drop_database("nope").await.unwrap_err();
    assert!(matches!(
        err,
        DocrelError::User(UserError::DatabaseNotFound(_))
    ));

    tx.insert("db1", "orders", [order_doc(1, "ada", &[])])
        .await
        .unwrap();
    let err = tx.drop_collection("db1", "nope").await.unwrap_err();
    assert!(matches!(
        err,
        DocrelError::User(UserError::CollectionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_batches_split_large_id_sets() {
    let (mut executor, state) = MockExecutor::new();
    bootstrap(&mut executor).await;
    let mut tx = new_tx(executor, MetaSnapshot::new());
    tx.begin().await.unwrap();

    let docs: Vec<DocValue> = (0..250)
        .map(|i| DocValue::object([("n", DocValue::from(i))]))
        .collect();
    tx.insert("db1", "col1", docs).await.unwrap();
    assert_eq!(tx.delete_all("db1", "col1").await.unwrap(), 250);

    let state = state.lock().unwrap();
    assert_eq!(state.row_count("db1", "col1"), 0);
    // 250 dids in batches of 100 against a single doc-part.
    let deletes = state
        .statements
        .iter()
        .filter(|s| s.starts_with("DELETE FROM \"db1\"."))
        .count();
    assert_eq!(deletes, 3);
}
