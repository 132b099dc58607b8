use std::{sync::Arc, time::Duration};

use bson::{Bson, Document, doc};
use chrono::Utc;
use labstore::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    code: String,
    name: String,
    price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    order_no: i64,
    status: String,
}

fn product(code: &str, name: &str, price: i64) -> Product {
    Product { code: code.into(), name: name.into(), price }
}

async fn ready_database() -> Database {
    let database = Database::new();
    database.initialize(InMemoryStore::builder(), "").await.unwrap();
    database
}

// Timestamps have millisecond precision.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn insert_stamps_equal_timestamps() {
    let database = ready_database().await;
    let before = Utc::now();

    let created = database
        .insert_one(DbCollection::Product, product("CBC", "Complete blood count", 45))
        .await
        .unwrap()
        .unwrap();
    let id = created.id().unwrap();

    let found = database
        .find_one::<Product>(DbCollection::Product, Filter::id(id))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.data, product("CBC", "Complete blood count", 45));
    assert_eq!(found.created_at(), found.updated_at());
    assert_eq!(found.created_at(), created.created_at());

    let created_at = found.created_at().unwrap();
    assert!((created_at - before).num_seconds().abs() < 5);
}

#[tokio::test]
async fn update_one_advances_only_updated_at() {
    let database = ready_database().await;
    let created = database
        .insert_one(DbCollection::Product, product("LIP", "Lipid panel", 120))
        .await
        .unwrap()
        .unwrap();
    let id = created.id().unwrap();

    tick().await;

    let updated = database
        .update_one::<Product, _>(DbCollection::Product, Filter::id(id), &doc! { "price": 99_i64 })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.data, product("LIP", "Lipid panel", 99));
    assert_eq!(updated.created_at(), created.created_at());
    assert!(updated.updated_at() > created.updated_at());

    let missing = database
        .update_one::<Product, _>(DbCollection::Product, Filter::eq("code", "NONE"), &doc! { "price": 1 })
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn update_ignores_envelope_fields_in_the_payload() {
    let database = ready_database().await;
    let created = database
        .insert_one(DbCollection::Product, product("GLU", "Glucose", 30))
        .await
        .unwrap()
        .unwrap();

    let updated = database
        .update_one::<Product, _>(
            DbCollection::Product,
            Filter::id(created.id().unwrap()),
            &doc! { "createdAt": bson::DateTime::from_millis(0), "name": "Fasting glucose" },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.created_at(), created.created_at());
    assert_eq!(updated.data.name, "Fasting glucose");
}

#[tokio::test]
async fn upsert_inserts_then_applies_only_the_always_set_part() {
    let database = ready_database().await;
    let filter = Filter::raw(doc! { "code": "FER" });

    let inserted = database
        .upsert_one::<Product>(
            DbCollection::Product,
            filter.clone(),
            Upsert::new(&doc! { "price": 80_i64 })
                .unwrap()
                .on_insert(&doc! { "name": "Ferritin" })
                .unwrap(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(inserted.data, product("FER", "Ferritin", 80));
    assert_eq!(inserted.created_at(), inserted.updated_at());

    tick().await;

    let matched = database
        .upsert_one::<Product>(
            DbCollection::Product,
            filter,
            Upsert::new(&doc! { "price": 85_i64 })
                .unwrap()
                .on_insert(&doc! { "name": "Serum ferritin" })
                .unwrap(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(matched.id(), inserted.id());
    assert_eq!(matched.data, product("FER", "Ferritin", 85));
    assert_eq!(matched.created_at(), inserted.created_at());
    assert!(matched.updated_at() > inserted.updated_at());
}

#[tokio::test]
async fn update_many_returns_the_modified_count() {
    let database = ready_database().await;
    for (code, price) in [("A", 10), ("B", 20), ("C", 300)] {
        database
            .insert_one(DbCollection::Product, product(code, code, price))
            .await
            .unwrap();
    }

    let modified = database
        .update_many(DbCollection::Product, Filter::lt("price", 100), &doc! { "name": "basic" })
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let basic = database
        .find::<Product>(DbCollection::Product, Filter::eq("name", "basic"), None)
        .await
        .unwrap();
    assert_eq!(basic.len(), 2);
    assert!(basic.iter().all(|p| p.updated_at() >= p.created_at()));
}

#[tokio::test]
async fn delete_one_is_true_once_per_document() {
    let database = ready_database().await;
    for no in [1, 2] {
        database
            .insert_one(DbCollection::Order, Order { order_no: no, status: "void".into() })
            .await
            .unwrap();
    }

    let filter = || Filter::eq("status", "void");
    assert!(database.delete_one(DbCollection::Order, filter()).await.unwrap());
    assert!(database.delete_one(DbCollection::Order, filter()).await.unwrap());
    assert!(!database.delete_one(DbCollection::Order, filter()).await.unwrap());
}

#[tokio::test]
async fn sequence_numbers_follow_the_highest_value() {
    let database = ready_database().await;

    assert_eq!(database.next_sequence_number(DbCollection::Order, "orderNo", None).await.unwrap(), 1);

    for no in [3, 5, 4] {
        database
            .insert_one(DbCollection::Order, Order { order_no: no, status: "new".into() })
            .await
            .unwrap();
    }

    assert_eq!(database.next_sequence_number(DbCollection::Order, "orderNo", None).await.unwrap(), 6);
    assert_eq!(database.next_sequence_number(DbCollection::Order, "orderNo", Some(10)).await.unwrap(), 15);
}

#[tokio::test]
async fn sequence_numbers_order_large_integers_exactly() {
    let database = ready_database().await;
    for no in [1_i64 << 53, (1_i64 << 53) + 1] {
        database
            .insert_one(DbCollection::Order, Order { order_no: no, status: "new".into() })
            .await
            .unwrap();
    }

    assert_eq!(
        database.next_sequence_number(DbCollection::Order, "orderNo", None).await.unwrap(),
        9_007_199_254_740_994
    );
}

#[tokio::test]
async fn sequence_numbers_skip_nan_values() {
    let database = ready_database().await;
    for value in [Bson::Double(f64::NAN), Bson::Int32(5)] {
        database
            .insert_one(DbCollection::Appointment, doc! { "ticketNo": value })
            .await
            .unwrap();
    }

    assert_eq!(database.next_sequence_number(DbCollection::Appointment, "ticketNo", None).await.unwrap(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_upserts_insert_a_single_document() {
    let store = InMemoryStore::new();
    let database = Arc::new(Database::new());
    database
        .initialize(InMemoryStore::builder().with_store(store.clone()), "")
        .await
        .unwrap();

    let tasks = (0..32)
        .map(|attempt| {
            let database = Arc::clone(&database);
            tokio::spawn(async move {
                database
                    .upsert_one::<Document>(
                        DbCollection::Product,
                        Filter::raw(doc! { "code": "X" }),
                        Upsert::new(&doc! { "price": attempt }).unwrap(),
                    )
                    .await
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_some());
    }

    assert_eq!(store.len("Product").await, 1);
}

#[tokio::test]
async fn find_honours_sort_and_paging() {
    let database = ready_database().await;
    for (code, price) in [("A", 30), ("B", 10), ("C", 20)] {
        database
            .insert_one(DbCollection::Product, product(code, code, price))
            .await
            .unwrap();
    }

    let options = FindOptions::builder()
        .sort("price", SortDirection::Asc)
        .skip(1)
        .limit(5)
        .build();
    let codes = database
        .find::<Product>(DbCollection::Product, Filter::all(), Some(options))
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.into_data().code)
        .collect::<Vec<_>>();

    assert_eq!(codes, vec!["C", "A"]);
}

#[tokio::test]
async fn aggregate_decodes_into_any_type() {
    #[derive(Debug, Deserialize)]
    struct Total {
        total: i64,
    }

    let database = ready_database().await;
    for (code, price) in [("A", 30), ("B", 10), ("C", 20)] {
        database
            .insert_one(DbCollection::Product, product(code, code, price))
            .await
            .unwrap();
    }

    let totals = database
        .aggregate::<Total>(
            DbCollection::Product,
            vec![doc! { "$match": { "price": { "$gte": 20 } } }, doc! { "$count": "total" }],
            None,
        )
        .await
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total, 2);

    let raw = database
        .aggregate::<Document>(
            DbCollection::Product,
            vec![doc! { "$sort": { "price": -1 } }, doc! { "$limit": 1 }, doc! { "$project": { "_id": 0, "code": 1 } }],
            Some(AggregateOptions { allow_disk_use: Some(true), ..Default::default() }),
        )
        .await
        .unwrap();
    assert_eq!(raw, vec![doc! { "code": "A" }]);
}

#[tokio::test]
async fn prefix_is_applied_to_physical_names() {
    let store = InMemoryStore::new();
    let database = Database::new();
    database
        .initialize(InMemoryStore::builder().with_store(store.clone()), "test_")
        .await
        .unwrap();

    let handle = database.collection(DbCollection::SmsMessage).await.unwrap();
    assert_eq!(handle.name(), "test_SMSMessage");

    database
        .insert_one(DbCollection::Product, product("CBC", "cbc", 45))
        .await
        .unwrap();
    assert_eq!(store.collection_names().await, vec!["test_Product".to_string()]);
}

#[tokio::test]
async fn operations_fail_not_ready_outside_a_connection() {
    let database = Database::new();

    let error = database
        .find_one::<Product>(DbCollection::Product, Filter::all())
        .await
        .unwrap_err();
    assert!(error.is_not_ready());
    assert_eq!(error, DbError::Connection(ConnectionError::NotReady));

    database.initialize(InMemoryStore::builder(), "").await.unwrap();
    database.shutdown().await.unwrap();

    let error = database
        .insert_one(DbCollection::Order, Order { order_no: 1, status: "new".into() })
        .await
        .unwrap_err();
    assert!(error.is_not_ready());
}

#[tokio::test]
async fn unsupported_filters_surface_as_operation_errors() {
    let database = ready_database().await;
    database
        .insert_one(DbCollection::Product, product("CBC", "cbc", 45))
        .await
        .unwrap();

    let error = database
        .find::<Product>(DbCollection::Product, doc! { "name": { "$regex": "^c" } }, None)
        .await
        .unwrap_err();

    assert!(matches!(error, DbError::Operation { code: None, .. }));
}

#[tokio::test]
async fn config_with_memory_uri_initializes() {
    let database = Database::new();
    let config = DatabaseConfig::new("memory://", "lab").with_prefix("dev_");

    labstore::initialize(&database, &config, || {}).await.unwrap();

    let handle = database.collection(DbCollection::Customer).await.unwrap();
    assert_eq!(handle.name(), "dev_Customer");

    let error = labstore::initialize(&database, &config, || {}).await.unwrap_err();
    assert!(matches!(error, DbError::Configuration(_)));
}
