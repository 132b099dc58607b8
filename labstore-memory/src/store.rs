//! In-memory storage implementation.
//!
//! Documents are kept as BSON documents per collection, in insertion order, behind one
//! async-aware read-write lock. Every write takes the write lock for its whole duration, which
//! makes find-and-modify atomic with respect to all other operations on the store.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use log::trace;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};

use labstore_core::{
    backend::{StoreBackend, StoreBackendBuilder, Update},
    document::ID_FIELD,
    error::{DbError, DbResult},
    query::{AggregateOptions, Expr, FindOptions},
};

use crate::{
    evaluator::DocumentEvaluator,
    parse::equality_fields,
    pipeline::{self, project, set_path, sort_documents},
};

type StoreMap = HashMap<String, Vec<Document>>;

/// Error code the store reports for a duplicate `_id`.
pub const DUPLICATE_KEY_CODE: i32 = 11000;


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same data. Queries scan every document of a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use labstore_memory::InMemoryStore;
/// use labstore_core::{backend::StoreBackend, query::Filter};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_one("Product", doc! { "name": "CBC", "price": 45 }).await?;
///
/// let cheap = store.find_one("Product", &Filter::lt("price", 50)).await?;
/// assert!(cheap.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new [`InMemoryStoreBuilder`].
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of documents in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Returns the names of the collections holding at least one document.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.store
            .read()
            .await
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}

fn position(documents: &[Document], filter: &Expr) -> DbResult<Option<usize>> {
    for (index, document) in documents.iter().enumerate() {
        if DocumentEvaluator::matches(document, filter)? {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

fn matching(documents: &[Document], filter: &Expr) -> DbResult<Vec<Document>> {
    let mut matched = Vec::new();

    for document in documents {
        if DocumentEvaluator::matches(document, filter)? {
            matched.push(document.clone());
        }
    }

    Ok(matched)
}

fn apply_set(document: &mut Document, set: &Document) {
    for (path, value) in set {
        set_path(document, path, value.clone());
    }
}

fn insert_document(documents: &mut Vec<Document>, mut document: Document) -> DbResult<Bson> {
    let id = match document.get(ID_FIELD) {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            document.insert(ID_FIELD, id.clone());
            id
        }
    };

    if documents.iter().any(|existing| existing.get(ID_FIELD) == Some(&id)) {
        return Err(DbError::operation(
            Some(DUPLICATE_KEY_CODE),
            format!("E11000 duplicate key error: _id {id}"),
        ));
    }

    // Keep `_id` first, the way the store lays documents out.
    let mut stored = Document::new();
    stored.insert(ID_FIELD, id.clone());
    for (key, value) in document {
        if key != ID_FIELD {
            stored.insert(key, value);
        }
    }

    documents.push(stored);
    Ok(id)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Expr,
        options: &FindOptions,
    ) -> DbResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = matching(documents, filter)?;
        drop(store);

        sort_documents(&mut matched, &options.sort);

        let page = matched
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX));

        match &options.projection {
            Some(projection) => page.map(|document| project(&document, projection)).collect(),
            None => Ok(page.collect()),
        }
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DbResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(None);
        };

        Ok(position(documents, filter)?.map(|index| documents[index].clone()))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DbResult<Option<Bson>> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        let id = insert_document(documents, document)?;
        trace!("{collection}: inserted {id}");

        Ok(Some(id))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
        upsert: bool,
    ) -> DbResult<Option<Document>> {
        let mut store = self.store.write().await;

        if let Some(documents) = store.get_mut(collection)
            && let Some(index) = position(documents, filter)?
        {
            let document = &mut documents[index];
            apply_set(document, &update.set);

            return Ok(Some(document.clone()));
        }

        if !upsert {
            return Ok(None);
        }

        let mut inserted = equality_fields(filter)?;
        apply_set(&mut inserted, &update.set_on_insert);
        apply_set(&mut inserted, &update.set);

        let documents = store.entry(collection.to_string()).or_default();
        let id = insert_document(documents, inserted)?;
        trace!("{collection}: upserted {id}");

        Ok(documents.last().cloned())
    }

    async fn update_many(&self, collection: &str, filter: &Expr, set: Document) -> DbResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut modified = 0;
        for document in documents.iter_mut() {
            if DocumentEvaluator::matches(document, filter)? {
                apply_set(document, &set);
                modified += 1;
            }
        }

        Ok(modified)
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DbResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        match position(documents, filter)? {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        _options: &AggregateOptions,
    ) -> DbResult<Vec<Document>> {
        let documents = self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        pipeline::run(documents, &pipeline)
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use labstore_memory::InMemoryStore;
/// use labstore_core::backend::StoreBackendBuilder;
///
/// let shared = InMemoryStore::new();
/// let store = InMemoryStore::builder().with_store(shared.clone()).build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    store: Option<InMemoryStore>,
}

impl InMemoryStoreBuilder {
    /// Builds on top of an existing store, sharing its data.
    pub fn with_store(mut self, store: InMemoryStore) -> Self {
        self.store = Some(store);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store. This always succeeds.
    async fn build(self) -> DbResult<Self::Backend> {
        Ok(self.store.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use labstore_core::query::{Filter, SortDirection};

    const PRODUCTS: &str = "lab_Product";

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, price) in [("glucose", 30), ("lipid", 120), ("cbc", 45)] {
            store.insert_one(PRODUCTS, doc! { "name": name, "price": price }).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn insert_assigns_object_ids() {
        let store = InMemoryStore::new();
        let id = store.insert_one(PRODUCTS, doc! { "name": "cbc" }).await.unwrap().unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));

        let stored = store.find_one(PRODUCTS, &Filter::eq(ID_FIELD, id)).await.unwrap().unwrap();
        assert_eq!(stored.keys().next().map(String::as_str), Some(ID_FIELD));
        assert_eq!(store.len(PRODUCTS).await, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryStore::new();
        store.insert_one(PRODUCTS, doc! { "_id": 7, "name": "cbc" }).await.unwrap();

        let error = store.insert_one(PRODUCTS, doc! { "_id": 7 }).await.unwrap_err();
        assert_eq!(error.code(), Some(DUPLICATE_KEY_CODE));
    }

    #[tokio::test]
    async fn find_sorts_pages_and_projects() {
        let store = seeded().await;
        let options = FindOptions::builder()
            .sort("price", SortDirection::Desc)
            .skip(1)
            .limit(1)
            .projection(doc! { "_id": 0, "name": 1 })
            .build();

        let found = store.find(PRODUCTS, &Filter::all(), &options).await.unwrap();
        assert_eq!(found, vec![doc! { "name": "cbc" }]);

        let missing = store.find("lab_Order", &Filter::all(), &FindOptions::default()).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn find_one_and_update_returns_the_updated_document() {
        let store = seeded().await;
        let update = Update { set: doc! { "price": 50, "meta.reviewed": true }, ..Default::default() };

        let updated = store
            .find_one_and_update(PRODUCTS, &Filter::eq("name", "cbc"), update, false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.get_i32("price").unwrap(), 50);
        assert_eq!(updated.get_document("meta").unwrap(), &doc! { "reviewed": true });

        let none = store
            .find_one_and_update(PRODUCTS, &Filter::eq("name", "ferritin"), Update::default(), false)
            .await
            .unwrap();
        assert!(none.is_none());
        assert_eq!(store.len(PRODUCTS).await, 3);
    }

    #[tokio::test]
    async fn upsert_inserts_from_filter_and_both_sets() {
        let store = InMemoryStore::new();
        let update = Update {
            set: doc! { "price": 80 },
            set_on_insert: doc! { "createdBy": "import" },
        };

        let inserted = store
            .find_one_and_update(PRODUCTS, &Filter::raw(doc! { "code": "FER" }), update.clone(), true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(inserted.get_str("code").unwrap(), "FER");
        assert_eq!(inserted.get_str("createdBy").unwrap(), "import");
        assert!(inserted.get_object_id(ID_FIELD).is_ok());

        let again = Update { set: doc! { "price": 85 }, set_on_insert: doc! { "createdBy": "retry" } };
        let matched = store
            .find_one_and_update(PRODUCTS, &Filter::eq("code", "FER"), again, true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(matched.get_i32("price").unwrap(), 85);
        assert_eq!(matched.get_str("createdBy").unwrap(), "import");
        assert_eq!(store.len(PRODUCTS).await, 1);
    }

    #[tokio::test]
    async fn update_many_counts_matches() {
        let store = seeded().await;

        let modified = store
            .update_many(PRODUCTS, &Filter::lt("price", 100), doc! { "tier": "basic" })
            .await
            .unwrap();
        assert_eq!(modified, 2);

        let basic = store
            .find(PRODUCTS, &Filter::eq("tier", "basic"), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(basic.len(), 2);
    }

    #[tokio::test]
    async fn delete_one_removes_the_first_match_only() {
        let store = seeded().await;

        assert_eq!(store.delete_one(PRODUCTS, &Filter::gt("price", 0)).await.unwrap(), 1);
        assert_eq!(store.delete_one(PRODUCTS, &Filter::eq("name", "glucose")).await.unwrap(), 0);
        assert_eq!(store.len(PRODUCTS).await, 2);
        assert_eq!(store.delete_one("lab_Order", &Filter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn aggregate_runs_the_pipeline() {
        let store = seeded().await;
        let pipeline = vec![
            doc! { "$match": { "price": { "$gte": 40 } } },
            doc! { "$sort": { "name": 1 } },
            doc! { "$project": { "_id": 0, "name": 1 } },
        ];

        let output = store.aggregate(PRODUCTS, pipeline, &AggregateOptions::default()).await.unwrap();
        assert_eq!(output, vec![doc! { "name": "cbc" }, doc! { "name": "lipid" }]);
    }

    #[tokio::test]
    async fn builder_shares_existing_data() {
        let shared = seeded().await;
        let built = InMemoryStore::builder().with_store(shared.clone()).build().await.unwrap();

        assert_eq!(built.len(PRODUCTS).await, 3);
        assert_eq!(built.collection_names().await, vec![PRODUCTS.to_string()]);
    }
}
