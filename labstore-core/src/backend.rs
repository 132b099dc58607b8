//! Storage backend abstraction.
//!
//! The [`StoreBackend`] trait is the seam between the access layer and a concrete document
//! store. Backends work on raw BSON documents addressed by physical collection name; the
//! envelope, timestamps and typed payloads are handled above this seam by
//! [`CollectionHandle`](crate::collection::CollectionHandle).
//!
//! # Contract
//!
//! - Implementations must be safe to share between many in-flight operations.
//! - [`StoreBackend::find_one_and_update`] must read and modify atomically.
//! - Every failure must already be translated into a [`DbError`](crate::error::DbError);
//!   backend-native error types never cross this trait.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{
    error::DbResult,
    query::{AggregateOptions, Expr, FindOptions},
};

/// Modification applied by [`StoreBackend::find_one_and_update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Fields written whether the document matched or was inserted.
    pub set: Document,
    /// Fields written only when an upsert inserts a new document.
    pub set_on_insert: Document,
}

#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Checks that the store is reachable.
    async fn ping(&self) -> DbResult<()>;

    /// Returns the documents matching `filter`, honoring the sort, paging and projection of
    /// `options`.
    async fn find(
        &self,
        collection: &str,
        filter: &Expr,
        options: &FindOptions,
    ) -> DbResult<Vec<Document>>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: &Expr) -> DbResult<Option<Document>>;

    /// Inserts a document and returns its store-assigned identifier.
    ///
    /// Returns `Ok(None)` if the store acknowledged the write without inserting anything.
    async fn insert_one(&self, collection: &str, document: Document) -> DbResult<Option<Bson>>;

    /// Atomically applies `update` to the first document matching `filter` and returns the
    /// document as it is after the update.
    ///
    /// With `upsert` set and no match, a new document is inserted from the filter's
    /// equality conditions, `update.set` and `update.set_on_insert`, and returned.
    /// Without `upsert`, no match yields `Ok(None)`.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
        upsert: bool,
    ) -> DbResult<Option<Document>>;

    /// Sets `set` on every document matching `filter` and returns how many were modified.
    async fn update_many(&self, collection: &str, filter: &Expr, set: Document) -> DbResult<u64>;

    /// Removes the first document matching `filter` and returns how many were removed.
    async fn delete_one(&self, collection: &str, filter: &Expr) -> DbResult<u64>;

    /// Runs an aggregation pipeline and collects its output.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: &AggregateOptions,
    ) -> DbResult<Vec<Document>>;

    /// Releases connections and other resources held by the backend.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(&self) -> DbResult<()> {
        Ok(())
    }
}

/// Factory for backend instances, invoked by [`Database::initialize`](crate::database::Database::initialize).
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DbResult<Self::Backend>;
}
