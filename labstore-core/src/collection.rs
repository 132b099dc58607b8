//! Typed operations against one resolved collection.
//!
//! A [`CollectionHandle`] is what the collection resolver hands out: a physical collection
//! name bound to the active backend. It owns the envelope rules of the layer:
//!
//! - `insert_one` stamps `createdAt` and `updatedAt` with the same instant, overwriting
//!   anything the payload carried under those keys.
//! - Every update path sets `updatedAt` and never touches `createdAt`.
//! - `_id` is never written from a payload.
//!
//! # Example
//!
//! ```ignore
//! let orders = database.collection(DbCollection::Order).await?;
//! let next = orders.next_sequence_number("orderNo", None).await?;
//! let order = orders.insert_one(NewOrder { order_no: next, .. }).await?;
//! ```

use bson::{Bson, Document, de::deserialize_from_document};
use log::debug;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::{
    backend::{StoreBackend, Update},
    catalog::DbCollection,
    document::{BaseEntity, CREATED_AT_FIELD, Stored, UPDATED_AT_FIELD, Upsert, now, payload_document},
    error::{DbError, DbResult},
    query::{AggregateOptions, Expr, Filter, FindOptions, SortDirection},
    sequence,
};

/// A logical collection resolved to its physical name on the active connection.
///
/// Handles are cheap to clone and stay bound to the connection they were resolved from.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    collection: DbCollection,
    name: String,
    backend: Arc<dyn StoreBackend>,
}

impl CollectionHandle {
    pub(crate) fn new(collection: DbCollection, name: String, backend: Arc<dyn StoreBackend>) -> Self {
        Self { collection, name, backend }
    }

    /// Returns the logical collection this handle was resolved from.
    pub fn collection(&self) -> DbCollection {
        self.collection
    }

    /// Returns the physical collection name, including the configured prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the documents matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `filter` - The filter predicate; [`Filter::all`] matches every document
    /// * `options` - Optional sort keys, paging and projection
    ///
    /// # Errors
    ///
    /// Returns a [`DbError`] if the backend fails or a document does not decode into `T`.
    pub async fn find<T: DeserializeOwned>(
        &self,
        filter: impl Into<Expr>,
        options: Option<FindOptions>,
    ) -> DbResult<Vec<Stored<T>>> {
        debug!("{}: find", self.name);

        self.backend
            .find(&self.name, &filter.into(), &options.unwrap_or_default())
            .await?
            .into_iter()
            .map(Stored::from_document)
            .collect()
    }

    /// Returns the first document matching `filter`, or `None` when nothing matches.
    pub async fn find_one<T: DeserializeOwned>(&self, filter: impl Into<Expr>) -> DbResult<Option<Stored<T>>> {
        debug!("{}: find_one", self.name);

        self.backend
            .find_one(&self.name, &filter.into())
            .await?
            .map(Stored::from_document)
            .transpose()
    }

    /// Inserts `data` with freshly stamped timestamps.
    ///
    /// Both timestamps are set to the same instant. The returned document carries the
    /// identifier assigned by the store, or is `None` if the store inserted nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`DbError`] if `data` does not serialize to a document or the write fails.
    pub async fn insert_one<T: Serialize>(&self, data: T) -> DbResult<Option<Stored<T>>> {
        debug!("{}: insert_one", self.name);

        let stamp = now();
        let mut document = payload_document(&data)?;
        document.insert(CREATED_AT_FIELD, stamp);
        document.insert(UPDATED_AT_FIELD, stamp);

        match self.backend.insert_one(&self.name, document).await? {
            None => Ok(None),
            Some(Bson::ObjectId(id)) => Ok(Some(Stored {
                base: BaseEntity {
                    id: Some(id),
                    created_at: Some(stamp.to_chrono()),
                    updated_at: Some(stamp.to_chrono()),
                },
                data,
            })),
            Some(other) => Err(DbError::Serialization(format!(
                "Store assigned a non-ObjectId identifier: {other}"
            ))),
        }
    }

    /// Applies `changes` to the first document matching `filter` and returns it as it is
    /// after the update, or `None` when nothing matches.
    ///
    /// The read and the write happen in one atomic find-and-modify, so the returned state is
    /// exactly the one this call produced.
    pub async fn update_one<T, U>(&self, filter: impl Into<Expr>, changes: &U) -> DbResult<Option<Stored<T>>>
    where
        T: DeserializeOwned,
        U: Serialize + ?Sized,
    {
        debug!("{}: update_one", self.name);

        let update = Update {
            set: stamped_changes(changes)?,
            set_on_insert: Document::new(),
        };

        self.backend
            .find_one_and_update(&self.name, &filter.into(), update, false)
            .await?
            .map(Stored::from_document)
            .transpose()
    }

    /// Applies `changes` to every document matching `filter` and returns the number of
    /// documents modified.
    pub async fn update_many<U: Serialize + ?Sized>(&self, filter: impl Into<Expr>, changes: &U) -> DbResult<u64> {
        debug!("{}: update_many", self.name);

        self.backend
            .update_many(&self.name, &filter.into(), stamped_changes(changes)?)
            .await
    }

    /// Updates the first document matching `filter`, or inserts one if none matches.
    ///
    /// On a match only `upsert.set()` is applied, with a new `updatedAt`. Otherwise the new
    /// document holds `upsert.set()`, `upsert.set_on_insert()` and fresh `createdAt` and
    /// `updatedAt` values. Both branches run as one atomic find-and-modify.
    pub async fn upsert_one<T: DeserializeOwned>(
        &self,
        filter: impl Into<Expr>,
        upsert: Upsert,
    ) -> DbResult<Option<Stored<T>>> {
        debug!("{}: upsert_one", self.name);

        let stamp = now();
        let (mut set, mut set_on_insert) = upsert.into_parts();
        set.insert(UPDATED_AT_FIELD, stamp);
        set_on_insert.insert(CREATED_AT_FIELD, stamp);

        self.backend
            .find_one_and_update(&self.name, &filter.into(), Update { set, set_on_insert }, true)
            .await?
            .map(Stored::from_document)
            .transpose()
    }

    /// Deletes the first document matching `filter`.
    ///
    /// Returns `true` iff exactly one document was removed; no match is `false`, not an
    /// error.
    pub async fn delete_one(&self, filter: impl Into<Expr>) -> DbResult<bool> {
        debug!("{}: delete_one", self.name);

        Ok(self.backend.delete_one(&self.name, &filter.into()).await? == 1)
    }

    /// Runs an aggregation pipeline and decodes each output document into `R`.
    ///
    /// The stages are forwarded to the store untouched.
    pub async fn aggregate<R: DeserializeOwned>(
        &self,
        pipeline: Vec<Document>,
        options: Option<AggregateOptions>,
    ) -> DbResult<Vec<R>> {
        debug!("{}: aggregate ({} stages)", self.name, pipeline.len());

        self.backend
            .aggregate(&self.name, pipeline, &options.unwrap_or_default())
            .await?
            .into_iter()
            .map(|document| deserialize_from_document(document).map_err(DbError::from))
            .collect()
    }

    /// Computes the next value of the integer field `field`.
    ///
    /// Reads the document with the highest `field` value and returns that value plus `step`
    /// (default 1, also used for a zero step), or `step` for an empty collection.
    ///
    /// This is not atomic. Concurrent callers can read the same maximum and receive the same
    /// number; see [`sequence`](crate::sequence).
    pub async fn next_sequence_number(&self, field: &str, step: Option<i64>) -> DbResult<i64> {
        debug!("{}: next_sequence_number({field})", self.name);

        let options = FindOptions::builder()
            .sort(field, SortDirection::Desc)
            .limit(1)
            .build();
        let highest = self
            .backend
            .find(&self.name, &Filter::all(), &options)
            .await?;

        Ok(sequence::next_value(highest.first(), field, step))
    }
}

fn stamped_changes<U: Serialize + ?Sized>(changes: &U) -> DbResult<Document> {
    let mut set = payload_document(changes)?;
    set.insert(UPDATED_AT_FIELD, now());

    Ok(set)
}
