//! Connection lifecycle and collection resolution.
//!
//! A [`Database`] holds the one store connection of the process. It starts out empty;
//! [`Database::initialize`] builds and pings a backend and stores it, after which
//! [`Database::collection`] resolves logical collections into [`CollectionHandle`]s.
//! Every data operation attempted while no connection is active fails with
//! [`ConnectionError::NotReady`].
//!
//! The manager is meant to be created once and shared by reference (usually an
//! `Arc<Database>`) with everything that needs the store.
//!
//! # Example
//!
//! ```ignore
//! use labstore_core::{catalog::DbCollection, database::Database, query::Filter};
//!
//! let database = Database::new();
//! database
//!     .initialize_with(builder, "", || log::info!("Connected to database successfully"))
//!     .await?;
//!
//! let customers = database
//!     .find::<Customer>(DbCollection::Customer, Filter::eq("city", "Hanoi"), None)
//!     .await?;
//! ```

use bson::Document;
use log::{info, warn};
use mea::rwlock::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::{
    backend::{StoreBackend, StoreBackendBuilder},
    catalog::DbCollection,
    collection::CollectionHandle,
    document::{Stored, Upsert},
    error::{ConnectionError, DbError, DbResult},
    query::{AggregateOptions, Expr, FindOptions},
};

#[derive(Debug, Clone)]
struct Connection {
    backend: Arc<dyn StoreBackend>,
    prefix: String,
}

/// The process-wide connection manager and collection resolver.
#[derive(Debug, Default)]
pub struct Database {
    connection: RwLock<Option<Connection>>,
}

impl Database {
    /// Creates a manager with no active connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to the store.
    ///
    /// See [`Database::initialize_with`].
    pub async fn initialize<B>(&self, builder: B, prefix: impl Into<String>) -> DbResult<()>
    where
        B: StoreBackendBuilder + Send,
        B::Backend: 'static,
    {
        self.initialize_with(builder, prefix, || {}).await
    }

    /// Connects to the store and calls `on_ready` once the connection is usable.
    ///
    /// The backend is built from `builder` and pinged before it is stored. Operations issued
    /// while this call is in flight fail with [`ConnectionError::NotReady`].
    ///
    /// # Arguments
    ///
    /// * `builder` - Factory for the backend to connect with
    /// * `prefix` - Prefix prepended to every physical collection name
    /// * `on_ready` - Called after the connection has been stored
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Failed`] with the backend's code and message if the store
    /// cannot be reached, or [`DbError::Configuration`] if a connection is already active.
    pub async fn initialize_with<B, F>(&self, builder: B, prefix: impl Into<String>, on_ready: F) -> DbResult<()>
    where
        B: StoreBackendBuilder + Send,
        B::Backend: 'static,
        F: FnOnce(),
    {
        if self.is_ready().await {
            return Err(already_initialized());
        }

        let backend = builder.build().await.map_err(into_connection_failure)?;

        if let Err(err) = backend.ping().await {
            warn!("Database ping failed: {err}");
            if let Err(err) = backend.shutdown().await {
                warn!("Closing the unreachable backend failed: {err}");
            }
            return Err(into_connection_failure(err));
        }

        let connection = Connection {
            backend: Arc::new(backend),
            prefix: prefix.into(),
        };

        {
            let mut guard = self.connection.write().await;

            if guard.is_some() {
                drop(guard);
                if let Err(err) = connection.backend.shutdown().await {
                    warn!("Closing the redundant backend failed: {err}");
                }
                return Err(already_initialized());
            }

            *guard = Some(connection);
        }

        info!("Database connection established");
        on_ready();

        Ok(())
    }

    /// Returns `true` while a connection is active.
    pub async fn is_ready(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Closes the active connection.
    ///
    /// Handles resolved earlier keep their backend reference, but the backend itself is shut
    /// down. Afterwards the manager behaves as if it was never initialized. Calling this
    /// without an active connection is a no-op.
    pub async fn shutdown(&self) -> DbResult<()> {
        let connection = self.connection.write().await.take();

        if let Some(connection) = connection {
            connection.backend.shutdown().await?;
            info!("Database connection closed");
        }

        Ok(())
    }

    /// Resolves a logical collection to a handle on the active connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotReady`] if no connection is active.
    pub async fn collection(&self, collection: DbCollection) -> DbResult<CollectionHandle> {
        let guard = self.connection.read().await;
        let connection = guard.as_ref().ok_or(ConnectionError::NotReady)?;

        Ok(CollectionHandle::new(
            collection,
            collection.physical_name(&connection.prefix),
            connection.backend.clone(),
        ))
    }

    /// See [`CollectionHandle::find`].
    pub async fn find<T: DeserializeOwned>(
        &self,
        collection: DbCollection,
        filter: impl Into<Expr>,
        options: Option<FindOptions>,
    ) -> DbResult<Vec<Stored<T>>> {
        self.collection(collection).await?.find(filter, options).await
    }

    /// See [`CollectionHandle::find_one`].
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        collection: DbCollection,
        filter: impl Into<Expr>,
    ) -> DbResult<Option<Stored<T>>> {
        self.collection(collection).await?.find_one(filter).await
    }

    /// See [`CollectionHandle::insert_one`].
    pub async fn insert_one<T: Serialize>(&self, collection: DbCollection, data: T) -> DbResult<Option<Stored<T>>> {
        self.collection(collection).await?.insert_one(data).await
    }

    /// See [`CollectionHandle::update_one`].
    pub async fn update_one<T, U>(
        &self,
        collection: DbCollection,
        filter: impl Into<Expr>,
        changes: &U,
    ) -> DbResult<Option<Stored<T>>>
    where
        T: DeserializeOwned,
        U: Serialize + ?Sized,
    {
        self.collection(collection).await?.update_one(filter, changes).await
    }

    /// See [`CollectionHandle::update_many`].
    pub async fn update_many<U: Serialize + ?Sized>(
        &self,
        collection: DbCollection,
        filter: impl Into<Expr>,
        changes: &U,
    ) -> DbResult<u64> {
        self.collection(collection).await?.update_many(filter, changes).await
    }

    /// See [`CollectionHandle::upsert_one`].
    pub async fn upsert_one<T: DeserializeOwned>(
        &self,
        collection: DbCollection,
        filter: impl Into<Expr>,
        upsert: Upsert,
    ) -> DbResult<Option<Stored<T>>> {
        self.collection(collection).await?.upsert_one(filter, upsert).await
    }

    /// See [`CollectionHandle::delete_one`].
    pub async fn delete_one(&self, collection: DbCollection, filter: impl Into<Expr>) -> DbResult<bool> {
        self.collection(collection).await?.delete_one(filter).await
    }

    /// See [`CollectionHandle::aggregate`].
    pub async fn aggregate<R: DeserializeOwned>(
        &self,
        collection: DbCollection,
        pipeline: Vec<Document>,
        options: Option<AggregateOptions>,
    ) -> DbResult<Vec<R>> {
        self.collection(collection).await?.aggregate(pipeline, options).await
    }

    /// See [`CollectionHandle::next_sequence_number`].
    pub async fn next_sequence_number(
        &self,
        collection: DbCollection,
        field: &str,
        step: Option<i64>,
    ) -> DbResult<i64> {
        self.collection(collection)
            .await?
            .next_sequence_number(field, step)
            .await
    }
}

fn already_initialized() -> DbError {
    DbError::Configuration("Database is already initialized".to_string())
}

fn into_connection_failure(err: DbError) -> DbError {
    match err {
        DbError::Operation { code, message } => DbError::connection(code, message),
        DbError::Serialization(message) => DbError::connection(None, message),
        other => other,
    }
}
