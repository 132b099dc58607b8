//! Convenient re-exports of commonly used types from labstore.
//!
//! ```ignore
//! use labstore::prelude::*;
//! ```
//!
//! This provides access to:
//! - The connection manager and its configuration
//! - Logical collections and resolved handles
//! - The document envelope and upsert payloads
//! - Filters and options
//! - Error types

pub use labstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    catalog::DbCollection,
    collection::CollectionHandle,
    config::DatabaseConfig,
    database::Database,
    document::{BaseEntity, Stored, Upsert},
    error::{ConnectionError, DbError, DbResult},
    query::{AggregateOptions, Expr, Filter, FindOptions, SortDirection},
};
