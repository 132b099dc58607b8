//! Main labstore crate: the data-access layer of the lab service.
//!
//! This crate is the entry point for the service. It re-exports the core types from the
//! sub-crates, gives access to the storage backends and picks a backend from the configured
//! connection URI.
//!
//! # Features
//!
//! - **One shared connection** - A [`Database`](database::Database) is initialized once and
//!   shared by every component
//! - **Closed collection set** - Collections are addressed by [`DbCollection`](catalog::DbCollection)
//! - **Typed operations** - Payloads are any Serde type, wrapped in an id and timestamp envelope
//! - **Uniform errors** - Every backend failure arrives as a [`DbError`](error::DbError)
//!
//! # Quick Start
//!
//! ```ignore
//! use labstore::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! pub struct Order {
//!     pub order_no: i64,
//!     pub status: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DbResult<()> {
//!     let database = Database::new();
//!     let config = DatabaseConfig::new("memory://", "lab");
//!
//!     labstore::initialize(&database, &config, || println!("ready")).await?;
//!
//!     let order_no = database.next_sequence_number(DbCollection::Order, "orderNo", None).await?;
//!     let order = database
//!         .insert_one(DbCollection::Order, Order { order_no, status: "new".into() })
//!         .await?;
//!
//!     let paid = database
//!         .update_one::<Order, _>(
//!             DbCollection::Order,
//!             Filter::eq("orderNo", order_no),
//!             &bson::doc! { "status": "paid" },
//!         )
//!         .await?;
//!
//!     database.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing (`memory://`)
//! - [`mongodb`] - MongoDB (`mongodb://`, `mongodb+srv://`; requires the `mongodb` feature)

pub mod prelude;
mod connect;

pub use labstore_core::{backend, catalog, collection, config, database, document, error, query, sequence};
pub use connect::{BackendKind, initialize};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use labstore_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use labstore_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
