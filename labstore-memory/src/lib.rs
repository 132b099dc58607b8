//! In-memory document storage backend for labstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! tests and single-process deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads, serialized writes
//! - **Native filters** - Raw filter documents are parsed and evaluated like the store does
//! - **Find-and-modify** - Updates and upserts return the document after the write
//! - **Pipelines** - `$match`, `$sort`, `$skip`, `$limit`, `$project` and `$count`
//!
//! # Quick Start
//!
//! ```ignore
//! use labstore_core::{catalog::DbCollection, database::Database};
//! use labstore_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = Database::new();
//!     database.initialize(InMemoryStore::builder(), "").await?;
//!
//!     let products = database.collection(DbCollection::Product).await?;
//!     assert_eq!(products.name(), "Product");
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as labstore_memory;

pub mod store;
pub mod evaluator;
pub mod parse;
pub mod pipeline;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
