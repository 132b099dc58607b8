//! MongoDB backend implementation for labstore.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Filters,
//! updates and aggregation pipelines run on the server; driver errors are translated into
//! `DbError` before they leave the crate.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! labstore = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use labstore::{database::Database, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = Database::new();
//!     database
//!         .initialize(MongoDbStore::builder("mongodb://localhost:27017", "lab"), "")
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as labstore_mongodb;

pub mod error;
pub mod store;
pub mod query;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
