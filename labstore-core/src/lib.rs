//! Core of the labstore access layer.
//!
//! This crate provides:
//!
//! - **Connection manager and resolver** ([`database`]) - One shared store connection and
//!   the mapping from logical collections to physical handles
//! - **Logical collections** ([`catalog`]) - The closed set of collections the service persists
//! - **Typed operations** ([`collection`]) - Find, insert, update, upsert, delete and aggregate
//! - **Document envelope** ([`document`]) - Identifier and timestamps around every payload
//! - **Sequence numbers** ([`sequence`]) - Next value of a human-facing counter field
//! - **Filters and options** ([`query`]) - Filter predicates, sort, paging and projection
//! - **Backend abstraction** ([`backend`]) - The trait a document store implements
//! - **Errors** ([`error`]) - The uniform error kind every backend failure is translated into
//! - **Configuration** ([`config`]) - Connection settings
//!
//! # Example
//!
//! ```ignore
//! use labstore_core::{catalog::DbCollection, database::Database, query::Filter};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Product {
//!     pub name: String,
//!     pub price: i64,
//! }
//!
//! let database = Database::new();
//! database.initialize(builder, "").await?;
//!
//! let created = database
//!     .insert_one(DbCollection::Product, Product { name: "Lipid panel".into(), price: 120 })
//!     .await?
//!     .expect("inserted");
//!
//! let found = database
//!     .find_one::<Product>(DbCollection::Product, Filter::id(created.id().unwrap()))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as labstore_core;

pub mod backend;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod query;
pub mod sequence;
