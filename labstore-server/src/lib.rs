//! HTTP service exposing the lab data-access layer.

pub mod config;
pub mod error;
pub mod routes;
