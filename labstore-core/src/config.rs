//! Connection settings consumed at initialization.

use std::env;

use crate::error::{DbError, DbResult};

/// Default store URI used when `DB_URI` is not set.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Store connection settings.
///
/// The layer does not load these itself; the surrounding service builds a config (usually
/// with [`DatabaseConfig::from_env`]) and hands it to the initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Store connection URI.
    pub uri: String,
    /// Name of the database holding the collections.
    pub name: String,
    /// Prefix prepended to every physical collection name.
    pub prefix: String,
}

impl DatabaseConfig {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Reads `DB_URI`, `DB_NAME` and `DB_PREFIX` from the environment.
    ///
    /// `DB_URI` defaults to [`DEFAULT_URI`] and `DB_PREFIX` to an empty prefix.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] if `DB_NAME` is missing or empty.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let name = lookup("DB_NAME")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DbError::Configuration("DB_NAME is not set".to_string()))?;

        Ok(Self {
            uri: lookup("DB_URI").unwrap_or_else(|| DEFAULT_URI.to_string()),
            name,
            prefix: lookup("DB_PREFIX").unwrap_or_default(),
        })
    }
}
