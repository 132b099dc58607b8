//! Backend selection from the connection URI.

use log::info;

use labstore_core::{
    config::DatabaseConfig,
    database::Database,
    error::{DbError, DbResult},
};
use labstore_memory::InMemoryStore;

/// Storage backend named by a connection URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `memory://`
    Memory,
    /// `mongodb://` or `mongodb+srv://`
    MongoDb,
}

impl BackendKind {
    /// Determines the backend from the scheme of `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] for a URI without a scheme or with an unknown one.
    pub fn from_uri(uri: &str) -> DbResult<Self> {
        let Some((scheme, _)) = uri.split_once("://") else {
            return Err(DbError::Configuration(format!("Database URI has no scheme: {uri:?}")));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "mongodb" | "mongodb+srv" => Ok(BackendKind::MongoDb),
            other => Err(DbError::Configuration(format!("Unsupported database URI scheme: {other}"))),
        }
    }
}

/// Initializes `database` with the backend `config.uri` names.
///
/// `on_ready` runs once the connection has been verified and stored.
///
/// # Errors
///
/// Returns [`DbError::Configuration`] for an unsupported scheme, or for a MongoDB URI when
/// the crate was built without the `mongodb` feature. Connection failures are reported as
/// by [`Database::initialize_with`].
pub async fn initialize(
    database: &Database,
    config: &DatabaseConfig,
    on_ready: impl FnOnce(),
) -> DbResult<()> {
    let kind = BackendKind::from_uri(&config.uri)?;
    info!("Connecting to {kind:?} database {}", config.name);

    match kind {
        BackendKind::Memory => {
            database
                .initialize_with(InMemoryStore::builder(), config.prefix.clone(), on_ready)
                .await
        }
        #[cfg(feature = "mongodb")]
        BackendKind::MongoDb => {
            database
                .initialize_with(
                    labstore_mongodb::MongoDbStore::builder(&config.uri, &config.name),
                    config.prefix.clone(),
                    on_ready,
                )
                .await
        }
        #[cfg(not(feature = "mongodb"))]
        BackendKind::MongoDb => Err(DbError::Configuration(
            "MongoDB support requires the `mongodb` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes_select_backends() {
        assert_eq!(BackendKind::from_uri("memory://").unwrap(), BackendKind::Memory);
        assert_eq!(BackendKind::from_uri("mongodb://localhost:27017").unwrap(), BackendKind::MongoDb);
        assert_eq!(BackendKind::from_uri("mongodb+srv://cluster0.example.net").unwrap(), BackendKind::MongoDb);
    }

    #[test]
    fn unknown_schemes_are_configuration_errors() {
        assert!(matches!(BackendKind::from_uri("postgres://db"), Err(DbError::Configuration(_))));
        assert!(matches!(BackendKind::from_uri("localhost"), Err(DbError::Configuration(_))));
    }

    #[tokio::test]
    async fn memory_uri_initializes_and_calls_back() {
        let database = Database::new();
        let config = DatabaseConfig::new("memory://", "lab").with_prefix("test_");
        let mut called = false;

        initialize(&database, &config, || called = true).await.unwrap();

        assert!(called);
        assert!(database.is_ready().await);
    }
}
