//! HTTP service settings.

use std::env;

use labstore::error::{DbError, DbResult};

/// Port used when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Public URL of the service, if it is reachable under one.
    pub app_url: Option<String>,
}

impl ServerConfig {
    /// Reads `PORT` and `APP_URL` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] if `PORT` is not a valid port number.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| DbError::Configuration(format!("PORT is not a valid port: {port:?}")))?,
        };

        Ok(Self {
            port,
            app_url: lookup("APP_URL").filter(|url| !url.is_empty()),
        })
    }

    /// Address the server binds to.
    pub fn bind_address(&self) -> (&'static str, u16) {
        ("0.0.0.0", self.port)
    }

    /// URL to announce in the logs.
    pub fn public_url(&self) -> String {
        self.app_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}
