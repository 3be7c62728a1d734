//! Configuration types for store access and logging.

use std::time::Duration;

/// Connection settings for [`CouchClient`](crate::storage::CouchClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base URL of the store server, without the database name.
    pub url: String,
    /// Database holding the documents and design documents.
    pub database: String,
    /// Basic-auth user. No auth header is sent when `None`.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Maximum time to wait for one HTTP request to complete.
    pub request_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5984".to_string(),
            database: "viewfind".to_string(),
            username: None,
            password: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// URL of the configured database, with trailing slashes removed from
    /// the base.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), self.database)
    }
}

/// Settings for [`logging::init`](crate::logging::init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
