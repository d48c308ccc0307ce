//! Configuration loading
//!
//! Loads database connection configuration from environment variables,
//! optionally reading from a .env file first.

use crate::prelude::ForgeError;
#[cfg(feature = "mysql")]
use std::time::Duration;
use std::{env, path::Path};
use tracing::{debug, error, trace, warn};

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    /// Schema whose tables are introspected
    pub database: Option<String>,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - DB_HOST (default: localhost)
    /// - DB_PORT (default: 3306)
    /// - DB_NAME (optional, the CLI may name the schema instead)
    /// - DB_USER (required)
    /// - DB_PASSWORD (required)
    pub fn from_env() -> Result<Self, ForgeError> {
        debug!("Loading database configuration from environment");

        let host = env::var("DB_HOST").unwrap_or_else(|_| {
            trace!("DB_HOST not set, using default");
            "localhost".to_string()
        });

        let port_str = env::var("DB_PORT").unwrap_or_else(|_| {
            trace!("DB_PORT not set, using default");
            "3306".to_string()
        });

        let port = port_str.parse::<u16>().map_err(|e| {
            error!(port = ?port_str, error = ?e, "Invalid DB_PORT value");
            ForgeError::Config("DB_PORT must be a valid port number".to_string())
        })?;

        let database = env::var("DB_NAME").ok();

        let user = env::var("DB_USER").map_err(|_| {
            error!("DB_USER environment variable is not set");
            ForgeError::Config("DB_USER environment variable is required".to_string())
        })?;

        let password = env::var("DB_PASSWORD").map_err(|_| {
            error!("DB_PASSWORD environment variable is not set");
            ForgeError::Config("DB_PASSWORD environment variable is required".to_string())
        })?;

        debug!(host = ?host, port = ?port, database = ?database, user = ?user, "Configuration loaded");

        Ok(Self {
            host,
            port,
            database,
            user,
            password,
        })
    }

    /// Load a .env file and then read configuration from environment
    pub fn load(env_file: &Path) -> Result<Self, ForgeError> {
        if env_file.exists() {
            debug!(path = ?env_file, "Loading environment file");
            dotenvy::from_path(env_file).map_err(|e| {
                error!(path = ?env_file, error = ?e, "Failed to load environment file");
                ForgeError::Config(format!("Failed to load {}: {}", env_file.display(), e))
            })?;
        } else {
            warn!(path = ?env_file, "Environment file not found, using existing environment");
        }

        Self::from_env()
    }

    /// Schema to introspect: the explicit one, else DB_NAME
    pub fn schema_name(&self, explicit: Option<&str>) -> Result<String, ForgeError> {
        explicit
            .map(str::to_string)
            .or_else(|| self.database.clone())
            .ok_or_else(|| {
                ForgeError::Config("No database given: pass --database or set DB_NAME".to_string())
            })
    }

    /// Connection options against the metadata catalog
    ///
    /// Credentials are passed as-is, never through a URL. `timeout` bounds
    /// connecting and every socket read or write.
    #[cfg(feature = "mysql")]
    pub fn mysql_opts(&self, timeout: Option<Duration>) -> mysql::OptsBuilder {
        let timeout = timeout.filter(|t| !t.is_zero());
        mysql::OptsBuilder::new()
            .ip_or_hostname(Some(self.host.as_str()))
            .tcp_port(self.port)
            .user(Some(self.user.as_str()))
            .pass(Some(self.password.as_str()))
            .db_name(Some("information_schema"))
            .tcp_connect_timeout(timeout)
            .read_timeout(timeout)
            .write_timeout(timeout)
    }

    /// Build a connection URL with password redacted (for logs and errors)
    pub fn redacted_url(&self) -> String {
        format!(
            "mysql://{}:***@{}:{}/information_schema",
            self.user, self.host, self.port
        )
    }
}
