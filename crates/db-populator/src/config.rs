//! Connection configuration read from the environment.

use crate::error::PopulatorError;
use std::fmt;

/// Environment variable holding the database user.
pub const DB_USER: &str = "DB_USER";
/// Environment variable holding the database password.
pub const DB_PASSWORD: &str = "DB_PASSWORD";
/// Environment variable holding the database host.
pub const DB_HOST: &str = "DB_HOST";
/// Environment variable holding the database port.
pub const DB_PORT: &str = "DB_PORT";
/// Environment variable holding the database name.
pub const DB_NAME: &str = "DB_NAME";

/// PostgreSQL connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub dbname: String,
}

impl DbConfig {
    /// Read `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT` and `DB_NAME`.
    pub fn from_env() -> Result<Self, PopulatorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PopulatorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .ok_or_else(|| PopulatorError::Config(format!("{key} environment variable is not set")))
        };

        let port_str = require(DB_PORT)?;
        let port = port_str.trim().parse::<u16>().map_err(|e| {
            PopulatorError::Config(format!("{DB_PORT} must be a port number, got '{port_str}': {e}"))
        })?;

        Ok(Self {
            user: require(DB_USER)?,
            password: require(DB_PASSWORD)?,
            host: require(DB_HOST)?,
            port,
            dbname: require(DB_NAME)?,
        })
    }

    /// Convert into a tokio-postgres connection config.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .user(&self.user)
            .password(&self.password)
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname);
        config
    }
}

// Keeps the password out of logs.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .finish_non_exhaustive()
    }
}
