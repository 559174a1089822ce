//! Configuration for the assignment engine

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::Result;

/// Prefix for environment overrides, e.g. `CIVROUTE_DATABASE_URL`
pub const ENV_PREFIX: &str = "CIVROUTE";

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentConfig {
    /// SQLite connection string
    pub database_url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long a transaction waits on a locked report before failing
    pub busy_timeout_ms: u64,
    /// Actor recorded on ledger entries written by automatic decisions
    pub system_actor_id: String,
}

impl AssignmentConfig {
    /// Load configuration from `CIVROUTE_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("busy_timeout_ms", defaults.busy_timeout_ms as i64)?
            .set_default("system_actor_id", defaults.system_actor_id)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Configuration pointing at an explicit database, everything else default
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://civroute.db?mode=rwc".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            system_actor_id: "system".to_string(),
        }
    }
}
