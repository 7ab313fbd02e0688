//! Engine configuration, stored as TOML.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::{connect, ConnectionConfig, PoolConfig, SqlEngine};
use crate::dialect::Dialect;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `mysql`, `postgres` or `sqlserver`; checked when the config is resolved.
    pub dialect: String,
    /// Logical database (MySQL) or schema name.
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_fetch_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_timeout_ms: Option<u64>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl EngineConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crudsql")
            .join("engine.toml")
    }

    /// Load from `path`, or from [`EngineConfig::default_path`] when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn dialect(&self) -> Result<Dialect> {
        self.dialect.parse()
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }

    /// Fill an empty password from `PGPASSWORD`, then from an interactive prompt.
    pub fn resolve_password(&mut self) -> Result<()> {
        if !self.connection.password.is_empty() {
            return Ok(());
        }
        if let Ok(pw) = std::env::var("PGPASSWORD") {
            self.connection.password = pw;
            return Ok(());
        }
        let prompt = format!("Password for {}: ", self.connection.display_string());
        self.connection.password = rpassword::read_password_from_tty(Some(&prompt))
            .map_err(|e| Error::Config(format!("cannot read password: {}", e)))?;
        Ok(())
    }

    /// Build an engine over the bundled PostgreSQL driver.
    ///
    /// MySQL and SQL Server engines are built with [`SqlEngine::new`] over a
    /// caller-supplied [`crate::db::Backend`].
    pub fn build_engine(&self) -> Result<SqlEngine> {
        let dialect = self.dialect()?;
        if dialect != Dialect::Postgres {
            return Err(Error::Config(format!(
                "no driver bundled for database ({}); supply a Backend implementation",
                dialect
            )));
        }
        let backend = connect(&self.connection, &self.pool)?;
        Ok(SqlEngine::new(Arc::new(backend), dialect, self.database.clone())
            .with_fetch_limit(self.query_fetch_limit)
            .with_statement_timeout(self.statement_timeout()))
    }
}
