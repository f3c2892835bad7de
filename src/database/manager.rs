use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::schema;
use crate::types::ServiceKind;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Invalid database name: {0}")]
    InvalidName(String),

    #[error("Service '{0}' has no database")]
    NoDatabase(ServiceKind),

    #[error("Failed to prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
enum Backing {
    Files(PathBuf),
    Memory,
}

/// Per-service SQLite pool cache. Schemas are created when a pool is first opened.
#[derive(Clone)]
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<String, SqlitePool>>>,
    backing: Backing,
    max_connections: u32,
    connect_timeout: Duration,
}

impl DatabaseManager {
    /// File-backed databases under `config.data_dir`
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            backing: Backing::Files(PathBuf::from(&config.data_dir)),
            max_connections: config.max_connections.max(1),
            connect_timeout: Duration::from_secs(config.connection_timeout),
        }
    }

    /// Private in-memory database per service, living as long as the manager's pools.
    pub fn in_memory() -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            backing: Backing::Memory,
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Get existing pool or create a new one lazily
    pub async fn pool(&self, service: ServiceKind) -> Result<SqlitePool, DatabaseError> {
        if !service.has_database() {
            return Err(DatabaseError::NoDatabase(service));
        }
        let name = service.as_str();

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(name) {
                return Ok(pool.clone());
            }
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(name) {
            return Ok(pool.clone());
        }

        let pool = self.open(name).await?;
        schema::migrate(&pool, service).await?;
        pools.insert(name.to_string(), pool.clone());

        info!("Created database pool for: {}", name);
        Ok(pool)
    }

    async fn open(&self, name: &str) -> Result<SqlitePool, DatabaseError> {
        let options = match &self.backing {
            Backing::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
            Backing::Files(dir) => {
                let url = Self::database_url(dir, name)?;
                if url.starts_with("sqlite://") && !url.contains(":memory:") {
                    tokio::fs::create_dir_all(dir).await?;
                }
                SqliteConnectOptions::from_str(&url)?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
            }
        }
        .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(self.connect_timeout);
        pool_options = match self.backing {
            // An in-memory database disappears with its last connection
            Backing::Memory => pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
            Backing::Files(_) => pool_options.max_connections(self.max_connections),
        };

        Ok(pool_options.connect_with(options).await?)
    }

    /// `{SERVICE}_DATABASE_URL` wins, otherwise `sqlite://{dir}/{name}.db`.
    fn database_url(dir: &std::path::Path, name: &str) -> Result<String, DatabaseError> {
        if !Self::is_valid_db_name(name) {
            return Err(DatabaseError::InvalidName(name.to_string()));
        }

        let env_key = format!("{}_DATABASE_URL", name.to_ascii_uppercase());
        if let Ok(url) = std::env::var(&env_key) {
            if !url.starts_with("sqlite:") {
                return Err(DatabaseError::InvalidDatabaseUrl(url));
            }
            return Ok(url);
        }

        Ok(format!("sqlite://{}/{}.db", dir.display(), name))
    }

    /// Pings a pool to ensure connectivity
    pub async fn health_check(pool: &SqlitePool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }

    /// Database names become file names: lowercase ASCII letters and `_` only.
    fn is_valid_db_name(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
    }
}
