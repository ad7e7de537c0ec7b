//! SQLite graph store
//!
//! Persistent backend over rusqlite with WAL mode, versioned schema
//! migrations, and a TTL-bounded query-result cache. Uses a simple
//! `Arc<Mutex<Connection>>` pattern; SQLite in WAL mode allows multiple
//! readers but only one writer, so a mutex is enough for one process.

pub mod error;
pub mod query_cache;
pub mod schema;
pub mod store;

pub use error::{SqliteError, SqliteResult};
pub use query_cache::{QueryCache, QueryCacheConfig};
pub use store::SqliteGraphStore;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for the SQLite backend
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Database file path; `:memory:` for an in-process database
    pub path: PathBuf,
    /// Write-ahead logging for concurrent reads
    pub wal_mode: bool,
    /// How long a busy connection waits before failing
    pub busy_timeout_ms: u32,
    /// Query-result cache settings
    pub cache: QueryCacheConfig,
}

impl SqliteStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
            busy_timeout_ms: 5_000,
            cache: QueryCacheConfig::default(),
        }
    }

    /// In-memory database for testing
    pub fn memory() -> Self {
        Self {
            wal_mode: false,
            ..Self::new(":memory:")
        }
    }
}

/// Thread-safe SQLite connection wrapper
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    config: SqliteStoreConfig,
}

impl SqlitePool {
    /// Open the database, configure pragmas, and apply schema migrations
    pub fn new(config: SqliteStoreConfig) -> SqliteResult<Self> {
        info!(path = ?config.path, "Opening SQLite graph store");

        let conn = if config.path.to_str() == Some(":memory:") {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqliteError::Connection(format!("failed to create directory: {e}"))
                })?;
            }
            Connection::open(&config.path)?
        };

        let pool = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        pool.initialize()?;
        Ok(pool)
    }

    /// In-memory pool for testing
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteStoreConfig::memory())
    }

    /// Execute a closure with the connection
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a closure with mutable access (transactions)
    pub fn with_connection_mut<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&mut Connection) -> SqliteResult<T>,
    {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    fn initialize(&self) -> SqliteResult<()> {
        self.with_connection(|conn| {
            self.configure_pragmas(conn)?;
            schema::apply_migrations(conn)?;
            info!("SQLite graph store initialized");
            Ok(())
        })
    }

    fn configure_pragmas(&self, conn: &Connection) -> SqliteResult<()> {
        debug!("Configuring SQLite pragmas");
        if self.config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};",
            self.config.busy_timeout_ms
        ))?;
        conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
        Ok(())
    }
}
