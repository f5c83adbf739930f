//! Database client and connection management

use crate::{schema, DbError, DbResult};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

/// Database client wrapping sqlx connection pool
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    /// Create a new database client from connection string
    pub async fn new(database_url: &str) -> DbResult<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));
        Self::with_options(opts).await
    }

    /// Create a new database client with custom options
    pub async fn with_options(opts: SqliteConnectOptions) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory store with the schema already applied
    ///
    /// The pool holds exactly one connection that never expires; the
    /// database lives as long as that connection does.
    pub async fn in_memory() -> DbResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let client = Self { pool };
        client.migrate().await?;
        Ok(client)
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a write transaction
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Test the database connection
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the base and rollup tables if they do not exist
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> DbResult<()> {
        for statement in schema::schema_statements() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        debug!("Schema ready");
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Build SQLite connection options for a file-backed store
pub struct DbConnectionBuilder {
    path: PathBuf,
    create_if_missing: bool,
    busy_timeout: Duration,
    synchronous: SqliteSynchronous,
}

impl DbConnectionBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            busy_timeout: Duration::from_secs(30),
            synchronous: SqliteSynchronous::Normal,
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Use `FULL` synchronous mode (fsync on every commit)
    pub fn durable(mut self) -> Self {
        self.synchronous = SqliteSynchronous::Full;
        self
    }

    pub fn build(self) -> DbResult<SqliteConnectOptions> {
        if self.path.as_os_str().is_empty() {
            return Err(DbError::ConfigError("database path is empty".into()));
        }

        Ok(SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(self.synchronous)
            .busy_timeout(self.busy_timeout))
    }
}
