//! SQLite persistence via sqlx.
//!
//! Two pools share one database file: a sized read pool, and a
//! single-connection pool for writes that take the lock with
//! `BEGIN IMMEDIATE`. Serializing writers at the pool level keeps busy-timeout
//! churn out of the write path entirely.

pub mod models;
pub mod repositories;

use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

pub type DbPool = Pool<Sqlite>;

/// Same pool type, but initialized with `max_connections = 1`.
pub type WritePool = Pool<Sqlite>;

const READ_POOL_SIZE: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
/// Negative cache_size means KB: 64MB of page cache per connection.
const CACHE_SIZE_KB: i32 = -64000;
/// Checkpoint the WAL every ~4MB (1000 pages at the 4KB default page size).
const WAL_AUTOCHECKPOINT_PAGES: i32 = 1000;
const JOURNAL_SIZE_LIMIT_BYTES: i64 = 64 * 1024 * 1024;

/// Connection options shared by both pools. The `pragma` entries run on every
/// new connection, so reconnects keep the same tuning.
fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .create_if_missing(true)
        .pragma("wal_autocheckpoint", WAL_AUTOCHECKPOINT_PAGES.to_string())
        .pragma("journal_size_limit", JOURNAL_SIZE_LIMIT_BYTES.to_string())
        .pragma("cache_size", CACHE_SIZE_KB.to_string())
        .pragma("temp_store", "MEMORY"))
}

async fn build_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_with(connect_options(database_url)?)
        .await?;
    warn_unless_wal(&pool).await?;
    Ok(pool)
}

async fn warn_unless_wal(pool: &DbPool) -> Result<(), sqlx::Error> {
    let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
        .fetch_one(pool)
        .await?;
    // In-memory databases legitimately report "memory" instead of "wal".
    if mode != "wal" && mode != "memory" {
        tracing::warn!(journal_mode = %mode, "SQLite did not accept WAL journal mode");
    }
    Ok(())
}

pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = build_pool(database_url, READ_POOL_SIZE, Duration::from_secs(30)).await?;
    tracing::info!(max_connections = READ_POOL_SIZE, "Read pool ready");
    Ok(pool)
}

/// The write pool's single connection is the only one that ever attempts to
/// take the SQLite write lock; a longer acquire timeout lets writers queue
/// behind each other instead of failing.
pub async fn init_write_pool(database_url: &str) -> Result<WritePool, sqlx::Error> {
    let pool = build_pool(database_url, 1, Duration::from_secs(60)).await?;
    tracing::info!("Write pool ready, writes serialized on one connection");
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Applying pending migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations up to date");
    Ok(())
}

/// Open a transaction that takes the write lock up front. Deferred
/// transactions deadlock when two connections both try to upgrade from reader
/// to writer; `BEGIN IMMEDIATE` cannot reach that state.
pub async fn begin_immediate(pool: &WritePool) -> Result<ImmediateTransaction, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(ImmediateTransaction {
        conn,
        finished: false,
    })
}

/// A manually managed `BEGIN IMMEDIATE` transaction. Derefs to the underlying
/// connection so queries run inside it with `&mut *tx`.
pub struct ImmediateTransaction {
    conn: PoolConnection<Sqlite>,
    finished: bool,
}

impl ImmediateTransaction {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.end("COMMIT").await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.end("ROLLBACK").await
    }

    async fn end(mut self, sql: &'static str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&mut *self.conn).await?;
        self.finished = true;
        Ok(())
    }
}

impl std::ops::Deref for ImmediateTransaction {
    type Target = sqlx::SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for ImmediateTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if !self.finished {
            // A connection with an open transaction must not rejoin the pool.
            self.conn.close_on_drop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_pool_comes_up_in_wal_or_memory_mode() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(mode == "memory" || mode == "wal", "mode={mode}");
    }

    #[tokio::test]
    async fn immediate_transaction_commit_is_visible() {
        let pool = init_write_pool("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let mut tx = begin_immediate(&pool).await.unwrap();
        sqlx::query("INSERT INTO t (v) VALUES (7)")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn immediate_transaction_rollback_discards_writes() {
        let pool = init_write_pool("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let mut tx = begin_immediate(&pool).await.unwrap();
        sqlx::query("INSERT INTO t (v) VALUES (7)")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
