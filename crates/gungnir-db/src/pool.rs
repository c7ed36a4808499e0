//! r2d2 pool over the SQLite record store.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;

/// Connection tunables, all in milliseconds except the pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
    /// How long a caller waits for a free pooled connection.
    pub connection_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            connection_timeout_ms: 10_000,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create record store pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool on the database file at `db_path`.
///
/// Each connection is switched to WAL so readers never block the writer that
/// appends records. `:memory:` paths give every connection its own empty
/// database.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if no connection can be opened and set up.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager =
        SqliteConnectionManager::file(db_path).with_init(move |conn| init_connection(conn, busy_timeout));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(Duration::from_millis(settings.connection_timeout_ms))
        .build(manager)?;

    tracing::debug!(path = db_path, max_size = settings.pool_max_size, "opened record store pool");
    Ok(pool)
}

fn init_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal mode is {mode}, expected wal")),
        ));
    }
    conn.busy_timeout(busy_timeout)
}
