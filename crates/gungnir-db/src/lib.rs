//! Record store access for the Gungnir device information API.
//!
//! The API reads encrypted device records through the [`RecordGetter`]
//! trait and never writes them. This crate provides the SQLite-backed
//! implementation (`r2d2` pool, WAL mode, embedded migrations) and a
//! retrying wrapper used in production.
//!
//! # Cursors
//!
//! A cursor ("state hash") summarises a result set: it is the row id of the
//! newest record in the set. Fetching *after* a cursor returns only records
//! stored later, which is what long-polling clients rely on.

mod error;
mod migrations;
mod pool;
mod records;
mod retry;

pub use error::DbError;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use records::{insert_record, RecordGetter, SqliteRecordGetter};
pub use retry::RetryRecordGetter;
