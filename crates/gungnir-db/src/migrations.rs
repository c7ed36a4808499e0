//! Embedded schema migrations.
//!
//! The SQL files under `migrations/` are compiled into the binary and applied
//! in order at startup. Applied names are recorded in `_gungnir_migrations`,
//! so each one runs once per database.

use std::collections::HashSet;

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// In application order. Append only.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_records",
        sql: include_str!("migrations/001_records.sql"),
    },
];

const TRACKING_TABLE_SQL: &str = include_str!("migrations/000_init.sql");

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("failed to read applied migrations: {0}")]
    StateQuery(rusqlite::Error),
}

impl Migration {
    /// Runs the migration and records it in one transaction.
    fn apply(&self, conn: &Connection) -> Result<(), MigrationError> {
        let failed = |source| MigrationError::ExecutionFailed {
            name: self.name.to_string(),
            source,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(self.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _gungnir_migrations (name) VALUES (?1)",
            [self.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)
    }
}

/// Applies every migration not yet recorded and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError` if the applied set cannot be read or a migration
/// fails. A failed migration leaves no partial schema behind.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute_batch(TRACKING_TABLE_SQL)
        .map_err(|source| MigrationError::ExecutionFailed {
            name: "tracking table".to_string(),
            source,
        })?;

    let applied = applied_names(conn)?;
    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| !applied.contains(m.name))
        .collect();

    for migration in &pending {
        tracing::info!(migration = migration.name, "applying migration");
        migration.apply(conn)?;
    }
    Ok(pending.len())
}

fn applied_names(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    let mut stmt = conn
        .prepare("SELECT name FROM _gungnir_migrations")
        .map_err(MigrationError::StateQuery)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(MigrationError::StateQuery)?
        .collect::<Result<HashSet<_>, _>>()
        .map_err(MigrationError::StateQuery)?;
    Ok(names)
}
