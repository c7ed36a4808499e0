//! Record retrieval.

use gungnir_types::{Record, RecordType};
use rusqlite::{params, Connection, ToSql};

use crate::error::DbError;
use crate::pool::DbPool;

/// Read access to a device's stored records.
///
/// Implementations are blocking; async callers run them on the blocking
/// thread pool. Results are ordered newest first.
pub trait RecordGetter: Send + Sync {
    /// Returns up to `limit` records for `device_id`, optionally only those
    /// stored after the `after` cursor.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the store cannot be queried or the cursor is
    /// malformed.
    fn get_records(
        &self,
        device_id: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError>;

    /// Like [`RecordGetter::get_records`], restricted to one record type.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the store cannot be queried or the cursor is
    /// malformed.
    fn get_records_of_type(
        &self,
        device_id: &str,
        limit: usize,
        record_type: RecordType,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError>;

    /// Computes the cursor summarising `records`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::EmptyRecordSet` if `records` is empty.
    fn get_state_hash(&self, records: &[Record]) -> Result<String, DbError>;
}

/// [`RecordGetter`] over the SQLite `records` table.
#[derive(Clone)]
pub struct SqliteRecordGetter {
    pool: DbPool,
}

impl SqliteRecordGetter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn fetch(
        &self,
        device_id: &str,
        limit: usize,
        record_type: Option<RecordType>,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError> {
        let after_id = parse_cursor(after)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.pool.get()?;

        match record_type {
            Some(record_type) => read_records(
                &conn,
                "SELECT id, device_id, record_type, birth_date, death_date, data, nonce, alg, kid
                 FROM records
                 WHERE device_id = ?1 AND id > ?2 AND record_type = ?3
                 ORDER BY id DESC
                 LIMIT ?4",
                params![device_id, after_id, record_type.as_i64(), limit],
            ),
            None => read_records(
                &conn,
                "SELECT id, device_id, record_type, birth_date, death_date, data, nonce, alg, kid
                 FROM records
                 WHERE device_id = ?1 AND id > ?2
                 ORDER BY id DESC
                 LIMIT ?3",
                params![device_id, after_id, limit],
            ),
        }
    }
}

impl RecordGetter for SqliteRecordGetter {
    fn get_records(
        &self,
        device_id: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError> {
        self.fetch(device_id, limit, None, after)
    }

    fn get_records_of_type(
        &self,
        device_id: &str,
        limit: usize,
        record_type: RecordType,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError> {
        self.fetch(device_id, limit, Some(record_type), after)
    }

    fn get_state_hash(&self, records: &[Record]) -> Result<String, DbError> {
        records
            .iter()
            .map(|r| r.id)
            .max()
            .map(|id| id.to_string())
            .ok_or(DbError::EmptyRecordSet)
    }
}

/// Inserts a record and returns its assigned row id. The record's own `id`
/// is ignored.
///
/// # Errors
///
/// Returns `DbError::Query` on SQL failure.
pub fn insert_record(conn: &Connection, record: &Record) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO records (device_id, record_type, birth_date, death_date, data, nonce, alg, kid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.device_id,
            record.record_type.as_i64(),
            record.birth_date,
            record.death_date,
            record.data,
            record.nonce,
            record.alg,
            record.kid,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Parses a cursor into the row id records must be newer than.
fn parse_cursor(after: Option<&str>) -> Result<i64, DbError> {
    match after.map(str::trim) {
        None | Some("") => Ok(0),
        Some(cursor) => cursor
            .parse::<i64>()
            .ok()
            .filter(|id| *id >= 0)
            .ok_or_else(|| DbError::InvalidCursor(cursor.to_string())),
    }
}

fn read_records(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<Record>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, i64>(2)?,
            Record {
                id: row.get(0)?,
                device_id: row.get(1)?,
                record_type: RecordType::Default,
                birth_date: row.get(3)?,
                death_date: row.get(4)?,
                data: row.get(5)?,
                nonce: row.get(6)?,
                alg: row.get(7)?,
                kid: row.get(8)?,
            },
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (code, mut record) = row?;
        record.record_type =
            RecordType::from_i64(code).ok_or(DbError::UnknownRecordType(code, record.id))?;
        records.push(record);
    }
    Ok(records)
}
