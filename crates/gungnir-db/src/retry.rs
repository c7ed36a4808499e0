//! Retrying record getter.

use std::time::Duration;

use gungnir_types::{Record, RecordType};

use crate::error::DbError;
use crate::records::RecordGetter;

/// Wraps a [`RecordGetter`] and retries failed fetches.
///
/// A fetch is attempted once plus up to `retries` more times, sleeping
/// `interval` between attempts. Malformed cursors are not retried. Sleeping
/// blocks the calling thread, so callers must already be on a blocking
/// thread.
pub struct RetryRecordGetter<G> {
    inner: G,
    retries: u32,
    interval: Duration,
}

impl<G: RecordGetter> RetryRecordGetter<G> {
    pub fn new(inner: G, retries: u32, interval: Duration) -> Self {
        Self {
            inner,
            retries,
            interval,
        }
    }

    fn with_retries<T>(
        &self,
        device_id: &str,
        mut op: impl FnMut(&G) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut attempt = 0;
        loop {
            match op(&self.inner) {
                Ok(value) => return Ok(value),
                Err(e @ DbError::InvalidCursor(_)) => return Err(e),
                Err(e) if attempt >= self.retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        device_id,
                        attempt,
                        retries = self.retries,
                        error = %e,
                        "failed to get records, retrying"
                    );
                    std::thread::sleep(self.interval);
                }
            }
        }
    }
}

impl<G: RecordGetter> RecordGetter for RetryRecordGetter<G> {
    fn get_records(
        &self,
        device_id: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError> {
        self.with_retries(device_id, |g| g.get_records(device_id, limit, after))
    }

    fn get_records_of_type(
        &self,
        device_id: &str,
        limit: usize,
        record_type: RecordType,
        after: Option<&str>,
    ) -> Result<Vec<Record>, DbError> {
        self.with_retries(device_id, |g| {
            g.get_records_of_type(device_id, limit, record_type, after)
        })
    }

    fn get_state_hash(&self, records: &[Record]) -> Result<String, DbError> {
        self.inner.get_state_hash(records)
    }
}
