//! Event and status queries over the record store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gungnir_cipher::Ciphers;
use gungnir_db::{DbError, RecordGetter};
use gungnir_types::{Event, Record, RecordType, Status};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::QueryConfig;
use crate::decode::RecordDecoder;
use crate::error::QueryError;
use crate::measures::Measures;
use crate::status::derive_status;

/// Limits and long-poll timing for [`EventQueryService`].
#[derive(Debug, Clone, Copy)]
pub struct QuerySettings {
    pub event_limit: usize,
    pub status_limit: usize,
    pub long_poll_sleep: Duration,
    pub long_poll_timeout: Duration,
}

impl From<&QueryConfig> for QuerySettings {
    fn from(config: &QueryConfig) -> Self {
        Self {
            event_limit: config.get_event_limit,
            status_limit: config.get_status_limit,
            long_poll_sleep: config.long_poll_sleep(),
            long_poll_timeout: config.long_poll_timeout(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

/// Answers event listing, long-poll, and status queries for one device at a
/// time. Holds no per-request state; records are fetched fresh each call.
pub struct EventQueryService {
    getter: Arc<dyn RecordGetter>,
    decoder: RecordDecoder,
    measures: Arc<Measures>,
    settings: QuerySettings,
}

impl EventQueryService {
    pub fn new(
        getter: Arc<dyn RecordGetter>,
        ciphers: Arc<Ciphers>,
        measures: Arc<Measures>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            getter,
            decoder: RecordDecoder::new(ciphers, Arc::clone(&measures)),
            measures,
            settings,
        }
    }

    /// Returns the device's most recent events and the cursor summarising
    /// them.
    ///
    /// # Errors
    ///
    /// `QueryError::Store` when the store fails, `QueryError::NoEvents` when
    /// the device has no live records.
    pub async fn get_device_info(&self, device_id: &str) -> Result<(Vec<Event>, String), QueryError> {
        let (records, hash) = self.fetch_events(device_id, None).await?;
        if records.is_empty() {
            return Err(QueryError::NoEvents {
                device_id: device_id.to_string(),
            });
        }

        let events = self.decoder.decode_events(&records, Utc::now());
        if events.is_empty() {
            return Err(QueryError::NoEvents {
                device_id: device_id.to_string(),
            });
        }

        self.measures.record_events_returned(events.len());
        Ok((events, hash))
    }

    /// Returns events stored after `cursor`, waiting for new ones to arrive
    /// when there are none yet.
    ///
    /// The store is polled every `long_poll_sleep` until events appear, the
    /// `long_poll_timeout` deadline passes, or `cancel` fires. Cancellation
    /// is noticed during the pause between polls, not only after it.
    ///
    /// # Errors
    ///
    /// `QueryError::Store` on any store failure, `QueryError::Cancelled` and
    /// `QueryError::Timeout` when waiting ends without events.
    pub async fn get_device_info_after_hash(
        &self,
        device_id: &str,
        cursor: &str,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Event>, String), QueryError> {
        let deadline = Instant::now() + self.settings.long_poll_timeout;

        let (records, mut hash) = self.fetch_events(device_id, Some(cursor)).await?;
        let mut events = self.decoder.decode_events(&records, Utc::now());

        while events.is_empty() {
            if cancel.is_cancelled() {
                return Err(self.cancelled(device_id, cursor));
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(device_id, cursor));
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.cancelled(device_id, cursor)),
                () = sleep_until(deadline) => return Err(self.timed_out(device_id, cursor)),
                () = sleep(self.settings.long_poll_sleep) => {}
            }

            let (records, next_hash) = self.fetch_events(device_id, Some(cursor)).await?;
            if records.is_empty() {
                continue;
            }
            hash = next_hash;
            events = self.decoder.decode_events(&records, Utc::now());
        }

        tracing::debug!(device_id, cursor, count = events.len(), "long poll found events");
        self.measures.record_events_returned(events.len());
        Ok((events, hash))
    }

    /// Derives the device's current status from its state records.
    ///
    /// # Errors
    ///
    /// `QueryError::Store` when the store fails, `QueryError::NoStateEvents`
    /// when no readable online or offline event exists.
    pub async fn get_status_info(&self, device_id: &str) -> Result<Status, QueryError> {
        let owned_id = device_id.to_string();
        let limit = self.settings.status_limit;
        let records = self
            .blocking(move |getter| {
                getter.get_records_of_type(&owned_id, limit, RecordType::State, None)
            })
            .await?
            .map_err(|source| QueryError::Store {
                device_id: device_id.to_string(),
                cursor: None,
                source,
            })?;

        let now = Utc::now();
        let states = self.decoder.decode_state_events(&records, now);
        derive_status(device_id, &states, now).ok_or_else(|| QueryError::NoStateEvents {
            device_id: device_id.to_string(),
        })
    }

    /// Fetches event records and their cursor on the blocking pool.
    ///
    /// The cursor is empty when there are no records or it cannot be
    /// computed.
    async fn fetch_events(
        &self,
        device_id: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<Record>, String), QueryError> {
        let owned_id = device_id.to_string();
        let owned_cursor = cursor.map(str::to_string);
        let limit = self.settings.event_limit;

        let fetched = self
            .blocking(move |getter| {
                let records = getter.get_records(&owned_id, limit, owned_cursor.as_deref())?;
                let hash = if records.is_empty() {
                    String::new()
                } else {
                    getter.get_state_hash(&records).unwrap_or_else(|e| {
                        tracing::warn!(device_id = %owned_id, error = %e, "failed to get latest hash from records");
                        String::new()
                    })
                };
                Ok::<_, DbError>((records, hash))
            })
            .await?;

        fetched.map_err(|source| QueryError::Store {
            device_id: device_id.to_string(),
            cursor: cursor.map(str::to_string),
            source,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, QueryError>
    where
        F: FnOnce(&dyn RecordGetter) -> T + Send + 'static,
        T: Send + 'static,
    {
        let getter = Arc::clone(&self.getter);
        Ok(tokio::task::spawn_blocking(move || f(getter.as_ref())).await?)
    }

    fn cancelled(&self, device_id: &str, cursor: &str) -> QueryError {
        QueryError::Cancelled {
            device_id: device_id.to_string(),
            cursor: cursor.to_string(),
        }
    }

    fn timed_out(&self, device_id: &str, cursor: &str) -> QueryError {
        QueryError::Timeout {
            device_id: device_id.to_string(),
            cursor: cursor.to_string(),
            timeout_ms: self.settings.long_poll_timeout.as_millis(),
        }
    }
}
