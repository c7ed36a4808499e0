//! Decode and response counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every request. Constructed once at startup and passed
/// to the components that update them.
#[derive(Debug, Default)]
pub struct Measures {
    get_decrypter_failure: AtomicU64,
    decrypt_failure: AtomicU64,
    unmarshal_failure: AtomicU64,
    events_returned: AtomicU64,
}

impl Measures {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record named an algorithm and key id with no registered decrypter.
    pub fn record_get_decrypter_failure(&self) {
        self.get_decrypter_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decrypt_failure(&self) {
        self.decrypt_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmarshal_failure(&self) {
        self.unmarshal_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_returned(&self, count: usize) {
        self.events_returned
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MeasuresSnapshot {
        MeasuresSnapshot {
            get_decrypter_failure: self.get_decrypter_failure.load(Ordering::Relaxed),
            decrypt_failure: self.decrypt_failure.load(Ordering::Relaxed),
            unmarshal_failure: self.unmarshal_failure.load(Ordering::Relaxed),
            events_returned: self.events_returned.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`Measures`], served by `GET /metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeasuresSnapshot {
    pub get_decrypter_failure: u64,
    pub decrypt_failure: u64,
    pub unmarshal_failure: u64,
    pub events_returned: u64,
}
