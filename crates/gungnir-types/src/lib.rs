//! Shared types for the Gungnir device information API.
//!
//! This crate provides the foundational types used across all Gungnir crates:
//! the stored [`Record`] as read from the record store, the routing
//! [`Message`] envelope carried inside each record, the decoded [`Event`]
//! returned to API consumers, and the derived device [`Status`].
//!
//! No crate in the workspace depends on anything *except* `gungnir-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod event;
mod message;

pub use event::Event;
pub use message::{decode_message, encode_message, CodecError, Message, MessageType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State name carried by device-online events.
pub const STATE_ONLINE: &str = "online";

/// State name carried by device-offline events.
pub const STATE_OFFLINE: &str = "offline";

/// Kind of a stored record.
///
/// The numeric codes are the ones persisted by the record writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordType {
    /// Any event that is not a device state transition.
    Default = 0,
    /// A device online/offline transition.
    State = 1,
}

impl RecordType {
    /// Returns the numeric code for this record type.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Attempts to convert a numeric code to a `RecordType`.
    ///
    /// Returns `None` if the code does not correspond to a known type.
    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Default),
            1 => Some(Self::State),
            _ => None,
        }
    }
}

/// An encrypted event as persisted in the record store.
///
/// Records are read-only inputs: the API never writes them back. Timestamps
/// are Unix nanoseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Store-assigned row identifier. Monotonically increasing per store.
    pub id: i64,
    /// Lower-cased device identifier the record belongs to.
    pub device_id: String,
    /// Whether the record is a state transition or a plain event.
    pub record_type: RecordType,
    /// When the event was captured.
    pub birth_date: i64,
    /// When the record stops being valid.
    pub death_date: i64,
    /// Encrypted, msgpack-encoded [`Message`].
    pub data: Vec<u8>,
    /// Nonce used when the data was encrypted.
    pub nonce: Vec<u8>,
    /// Encryption algorithm tag (e.g. `chacha20poly1305`).
    pub alg: String,
    /// Identifier of the key the data was encrypted with.
    pub kid: String,
}

impl Record {
    /// Returns `true` if the record's death date lies before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let now_nanos = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.death_date < now_nanos
    }
}

/// The current state of a device, how long it has been like that, and the
/// last reason for going offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The device id.
    #[serde(rename = "deviceid")]
    pub device_id: String,
    /// State of the device, e.g. `online` or `offline`.
    pub state: String,
    /// When the event that established the state was created.
    pub since: DateTime<Utc>,
    /// When the status was evaluated.
    pub now: DateTime<Utc>,
    /// The last reason the device went offline.
    pub last_offline_reason: String,
    /// The partner ids taken from the same event that provides the state.
    pub partner_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(death_date: i64) -> Record {
        Record {
            id: 1,
            device_id: "mac:112233445566".to_string(),
            record_type: RecordType::State,
            birth_date: 0,
            death_date,
            data: Vec::new(),
            nonce: Vec::new(),
            alg: "none".to_string(),
            kid: "none".to_string(),
        }
    }

    #[test]
    fn record_type_codes_round_trip() {
        assert_eq!(RecordType::from_i64(0), Some(RecordType::Default));
        assert_eq!(RecordType::from_i64(1), Some(RecordType::State));
        assert_eq!(RecordType::from_i64(7), None);
        assert_eq!(RecordType::State.as_i64(), 1);
    }

    #[test]
    fn record_expiry_is_relative_to_now() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let now_nanos = now.timestamp_nanos_opt().unwrap();

        assert!(record(now_nanos - 1).is_expired(now));
        assert!(!record(now_nanos).is_expired(now));
        assert!(!record(now_nanos + 1).is_expired(now));
    }

    #[test]
    fn status_serializes_with_wire_field_names() {
        let at = Utc.timestamp_opt(1_550_000_000, 0).unwrap();
        let status = Status {
            device_id: "mac:112233445566".to_string(),
            state: STATE_ONLINE.to_string(),
            since: at,
            now: at,
            last_offline_reason: "ping miss".to_string(),
            partner_ids: vec!["comcast".to_string()],
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["deviceid"], "mac:112233445566");
        assert_eq!(json["state"], "online");
        assert_eq!(json["since"], "2019-02-12T19:33:20Z");
        assert_eq!(json["last_offline_reason"], "ping miss");
        assert_eq!(json["partner_ids"][0], "comcast");
    }
}
