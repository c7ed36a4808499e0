//! Turns stored records into events.
//!
//! A record is decrypted with the decrypter registered for its algorithm and
//! key id, then decoded from msgpack. A record that fails either step never
//! fails the batch: the events listing keeps a placeholder in its place so
//! clients still see that something happened at that time, while status
//! derivation simply skips it. Each failure bumps its counter in
//! [`Measures`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gungnir_cipher::{CipherError, Ciphers};
use gungnir_types::{decode_message, CodecError, Event, Message, Record};
use thiserror::Error;

use crate::measures::Measures;

/// Payload key holding the reason a device went offline.
pub const REASON_FOR_CLOSURE: &str = "reason-for-closure";

/// Why a single record could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no decrypter for algorithm {alg:?} and key id {kid:?}")]
    DecrypterNotFound { alg: String, kid: String },

    #[error("failed to decrypt record: {0}")]
    Decrypt(#[from] CipherError),

    #[error("failed to decode decrypted record: {0}")]
    Unmarshal(#[from] CodecError),
}

/// A decoded state record and the offline reason found in its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    pub event: Event,
    /// Empty when the payload carried no reason.
    pub offline_reason: String,
}

#[derive(Clone)]
pub struct RecordDecoder {
    ciphers: Arc<Ciphers>,
    measures: Arc<Measures>,
}

impl RecordDecoder {
    pub fn new(ciphers: Arc<Ciphers>, measures: Arc<Measures>) -> Self {
        Self { ciphers, measures }
    }

    /// Decrypts and decodes one record, counting the failure if any.
    pub fn decode(&self, record: &Record) -> Result<Message, DecodeError> {
        let decrypter = match self.ciphers.get(&record.alg, &record.kid) {
            Some(d) => d,
            None => {
                self.measures.record_get_decrypter_failure();
                return Err(DecodeError::DecrypterNotFound {
                    alg: record.alg.clone(),
                    kid: record.kid.clone(),
                });
            }
        };

        let data = decrypter
            .decrypt_message(&record.data, &record.nonce)
            .inspect_err(|_| self.measures.record_decrypt_failure())?;

        decode_message(&data)
            .inspect_err(|_| self.measures.record_unmarshal_failure())
            .map_err(DecodeError::from)
    }

    /// Decodes records for the events listing, in input order.
    ///
    /// Expired records are dropped. Unreadable records become
    /// [`Event::placeholder`]s carrying only their birth date.
    pub fn decode_events(&self, records: &[Record], now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::with_capacity(records.len());
        for record in records {
            if record.is_expired(now) {
                tracing::debug!(
                    device_id = %record.device_id,
                    record_id = record.id,
                    "skipping expired record"
                );
                continue;
            }

            match self.decode(record) {
                Ok(message) => events.push(Event::new(message, record.birth_date)),
                Err(e) => {
                    tracing::error!(
                        device_id = %record.device_id,
                        record_id = record.id,
                        error = %e,
                        "failed to read record"
                    );
                    events.push(Event::placeholder(record.birth_date));
                }
            }
        }
        events
    }

    /// Decodes state records for status derivation, in input order.
    ///
    /// Expired and unreadable records are skipped.
    pub fn decode_state_events(&self, records: &[Record], now: DateTime<Utc>) -> Vec<StateEvent> {
        records
            .iter()
            .filter(|record| !record.is_expired(now))
            .filter_map(|record| match self.decode(record) {
                Ok(message) => {
                    let offline_reason = offline_reason(&message.payload).unwrap_or_default();
                    Some(StateEvent {
                        event: Event::new(message, record.birth_date),
                        offline_reason,
                    })
                }
                Err(e) => {
                    tracing::error!(
                        device_id = %record.device_id,
                        record_id = record.id,
                        error = %e,
                        "failed to read state record"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Extracts the `reason-for-closure` string from a JSON object payload.
fn offline_reason(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        return None;
    }
    let map: serde_json::Map<String, serde_json::Value> = match serde_json::from_slice(payload) {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!(error = %e, "state payload is not a JSON object");
            return None;
        }
    };
    match map.get(REASON_FOR_CLOSURE)? {
        serde_json::Value::String(reason) => Some(reason.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gungnir_cipher::{AlgorithmType, ChaChaCipher, Encrypter, NoopCipher};
    use gungnir_types::{encode_message, MessageType, RecordType};

    const KEY: [u8; 32] = [7; 32];

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 0).unwrap()
    }

    fn decoder() -> (RecordDecoder, Arc<Measures>) {
        let mut ciphers = Ciphers::new();
        ciphers.register(AlgorithmType::None, "none", Arc::new(NoopCipher));
        ciphers.register(
            AlgorithmType::ChaCha20Poly1305,
            "current",
            Arc::new(ChaChaCipher::new(KEY)),
        );
        let measures = Arc::new(Measures::new());
        (
            RecordDecoder::new(Arc::new(ciphers), Arc::clone(&measures)),
            measures,
        )
    }

    fn is_placeholder(event: &Event) -> bool {
        event.message.message_type == MessageType::Unknown
            && event.message.source.is_empty()
            && event.message.destination.is_empty()
            && event.message.payload.is_empty()
    }

    fn message(dest: &str, payload: &[u8]) -> Message {
        Message {
            message_type: MessageType::SimpleEvent,
            source: "dns:talaria".to_string(),
            destination: dest.to_string(),
            partner_ids: vec!["comcast".to_string()],
            session_id: "session-1".to_string(),
            payload: payload.to_vec(),
            ..Message::default()
        }
    }

    fn record(message: &Message, birth_date: i64) -> Record {
        let data = encode_message(message).unwrap();
        let (data, nonce) = ChaChaCipher::new(KEY).encrypt_message(&data).unwrap();
        Record {
            id: birth_date,
            device_id: "mac:112233445566".to_string(),
            record_type: RecordType::State,
            birth_date,
            death_date: i64::MAX,
            data,
            nonce,
            alg: "chacha20poly1305".to_string(),
            kid: "current".to_string(),
        }
    }

    #[test]
    fn encrypted_record_round_trips() {
        let (decoder, measures) = decoder();
        let source = message("event:device-status/mac:112233445566/online", b"");
        let events = decoder.decode_events(&[record(&source, 100)], now());

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.birth_date, 100);
        assert_eq!(event.message.source, source.source);
        assert_eq!(event.message.destination, source.destination);
        assert_eq!(event.message.partner_ids, source.partner_ids);
        assert_eq!(event.message.session_id, source.session_id);
        assert_eq!(measures.snapshot().decrypt_failure, 0);
    }

    #[test]
    fn expired_records_are_dropped() {
        let (decoder, _) = decoder();
        let mut expired = record(&message("a/online", b""), 1);
        expired.death_date = now().timestamp_nanos_opt().unwrap() - 1;
        let live = record(&message("a/online", b""), 2);

        let events = decoder.decode_events(&[expired, live], now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].birth_date, 2);
    }

    #[test]
    fn unknown_decrypter_yields_placeholder_in_position() {
        let (decoder, measures) = decoder();
        let first = record(&message("a/online", b""), 1);
        let mut unknown = record(&message("a/offline", b""), 2);
        unknown.kid = "retired".to_string();
        let last = record(&message("a/online", b""), 3);

        let events = decoder.decode_events(&[first, unknown, last], now());

        assert_eq!(events.len(), 3);
        assert!(!is_placeholder(&events[0]));
        assert!(is_placeholder(&events[1]));
        assert_eq!(events[1].message.message_type, MessageType::Unknown);
        assert_eq!(events[1].birth_date, 2);
        assert!(!is_placeholder(&events[2]));
        assert_eq!(measures.snapshot().get_decrypter_failure, 1);
    }

    #[test]
    fn tampered_ciphertext_counts_decrypt_failure() {
        let (decoder, measures) = decoder();
        let mut tampered = record(&message("a/online", b""), 5);
        tampered.data[0] ^= 0xff;

        let events = decoder.decode_events(&[tampered], now());
        assert!(is_placeholder(&events[0]));
        assert_eq!(measures.snapshot().decrypt_failure, 1);
    }

    #[test]
    fn garbage_plaintext_counts_unmarshal_failure() {
        let (decoder, measures) = decoder();
        let record = Record {
            id: 1,
            device_id: "dev".to_string(),
            record_type: RecordType::Default,
            birth_date: 9,
            death_date: i64::MAX,
            data: vec![0xc1, 0xc1, 0xc1],
            nonce: Vec::new(),
            alg: "none".to_string(),
            kid: "none".to_string(),
        };

        let events = decoder.decode_events(&[record], now());
        assert!(is_placeholder(&events[0]));
        assert_eq!(measures.snapshot().unmarshal_failure, 1);
    }

    #[test]
    fn state_path_skips_failures_and_reads_reason() {
        let (decoder, measures) = decoder();
        let offline = record(
            &message(
                "event:device-status/mac:112233445566/offline",
                br#"{"reason-for-closure":"ping miss","id":"mac:112233445566"}"#,
            ),
            10,
        );
        let mut broken = record(&message("a/online", b""), 11);
        broken.alg = "rot13".to_string();
        let online = record(&message("a/online", b"not json"), 12);

        let states = decoder.decode_state_events(&[offline, broken, online], now());

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].offline_reason, "ping miss");
        assert_eq!(states[0].event.birth_date, 10);
        assert_eq!(states[1].offline_reason, "");
        assert_eq!(measures.snapshot().get_decrypter_failure, 1);
    }

    #[test]
    fn state_path_drops_expired_records() {
        let (decoder, _) = decoder();
        let mut expired = record(
            &message(
                "event:device-status/mac:112233445566/offline",
                br#"{"reason-for-closure":"ping miss"}"#,
            ),
            10,
        );
        expired.death_date = now().timestamp_nanos_opt().unwrap() - 1;
        let live = record(&message("event:device-status/mac:112233445566/online", b""), 11);

        let states = decoder.decode_state_events(&[expired, live], now());

        assert_eq!(states.len(), 1);
        assert_eq!(states[0].event.birth_date, 11);
        assert_eq!(states[0].offline_reason, "");
    }

    #[test]
    fn reason_must_be_a_string() {
        assert_eq!(offline_reason(br#"{"reason-for-closure":42}"#), None);
        assert_eq!(offline_reason(br#"["reason-for-closure"]"#), None);
        assert_eq!(offline_reason(b""), None);
        assert_eq!(
            offline_reason(br#"{"reason-for-closure":"readerror"}"#).as_deref(),
            Some("readerror")
        );
    }
}
