//! The routing message envelope stored inside every record.
//!
//! Messages are persisted as msgpack maps keyed by field name. The same
//! struct serialises to JSON for API responses, where the binary payload is
//! rendered as standard base64.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Routing message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MessageType {
    /// Reserved, never valid on the wire.
    Invalid0,
    /// Reserved, never valid on the wire.
    Invalid1,
    /// Authorization status.
    Authorization,
    /// Request expecting a response.
    SimpleRequestResponse,
    /// Fire-and-forget event.
    SimpleEvent,
    /// CRUD create.
    Create,
    /// CRUD retrieve.
    Retrieve,
    /// CRUD update.
    Update,
    /// CRUD delete.
    Delete,
    /// Service registration.
    ServiceRegistration,
    /// Service keep-alive.
    ServiceAlive,
    /// Anything the decoder could not classify, including records that
    /// could not be decrypted or decoded.
    #[default]
    Unknown,
}

impl MessageType {
    /// Returns the numeric wire code.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Invalid0 => 0,
            Self::Invalid1 => 1,
            Self::Authorization => 2,
            Self::SimpleRequestResponse => 3,
            Self::SimpleEvent => 4,
            Self::Create => 5,
            Self::Retrieve => 6,
            Self::Update => 7,
            Self::Delete => 8,
            Self::ServiceRegistration => 9,
            Self::ServiceAlive => 10,
            Self::Unknown => 11,
        }
    }

    /// Converts a wire code. Unrecognized codes map to `Unknown`.
    pub fn from_i64(code: i64) -> Self {
        match code {
            0 => Self::Invalid0,
            1 => Self::Invalid1,
            2 => Self::Authorization,
            3 => Self::SimpleRequestResponse,
            4 => Self::SimpleEvent,
            5 => Self::Create,
            6 => Self::Retrieve,
            7 => Self::Update,
            8 => Self::Delete,
            9 => Self::ServiceRegistration,
            10 => Self::ServiceAlive,
            _ => Self::Unknown,
        }
    }
}

impl From<i64> for MessageType {
    fn from(code: i64) -> Self {
        Self::from_i64(code)
    }
}

impl From<MessageType> for i64 {
    fn from(message_type: MessageType) -> Self {
        message_type.as_i64()
    }
}

/// A routed message.
///
/// Empty fields are omitted when serialising and default when missing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "msg_type", default)]
    pub message_type: MessageType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Destination locator; the last path segment of a device-status event
    /// is the state name.
    #[serde(rename = "dest", default, skip_serializing_if = "String::is_empty")]
    pub destination: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_uuid: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub accept: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,

    #[serde(rename = "rdr", default, skip_serializing_if = "Option::is_none")]
    pub request_delivery_response: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "payload_bytes")]
    pub payload: Vec<u8>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partner_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
}

impl Message {
    /// Returns the state name encoded in the destination: its last `/`
    /// separated segment (`online`, `offline`, ...).
    pub fn state_name(&self) -> &str {
        let trimmed = self.destination.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((_, last)) => last,
            None => trimmed,
        }
    }
}

/// Errors produced when encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The bytes are not a valid msgpack message.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Decodes a msgpack-encoded message.
///
/// # Errors
///
/// Returns `CodecError::Decode` if the bytes are not a msgpack map of
/// message fields.
pub fn decode_message(bytes: &[u8]) -> Result<Message, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encodes a message as a msgpack map keyed by field name.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialisation fails.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(message)?)
}

/// Payload bytes: raw binary in msgpack, base64 text in JSON.
mod payload_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&STANDARD.encode(payload))
        } else {
            serializer.serialize_bytes(payload)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let human_readable = deserializer.is_human_readable();
        deserializer.deserialize_any(PayloadVisitor { human_readable })
    }

    struct PayloadVisitor {
        human_readable: bool,
    }

    impl<'de> Visitor<'de> for PayloadVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("payload bytes or a base64 string")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            if self.human_readable {
                STANDARD.decode(v).map_err(E::custom)
            } else {
                Ok(v.as_bytes().to_vec())
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(b) = seq.next_element::<u8>()? {
                bytes.push(b);
            }
            Ok(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_message() -> Message {
        Message {
            message_type: MessageType::SimpleEvent,
            source: "dns:talaria".to_string(),
            destination: "event:device-status/mac:112233445566/online".to_string(),
            transaction_uuid: "c2bb1f16-09c8-11e9-8a7e-abcd".to_string(),
            content_type: "json".to_string(),
            payload: br#"{"id":"mac:112233445566","ts":"2019-02-13T21:19:02.614191735Z"}"#.to_vec(),
            partner_ids: vec!["comcast".to_string(), "sky".to_string()],
            session_id: "1ABC".to_string(),
            ..Message::default()
        }
    }

    #[test]
    fn message_type_codes() {
        assert_eq!(MessageType::SimpleEvent.as_i64(), 4);
        assert_eq!(MessageType::from_i64(11), MessageType::Unknown);
        assert_eq!(MessageType::from_i64(42), MessageType::Unknown);
        assert_eq!(MessageType::from_i64(-1), MessageType::Unknown);
    }

    #[test]
    fn msgpack_encoding_preserves_routing_fields() {
        let original = online_message();
        let bytes = encode_message(&original).expect("encode should succeed");
        let decoded = decode_message(&bytes).expect("decode should succeed");

        assert_eq!(decoded, original);
        assert_eq!(decoded.state_name(), "online");
    }

    #[test]
    fn msgpack_payload_is_binary() {
        let message = online_message();
        let bytes = encode_message(&message).unwrap();
        // bin 8 marker followed by the payload length
        let marker = [0xc4, message.payload.len() as u8];
        assert!(bytes.windows(2).any(|w| w == marker));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_message(&[0xc1, 0x00, 0x13]).expect_err("garbage should not decode");
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn json_payload_is_base64() {
        let mut message = online_message();
        message.payload = b"hi".to_vec();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["payload"], "aGk=");
        assert_eq!(json["msg_type"], 4);
        assert_eq!(json["dest"], "event:device-status/mac:112233445566/online");
        assert!(json.get("url").is_none(), "empty fields are omitted");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload, b"hi");
    }

    #[test]
    fn state_name_uses_last_path_segment() {
        let mut message = Message::default();
        message.destination = "event:device-status/mac:112233445566/offline".to_string();
        assert_eq!(message.state_name(), "offline");

        message.destination = "event:device-status/mac:112233445566/online/".to_string();
        assert_eq!(message.state_name(), "online");

        message.destination = "offline".to_string();
        assert_eq!(message.state_name(), "offline");

        message.destination = String::new();
        assert_eq!(message.state_name(), "");
    }
}
