//! Decoded events as returned by the events API.

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageType};

/// A decoded record: the routed message plus the time the record store
/// received it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub message: Message,

    /// When the record store received the message, in Unix nanoseconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub birth_date: i64,
}

impl Event {
    /// Creates an event from a decoded message.
    pub fn new(message: Message, birth_date: i64) -> Self {
        Self {
            message,
            birth_date,
        }
    }

    /// Creates a stand-in for a record that exists but could not be read.
    ///
    /// Only the birth date survives; the message type is `Unknown` and every
    /// other field is empty.
    pub fn placeholder(birth_date: i64) -> Self {
        Self {
            message: Message {
                message_type: MessageType::Unknown,
                ..Message::default()
            },
            birth_date,
        }
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
