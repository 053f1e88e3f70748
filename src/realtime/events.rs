//! Real-time channel events.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::api::types::{MessageDeletion, MessageRecord, MessageUpdate};
use crate::error::Result;

/// Event delivered by the real-time transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Transport connected (or reconnected).
    Connected,
    /// Server acknowledged a `join`.
    Joined(Value),
    /// Transport dropped.
    Disconnected { reason: String },
    /// Connection attempt rejected by the server.
    ConnectError(String),
    /// A new message.
    Message(MessageRecord),
    /// A message was edited.
    MessageUpdated(MessageUpdate),
    /// A message was soft-deleted.
    MessageDeleted(MessageDeletion),
}

impl ServerEvent {
    /// Map a named Socket.IO event to a [`ServerEvent`].
    ///
    /// Unknown event names yield `Ok(None)`; a known name with a payload of
    /// the wrong shape is an error.
    pub fn from_named(name: &str, payload: Value) -> Result<Option<Self>> {
        let event = match name {
            "joined" => Self::Joined(payload),
            "message" => Self::Message(serde_json::from_value(payload)?),
            "messageUpdated" => Self::MessageUpdated(serde_json::from_value(payload)?),
            "messageDeleted" => Self::MessageDeleted(serde_json::from_value(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Event sent to the server over the real-time transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Join the user's private channel.
    Join { user_id: String },
    /// Push a user-authored text message.
    SendMessage {
        user_id: String,
        text: String,
        timestamp: DateTime<Utc>,
        username: String,
    },
}

impl ClientEvent {
    /// Socket.IO event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::SendMessage { .. } => "sendMessage",
        }
    }

    /// JSON payload as the server expects it.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Join { user_id } => json!({ "userId": user_id }),
            Self::SendMessage {
                user_id,
                text,
                timestamp,
                username,
            } => json!({
                "userId": user_id,
                "text": text,
                "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                "username": username,
            }),
        }
    }
}
