//! Socket.IO v4 framing over a WebSocket.
//!
//! Each WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by its body. Engine.IO `message` packets carry a Socket.IO
//! packet, itself laid out as
//! `<type>[<attachments>-][<namespace>,][<ack id>][<json>]`.
//!
//! Only the default namespace and text events are used by the chat channel.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Engine.IO protocol revision requested in the handshake query.
pub const ENGINE_IO_VERSION: &str = "4";

/// Connect to the default namespace.
pub const CONNECT_FRAME: &str = "40";

/// Leave the default namespace.
pub const DISCONNECT_FRAME: &str = "41";

/// Reply to a server ping.
pub const PONG_FRAME: &str = "3";

/// Body of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    /// Carries a Socket.IO packet.
    Message(String),
    Upgrade,
    Noop,
}

/// Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Value),
    Disconnect,
    Event { name: String, payload: Value },
    Ack,
    ConnectError(Value),
    /// Binary packets; the chat channel never sends them.
    Unsupported(char),
}

fn split_type(frame: &str) -> Result<(char, &str)> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty packet".to_string()))?;
    Ok((kind, chars.as_str()))
}

/// Decode one WebSocket text frame.
pub fn decode_engine(frame: &str) -> Result<EnginePacket> {
    let (kind, body) = split_type(frame)?;
    Ok(match kind {
        '0' => EnginePacket::Open(serde_json::from_str(body)?),
        '1' => EnginePacket::Close,
        '2' => EnginePacket::Ping,
        '3' => EnginePacket::Pong,
        '4' => EnginePacket::Message(body.to_string()),
        '5' => EnginePacket::Upgrade,
        '6' => EnginePacket::Noop,
        other => {
            return Err(Error::Protocol(format!(
                "unknown Engine.IO packet type {other:?}"
            )));
        }
    })
}

/// Decode the Socket.IO packet inside an Engine.IO message.
pub fn decode_socket(body: &str) -> Result<SocketPacket> {
    let (kind, mut rest) = split_type(body)?;

    if matches!(kind, '5' | '6') {
        return Ok(SocketPacket::Unsupported(kind));
    }

    // Namespace, present only when not the default one.
    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, tail)| tail);
    }

    // Ack id.
    rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    let data: Value = if rest.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(rest)?
    };

    Ok(match kind {
        '0' => SocketPacket::Connect(data),
        '1' => SocketPacket::Disconnect,
        '2' => decode_event(data)?,
        '3' => SocketPacket::Ack,
        '4' => SocketPacket::ConnectError(data),
        other => {
            return Err(Error::Protocol(format!(
                "unknown Socket.IO packet type {other:?}"
            )));
        }
    })
}

fn decode_event(data: Value) -> Result<SocketPacket> {
    let Value::Array(mut items) = data else {
        return Err(Error::Protocol("event payload is not an array".to_string()));
    };
    if items.is_empty() {
        return Err(Error::Protocol("event without a name".to_string()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(Error::Protocol("event name is not a string".to_string()));
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.swap_remove(0)
    };
    Ok(SocketPacket::Event { name, payload })
}

/// Encode an event on the default namespace as a WebSocket text frame.
#[must_use]
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", json!([name, payload]))
}
