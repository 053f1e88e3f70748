//! Wire types exchanged with the chat backend.
//!
//! These mirror the backend's JSON records. They are shared by the REST
//! client and the real-time transport, which pushes the same record shape.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::chat::PendingFile;

// =============================================================================
// Message records
// =============================================================================

/// A message as stored and pushed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageRecord {
    /// Server-assigned identifier.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Message body.
    #[serde(default)]
    pub content: Option<String>,
    /// `user`, `bot` or `admin`. Missing means `user`.
    #[serde(rename = "senderType", default)]
    pub sender_type: Option<String>,
    /// Creation time (RFC 3339 string or epoch milliseconds).
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Stored attachment, if any.
    #[serde(default)]
    pub file: Option<FileRecord>,
}

/// Attachment metadata as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    /// Name the file was uploaded with.
    #[serde(default)]
    pub originalname: Option<String>,
    /// MIME type reported at upload.
    #[serde(default)]
    pub mimetype: Option<String>,
    /// URL or inline payload for preview/download.
    #[serde(default)]
    pub data: Option<String>,
}

/// Payload of a `messageUpdated` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageUpdate {
    #[serde(rename = "_id")]
    pub id: String,
    /// Replacement text. Absent means the text is left unchanged.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "updatedAt", default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload of a `messageDeleted` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageDeletion {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "deletedAt", default, deserialize_with = "deserialize_timestamp")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Decode a history response body.
///
/// Anything other than a JSON array counts as an empty history, and
/// individual records that fail to decode are skipped.
pub fn decode_history(body: Value) -> Vec<MessageRecord> {
    let Value::Array(items) = body else {
        tracing::warn!(
            name: "history.malformed",
            "History response was not an array; treating as empty"
        );
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<MessageRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(name: "history.record.skipped", error = %e, "Skipping malformed history record");
                None
            }
        })
        .collect()
}

/// Parse a timestamp the way the backend emits them.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
}

// =============================================================================
// History API Types
// =============================================================================

/// Body of the `POST /api/chat/history` fallback read.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRequest<'a> {
    #[serde(rename = "userId")]
    pub user_id: &'a str,
}

// =============================================================================
// Send API Types
// =============================================================================

/// A user-authored message submitted over REST.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub user_id: String,
    pub text: String,
    pub file: Option<PendingFile>,
}

/// Response from `POST /api/chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SendReceipt {
    /// Bot-generated reply to the message.
    #[serde(rename = "botResponse", default)]
    pub bot_response: Option<String>,
    /// Reference to the stored attachment, when one was sent.
    #[serde(rename = "fileData", default)]
    pub file_data: Option<String>,
}
