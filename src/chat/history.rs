//! Conversation history loading.

use chrono::{DateTime, Utc};

use super::message::Message;
use crate::api::ChatBackend;
use crate::api::types::MessageRecord;
use crate::error::Result;

/// Read a user's history, falling back from the path endpoint to the body
/// endpoint when the first attempt fails for any reason.
pub async fn fetch_records(backend: &dyn ChatBackend, user_id: &str) -> Result<Vec<MessageRecord>> {
    match backend.history_by_path(user_id).await {
        Ok(records) => Ok(records),
        Err(e) => {
            tracing::info!(
                name: "history.primary.failed",
                error = %e,
                "GET history failed, trying POST"
            );
            backend.history_by_body(user_id).await
        }
    }
}

/// Load and normalize a user's history.
///
/// Never fails: if both reads fail the error is logged and the result is
/// empty. Records keep the server's order.
pub async fn load(
    backend: &dyn ChatBackend,
    user_id: &str,
    session_username: &str,
    now: DateTime<Utc>,
) -> Vec<Message> {
    match fetch_records(backend, user_id).await {
        Ok(records) => {
            tracing::info!(name: "history.loaded", user_id, count = records.len(), "Fetched chat history");
            records
                .into_iter()
                .map(|record| Message::from_record(record, session_username, now))
                .collect()
        }
        Err(e) => {
            tracing::error!(name: "history.failed", user_id, error = %e, "Error fetching chat history");
            Vec::new()
        }
    }
}
