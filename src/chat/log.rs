//! Ordered, deduplicated message list.
//!
//! Entries are kept in append order and are never re-sorted by timestamp.
//! Messages arrive from three sources (history, real-time events, REST send
//! responses); each source has its own admission rule:
//!
//! - history replaces the whole list,
//! - real-time messages are admitted when their id is new,
//! - provisional REST messages are admitted when no entry with the same
//!   sender and text lies within a time window of them.
//!
//! A real-time message that matches a still-unconfirmed provisional entry
//! the same way confirms it instead of being appended: the entry keeps its
//! position and takes the server id.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use super::message::{Message, SenderType};

/// Window within which an existing user message suppresses a provisional one.
pub const USER_ECHO_WINDOW: Duration = Duration::milliseconds(1000);

/// Window within which an existing bot message suppresses a provisional one.
pub const BOT_ECHO_WINDOW: Duration = Duration::milliseconds(3000);

/// Echo window for messages from `sender`. Admin messages are never
/// provisional, so they have none.
#[must_use]
pub fn echo_window(sender: SenderType) -> Option<Duration> {
    match sender {
        SenderType::User => Some(USER_ECHO_WINDOW),
        SenderType::Bot => Some(BOT_ECHO_WINDOW),
        SenderType::Admin => None,
    }
}

/// What [`MessageLog::ingest`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Appended as a new entry.
    Appended,
    /// An entry with this id already exists.
    Duplicate,
    /// Matched a provisional entry, which took over the server id.
    Confirmed,
}

/// The conversation as displayed.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    /// Ids of provisional entries no server message has confirmed yet.
    provisional: HashSet<String>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry, keeping the given order.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.provisional.clear();
    }

    /// Admit a server-pushed message.
    pub fn ingest(&mut self, message: Message) -> Ingested {
        if self.position(&message.id).is_some() {
            return Ingested::Duplicate;
        }
        if let Some(index) = self.unconfirmed_match(&message) {
            let entry = &mut self.messages[index];
            self.provisional.remove(&entry.id);
            entry.id = message.id;
            if message.file.is_some() {
                entry.file = message.file;
            }
            return Ingested::Confirmed;
        }
        self.messages.push(message);
        Ingested::Appended
    }

    /// Append a provisional message unless an equivalent entry exists.
    ///
    /// Equivalent means same sender type, same text, and a timestamp strictly
    /// closer than `window`. Returns `true` if the message was appended.
    pub fn append_provisional(&mut self, message: Message, window: Duration) -> bool {
        if self.contains_equivalent(&message, window) {
            return false;
        }
        self.provisional.insert(message.id.clone());
        self.messages.push(message);
        true
    }

    /// Whether the entry with `id` is provisional and not yet confirmed.
    #[must_use]
    pub fn is_provisional(&self, id: &str) -> bool {
        self.provisional.contains(id)
    }

    /// Whether an entry matches `candidate` by sender, text and time window.
    #[must_use]
    pub fn contains_equivalent(&self, candidate: &Message, window: Duration) -> bool {
        self.messages.iter().any(|m| {
            m.sender_type == candidate.sender_type
                && m.text == candidate.text
                && (m.timestamp - candidate.timestamp).abs() < window
        })
    }

    /// Overlay edited text on the entry with `id`.
    ///
    /// `text` of `None` keeps the current text. Unknown ids are ignored.
    pub fn apply_update(
        &mut self,
        id: &str,
        text: Option<String>,
        updated_at: Option<DateTime<Utc>>,
    ) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        if let Some(text) = text {
            entry.text = text;
        }
        entry.updated_at = updated_at;
        true
    }

    /// Mark the entry with `id` as deleted without removing it.
    pub fn apply_delete(&mut self, id: &str, deleted_at: Option<DateTime<Utc>>) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        entry.is_deleted = true;
        entry.deleted_at = deleted_at;
        true
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn unconfirmed_match(&self, message: &Message) -> Option<usize> {
        let window = echo_window(message.sender_type)?;
        self.messages.iter().position(|m| {
            self.provisional.contains(&m.id)
                && m.sender_type == message.sender_type
                && m.text == message.text
                && (m.timestamp - message.timestamp).abs() < window
        })
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}
