//! Client-side message view model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::types::{FileRecord, MessageRecord};

/// Who authored a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    #[default]
    User,
    Bot,
    Admin,
}

impl SenderType {
    /// Map the backend's `senderType` field. Missing or unknown values are users.
    #[must_use]
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("bot") => Self::Bot,
            Some("admin") => Self::Admin,
            _ => Self::User,
        }
    }

    /// Display name for a message from this sender.
    #[must_use]
    pub fn display_name(self, session_username: &str) -> String {
        match self {
            Self::Bot => "Bot".to_string(),
            Self::Admin => "Admin".to_string(),
            Self::User => session_username.to_string(),
        }
    }
}

/// Attachment shown alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: Option<String>,
    /// Previewable/downloadable reference (URL or data URL).
    pub data: Option<String>,
}

impl FileAttachment {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }
}

impl From<FileRecord> for FileAttachment {
    fn from(record: FileRecord) -> Self {
        Self {
            name: record.originalname.unwrap_or_default(),
            mime_type: record.mimetype,
            data: record.data,
        }
    }
}

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_type: SenderType,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub file: Option<FileAttachment>,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Build a message authored locally.
    pub fn new(
        id: impl Into<String>,
        sender_type: SenderType,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender_type,
            timestamp,
            username: username.into(),
            file: None,
            is_deleted: false,
            deleted_at: None,
            updated_at: None,
        }
    }

    /// Attach a file to a message under construction.
    #[must_use]
    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.file = Some(file);
        self
    }

    /// Normalize a backend record.
    ///
    /// `fallback_time` is used when the record carries no readable timestamp.
    pub fn from_record(
        record: MessageRecord,
        session_username: &str,
        fallback_time: DateTime<Utc>,
    ) -> Self {
        let sender_type = SenderType::from_wire(record.sender_type.as_deref());
        Self {
            id: record.id,
            text: record.content.unwrap_or_default(),
            sender_type,
            timestamp: record.timestamp.unwrap_or(fallback_time),
            username: sender_type.display_name(session_username),
            file: record.file.map(FileAttachment::from),
            is_deleted: false,
            deleted_at: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.sender_type == SenderType::Bot
    }

    #[must_use]
    pub fn is_from_user(&self) -> bool {
        self.sender_type == SenderType::User
    }

    #[must_use]
    pub fn is_from_admin(&self) -> bool {
        self.sender_type == SenderType::Admin
    }
}
