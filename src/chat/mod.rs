//! Conversation state and reconciliation.
//!
//! # Structure
//!
//! - [`message`]: the message view model and record normalization
//! - [`log`]: ordered, deduplicated message list
//! - [`history`]: history loading with endpoint fallback
//! - [`widget`]: the widget tying history, events and sends together
//! - [`attachment`]: pending file selection
//! - [`render`] and [`command`]: terminal front-end helpers

pub mod attachment;
pub mod clock;
pub mod command;
pub mod history;
pub mod log;
pub mod message;
pub mod render;
pub mod widget;

pub use attachment::{AttachmentSelection, FilePicker, PendingFile};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::Command;
pub use log::{BOT_ECHO_WINDOW, Ingested, MessageLog, USER_ECHO_WINDOW, echo_window};
pub use message::{FileAttachment, Message, SenderType};
pub use widget::{ChatWidget, HistoryLoad, LoadedHistory, RestSubmit, RestSubmitted, SendOutcome, SendStep};
