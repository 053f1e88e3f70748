//! Plain-text rendering of the conversation for the terminal front-end.

use std::fmt::Write as _;

use chrono::Local;

use super::message::{Message, SenderType};
use super::widget::ChatWidget;

pub const TITLE: &str = "Customer Support";
pub const DELETED_PLACEHOLDER: &str = "This message has been deleted";
pub const LOADING_TEXT: &str = "Loading your conversation...";
pub const WELCOME_TITLE: &str = "Welcome to Customer Support";
pub const WELCOME_TEXT: &str = "Send a message to start chatting with our support team.";

/// Render a single message row.
#[must_use]
pub fn render_message(message: &Message) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let author = match message.sender_type {
        SenderType::User if message.username.is_empty() => "You",
        _ => message.username.as_str(),
    };
    let marker = match message.sender_type {
        SenderType::User => ">",
        SenderType::Bot => "<",
        SenderType::Admin => "#",
    };

    let mut out = format!("{marker} [{time}] {author}: ");
    if message.is_deleted {
        out.push_str(DELETED_PLACEHOLDER);
        return out;
    }
    out.push_str(&message.text);

    if let Some(file) = &message.file {
        let reference = file.data.as_deref().unwrap_or("(unavailable)");
        let kind = if file.is_image() { "image" } else { "file" };
        let _ = write!(out, "\n    [{kind}: {}] {reference}", file.name);
    }
    out
}

/// Render the whole widget: header, conversation body and composer line.
#[must_use]
pub fn render_conversation(widget: &ChatWidget) -> String {
    let mut out = String::new();
    let status = if widget.transport_available() {
        "live"
    } else {
        "offline"
    };
    let _ = writeln!(
        out,
        "== {TITLE} ==  [{}] ({status})",
        widget.session().display_name()
    );

    if widget.is_loading() {
        let _ = writeln!(out, "{LOADING_TEXT}");
    } else if widget.messages().is_empty() {
        let _ = writeln!(out, "{WELCOME_TITLE}");
        let _ = writeln!(out, "{WELCOME_TEXT}");
    } else {
        for message in widget.messages() {
            let _ = writeln!(out, "{}", render_message(message));
        }
    }

    if let Some(file) = widget.attachment() {
        let _ = writeln!(out, "-- attached: {} ({})", file.name(), file.mime_type());
    }
    if widget.is_sending() {
        let _ = writeln!(out, "-- sending...");
    }
    out
}
