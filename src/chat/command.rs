//! Terminal input commands.

use std::path::PathBuf;

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send this text (with any pending attachment).
    Send(String),
    /// Pick a file to attach.
    Attach(PathBuf),
    /// Drop the pending attachment.
    Detach,
    /// Chat as a different user.
    User(String),
    /// Set the display name.
    Name(String),
    Help,
    Quit,
    /// Unrecognized slash command.
    Unknown(String),
}

pub const HELP: &str = "\
/attach <path>  attach a file to the next message
/detach         remove the pending attachment
/user <id>      chat as another user id
/name <name>    set your display name
/quit           leave
anything else is sent as a message";

impl Command {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };
        let (name, arg) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(n, a)| (n, a.trim()));
        match (name, arg) {
            ("attach", path) if !path.is_empty() => Self::Attach(PathBuf::from(path)),
            ("detach", _) => Self::Detach,
            ("user", id) if !id.is_empty() => Self::User(id.to_string()),
            ("name", n) if !n.is_empty() => Self::Name(n.to_string()),
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}
