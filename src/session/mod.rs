//! Session identity for a chat widget.
//!
//! A [`SessionContext`] carries the user identifier and display name the
//! widget chats as. It is seeded from a page URL query string (the way the
//! widget is embedded) or from explicit configuration, and is passed to the
//! widget rather than read from global state.
//!
//! # Example
//!
//! ```rust
//! use support_chat::session::SessionContext;
//!
//! let session = SessionContext::from_query("userId=42&username=ana");
//! assert_eq!(session.user_id(), Some("42"));
//! assert_eq!(session.display_name(), "ana");
//! ```

mod context;

pub use context::{GUEST_NAME, SessionContext};
