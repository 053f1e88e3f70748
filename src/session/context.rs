//! Per-widget session identity.

use url::Url;

use crate::error::Result;

/// Shown in the header when no username is known.
pub const GUEST_NAME: &str = "Guest";

/// Who the widget is chatting as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    user_id: Option<String>,
    username: Option<String>,
}

impl SessionContext {
    /// Create a context. Empty strings count as absent.
    #[must_use]
    pub fn new(user_id: Option<String>, username: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|s| !s.is_empty()),
            username: username.filter(|s| !s.is_empty()),
        }
    }

    /// Seed from the `userId` and `username` query parameters of a page URL.
    pub fn from_page_url(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url)?;
        Ok(Self::from_query_pairs(url.query_pairs()))
    }

    /// Seed from a raw query string such as `userId=42&username=ana`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_query_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    fn from_query_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    ) -> Self {
        let mut user_id = None;
        let mut username = None;
        for (key, value) in pairs {
            match key.as_ref() {
                "userId" => user_id = Some(value.into_owned()),
                "username" => username = Some(value.into_owned()),
                _ => {}
            }
        }
        Self::new(user_id, username)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The session username, empty if unknown.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// Name for the header: the username, or `Guest`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(GUEST_NAME)
    }

    /// Set the user identifier. Returns `true` if it changed to a non-empty value.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if user_id.is_empty() || self.user_id.as_deref() == Some(user_id.as_str()) {
            return false;
        }
        self.user_id = Some(user_id);
        true
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        let username = username.into();
        self.username = (!username.is_empty()).then_some(username);
    }

    /// Overlay explicitly provided values on top of this context.
    #[must_use]
    pub fn merged(mut self, user_id: Option<String>, username: Option<String>) -> Self {
        if let Some(id) = user_id {
            self.set_user_id(id);
        }
        if let Some(name) = username.filter(|n| !n.is_empty()) {
            self.set_username(name);
        }
        self
    }
}
