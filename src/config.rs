use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::realtime::ReconnectPolicy;
use crate::session::SessionContext;
use std::time::Duration;

/// Default backend for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Customer-support chat client", long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Backend base URL
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Real-time (Socket.IO) URL; defaults to the backend URL
    #[arg(long, env = "SOCKET_URL")]
    pub socket_url: Option<String>,

    /// Run against an in-process mock backend
    #[arg(long, env = "MOCK_MODE")]
    pub mock_mode: Option<bool>,

    /// User identifier to chat as
    #[arg(long, env = "SUPPORT_USER_ID")]
    pub user_id: Option<String>,

    /// Display name
    #[arg(long, env = "SUPPORT_USERNAME")]
    pub username: Option<String>,

    /// Page URL whose `userId`/`username` query parameters seed the session
    #[arg(long, env = "SUPPORT_PAGE_URL")]
    pub page_url: Option<String>,

    /// Test backend and socket connectivity, then exit
    #[arg(long)]
    pub probe: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub api_url: String,
    pub socket_url: Option<String>,
    pub mock_mode: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub page_url: Option<String>,
}

impl BackendConfig {
    /// Backend base URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Real-time URL, falling back to the backend URL.
    pub fn socket_url(&self) -> &str {
        self.socket_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| self.api_url(), |s| s.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RealtimeConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_delay: Duration::from_millis(self.max_reconnect_delay_ms.max(self.reconnect_delay_ms)),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl SessionConfig {
    /// Build the session: page URL query first, explicit values on top.
    pub fn to_context(&self) -> Result<SessionContext> {
        let base = match self.page_url.as_deref().filter(|u| !u.is_empty()) {
            Some(page_url) => SessionContext::from_page_url(page_url)?,
            None => SessionContext::default(),
        };
        Ok(base.merged(self.user_id.clone(), self.username.clone()))
    }
}

impl AppConfig {
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> std::result::Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("backend.api_url", DEFAULT_API_URL)?
            .set_default("backend.mock_mode", false)?
            .set_default("backend.request_timeout_secs", 30)?
            .set_default("realtime.reconnect_delay_ms", 1000)?
            .set_default("realtime.max_reconnect_delay_ms", 5000)?
            .set_default("realtime.probe_timeout_secs", 5)?;

        // 2. Config file: explicit path, else ./chat.{yaml,toml,json} if present
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("chat").required(false)),
        };

        // 3. Environment variables (prefixed with CHAT_), e.g. CHAT_BACKEND__API_URL
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags and their env vars win
        if let Some(url) = &cli.api_url {
            builder = builder.set_override("backend.api_url", url.as_str())?;
        }
        if let Some(url) = &cli.socket_url {
            builder = builder.set_override("backend.socket_url", url.as_str())?;
        }
        if let Some(mock) = cli.mock_mode {
            builder = builder.set_override("backend.mock_mode", mock)?;
        }
        if let Some(id) = &cli.user_id {
            builder = builder.set_override("session.user_id", id.as_str())?;
        }
        if let Some(name) = &cli.username {
            builder = builder.set_override("session.username", name.as_str())?;
        }
        if let Some(url) = &cli.page_url {
            builder = builder.set_override("session.page_url", url.as_str())?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
