//! Connectivity check for the backend and the real-time channel.

use std::fmt;
use std::time::Duration;

use crate::config::AppConfig;
use crate::realtime::{RealtimeTransport, ReconnectPolicy, ServerEvent, SocketIoTransport};

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable(String),
    Unreachable(String),
}

impl ProbeStatus {
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable(_))
    }
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub api_url: String,
    pub socket_url: String,
    pub backend: ProbeStatus,
    pub realtime: ProbeStatus,
}

impl ProbeReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.backend.is_reachable() && self.realtime.is_reachable()
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable(detail) => write!(f, "ok ({detail})"),
            Self::Unreachable(detail) => write!(f, "FAILED ({detail})"),
        }
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "backend  {}: {}", self.api_url, self.backend)?;
        write!(f, "realtime {}: {}", self.socket_url, self.realtime)
    }
}

/// Probe both endpoints named by `config`.
pub async fn run(config: &AppConfig) -> ProbeReport {
    let api_url = config.backend.api_url().to_string();
    let socket_url = config.backend.socket_url().to_string();
    let timeout = config.realtime.probe_timeout();

    let backend = probe_backend(&api_url, timeout).await;
    let realtime = probe_realtime(&socket_url, timeout).await;

    tracing::info!(
        name: "probe.finished",
        backend = backend.is_reachable(),
        realtime = realtime.is_reachable(),
        "Connectivity probe finished"
    );

    ProbeReport {
        api_url,
        socket_url,
        backend,
        realtime,
    }
}

/// Any HTTP response counts as reachable; only transport errors fail.
pub async fn probe_backend(api_url: &str, timeout: Duration) -> ProbeStatus {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => return ProbeStatus::Unreachable(e.to_string()),
    };
    match client.get(api_url).send().await {
        Ok(response) => ProbeStatus::Reachable(format!("HTTP {}", response.status())),
        Err(e) => ProbeStatus::Unreachable(e.to_string()),
    }
}

/// Reachable once the Socket.IO namespace connect succeeds within `timeout`.
pub async fn probe_realtime(socket_url: &str, timeout: Duration) -> ProbeStatus {
    let transport = match SocketIoTransport::connect(socket_url, ReconnectPolicy::default()) {
        Ok(transport) => transport,
        Err(e) => return ProbeStatus::Unreachable(e.to_string()),
    };
    let mut subscription = transport.subscribe();

    let outcome = tokio::time::timeout(timeout, async {
        loop {
            if transport.is_connected() {
                return ProbeStatus::Reachable("namespace joined".to_string());
            }
            match subscription.next().await {
                Some(ServerEvent::Connected) => {
                    return ProbeStatus::Reachable("namespace joined".to_string());
                }
                Some(ServerEvent::ConnectError(reason)) => {
                    return ProbeStatus::Unreachable(format!("connection rejected: {reason}"));
                }
                Some(_) => {}
                None => return ProbeStatus::Unreachable("transport stopped".to_string()),
            }
        }
    })
    .await
    .unwrap_or_else(|_| ProbeStatus::Unreachable(format!("no connection within {timeout:?}")));

    transport.shutdown();
    outcome
}
