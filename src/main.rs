//! Terminal customer-support chat client
//!
//! Entry point: loads configuration, wires the backend and real-time
//! transport into a [`ChatWidget`], and drives it from stdin lines and
//! real-time events.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::unused_async)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use support_chat::api::{ChatBackend, HttpBackend, MockBackend};
use support_chat::chat::command::HELP;
use support_chat::chat::render::render_conversation;
use support_chat::chat::{ChatWidget, Command, HistoryLoad, SendOutcome, SendStep};
use support_chat::config::{AppConfig, Cli};
use support_chat::probe;
use support_chat::realtime::{MemoryTransport, RealtimeTransport, SocketIoTransport};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();

    // Logs go to stderr so they don't interleave with the conversation view
    // (M-LOG-STRUCTURED)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(fmt_layer.json()).init();
    } else {
        registry.with(fmt_layer).init();
    }
    let config = AppConfig::from_cli(&cli).context("failed to load configuration")?;

    info!(
        name: "config.loaded",
        api_url = %config.backend.api_url(),
        socket_url = %config.backend.socket_url(),
        mock_mode = config.backend.mock_mode,
        "Configuration loaded"
    );

    if cli.probe {
        let report = probe::run(&config).await;
        println!("{report}");
        if !report.is_healthy() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let session = config
        .session
        .to_context()
        .context("invalid session settings")?;

    let (backend, transport): (Arc<dyn ChatBackend>, Arc<dyn RealtimeTransport>) =
        if config.backend.mock_mode {
            // Nothing would echo real-time sends, so the transport stays down
            // and every send goes through the scripted REST backend.
            info!(name: "mock.enabled", "Running against the in-process mock backend");
            (Arc::new(MockBackend::new()), Arc::new(MemoryTransport::new()))
        } else {
            let backend =
                HttpBackend::with_timeout(config.backend.api_url(), config.backend.request_timeout())
                    .context("invalid backend URL")?;
            let transport = SocketIoTransport::connect(
                config.backend.socket_url(),
                config.realtime.reconnect_policy(),
            )
            .context("invalid real-time URL")?;
            (Arc::new(backend), Arc::new(transport))
        };

    let mut widget = ChatWidget::new(session, backend, transport);
    let mut subscription = widget.subscribe().await;
    let load = widget.begin_history_load();
    load_history(&mut widget, load).await;
    redraw(&widget, None);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                let notice = match Command::parse(&line) {
                    Command::Quit => break,
                    command => execute(&mut widget, command).await,
                };
                redraw(&widget, notice.as_deref());
            }
            event = subscription.next() => {
                let Some(event) = event else {
                    break;
                };
                widget.handle_event(event).await;
                redraw(&widget, None);
            }
        }
    }

    subscription.close();
    info!(name: "client.stopped", "Chat client stopped");
    Ok(())
}

/// Apply one command, returning a notice for the status line.
async fn execute(widget: &mut ChatWidget, command: Command) -> Option<String> {
    match command {
        Command::Send(text) => {
            widget.set_input(text);
            let outcome = match widget.begin_send().await {
                SendStep::Done(outcome) => outcome,
                SendStep::Submit(submit) => {
                    redraw(widget, None);
                    let submitted = submit.submit().await;
                    widget.finish_send(submitted)
                }
            };
            match outcome {
                SendOutcome::Failed => Some("Message could not be sent; try again.".to_string()),
                SendOutcome::Skipped | SendOutcome::Realtime | SendOutcome::Rest { .. } => None,
            }
        }
        Command::Attach(path) => match widget.attach(&path).await {
            Ok(true) => None,
            Ok(false) => Some(format!("{} is already attached", path.display())),
            Err(e) => Some(format!("cannot attach {}: {e}", path.display())),
        },
        Command::Detach => {
            widget.clear_attachment();
            None
        }
        Command::User(id) => {
            let load = widget.change_user(id).await;
            load_history(widget, load).await;
            None
        }
        Command::Name(name) => {
            widget.set_username(name);
            None
        }
        Command::Help => Some(HELP.to_string()),
        Command::Unknown(line) => Some(format!("unknown command: {line} (try /help)")),
        Command::Quit => None,
    }
}

/// Run a history fetch with the loading view on screen.
async fn load_history(widget: &mut ChatWidget, load: Option<HistoryLoad>) {
    let Some(load) = load else {
        return;
    };
    redraw(widget, None);
    let loaded = load.fetch().await;
    widget.finish_history_load(loaded);
}

fn redraw(widget: &ChatWidget, notice: Option<&str>) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{CLEAR_SCREEN}{}", render_conversation(widget));
    if let Some(notice) = notice {
        let _ = writeln!(out, "{notice}");
    }
    let _ = write!(out, "> ");
    let _ = out.flush();
}
