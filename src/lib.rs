//! # printlink
//!
//! Shares one 3D printer firmware link between any number of WebSocket
//! clients. The firmware speaks a line-oriented, `ok`-acknowledged text
//! protocol over a single byte stream (a pseudo terminal such as
//! `/tmp/printer`, or a USB serial port).
//!
//! ## Architecture
//!
//! printlink is organized as a workspace with multiple crates:
//!
//! 1. **printlink-core** - Errors, line/reply data model, session listener, event bus
//! 2. **printlink-communication** - Framing, reply gating, command queue, device
//!    sessions, the WebSocket gateway and its client side
//! 3. **printlink-settings** - Configuration files and validation
//! 4. **printlink** - The binary: CLI, logging, wiring

pub mod cli;
pub mod observer;

pub use printlink_communication::{
    connect_session, parse_reply, DeviceLink, DiagnosticSink, Gateway, GatewayConfig, Report,
    SessionConfig, StdoutSink, TracingSink,
};
pub use printlink_core::{ConnectionError, Error, EventFilter, GatewayEvent, Result};
pub use printlink_settings::{Config, LoggingSettings};

use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, so stdout carries only the raw device mirror
/// - RUST_LOG environment variable support, falling back to the configured level
/// - Pretty or JSON formatting
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    if settings.json {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Open the device and serve WebSocket clients until interrupted
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    let device = DeviceLink::open(&config.device).await?;

    let address = config.gateway.socket_addr()?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| ConnectionError::Bind {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    let sink: Arc<dyn DiagnosticSink> = if config.gateway.mirror_to_stdout {
        Arc::new(StdoutSink)
    } else {
        Arc::new(TracingSink)
    };
    let gateway = Gateway::new(GatewayConfig::from(&config.gateway), sink);
    gateway
        .events()
        .subscribe(EventFilter::All, |event| tracing::debug!("{}", event.description()));

    let shutdown = gateway.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            shutdown.cancel();
        }
    });

    tracing::info!(
        "Serving ws://{}{} for {}",
        address,
        config.gateway.path,
        config.device.path.display()
    );
    gateway.serve(listener, device).await?;
    Ok(())
}

/// Connect to a gateway and drive a session, sending lines read from stdin
pub async fn run_observer(url: &str, config: Config) -> anyhow::Result<()> {
    let listener = Arc::new(observer::ReportLogger);
    let (handle, session) =
        connect_session(url, SessionConfig::from(&config.session), listener).await?;

    let input = handle.clone();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if let Err(e) = input.send(command).await {
                tracing::warn!("Dropped {:?}: {}", command, e);
                break;
            }
        }
    });

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    let summary = session.await??;
    tracing::info!(
        "Session ended ({}): {} commands sent, {} replies, {} left in backlog",
        summary.end,
        summary.commands_sent,
        summary.replies,
        summary.backlog.len()
    );
    Ok(())
}
