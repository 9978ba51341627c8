//! WebSocket gateway
//!
//! Multiplexes one device link between any number of WebSocket clients.
//!
//! Device to clients: a single reader task mirrors every chunk verbatim into a
//! broadcast channel and into the [`DiagnosticSink`]. Each client subscribes
//! when it joins, so it sees only output produced after it connected. A
//! client that falls more than `broadcast_capacity` chunks behind is closed,
//! so the bytes any client received are always a prefix of the device output
//! from the moment it joined.
//!
//! Clients to device: every client runs its own [`LineFramer`] over the bytes
//! it sends. Only whole lines leave the client task, over one mpsc channel, to
//! the single device writer task. Lines from different clients therefore reach
//! the device one at a time and never interleave.

use crate::communication::device::{DeviceLink, DeviceReader, DeviceWriter};
use crate::communication::sink::DiagnosticSink;
use crate::protocol::{LineFramer, HELD_CR_SETTLE};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use printlink_core::{ClientId, ConnectionError, Error, EventBus, GatewayEvent, Line, Result};
use printlink_settings::GatewaySettings;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const DEVICE_READ_BUFFER: usize = 4096;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Request path accepted for the WebSocket upgrade
    pub path: String,
    /// Device chunks buffered per client before it is dropped as lagging
    pub broadcast_capacity: usize,
    /// Whole client lines buffered ahead of the device writer
    pub line_queue_capacity: usize,
    /// Largest accepted client message
    pub max_message_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&GatewaySettings::default())
    }
}

impl From<&GatewaySettings> for GatewayConfig {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            path: settings.path.clone(),
            broadcast_capacity: settings.broadcast_capacity.max(1),
            line_queue_capacity: 256,
            max_message_size: 1 << 20,
        }
    }
}

/// A whole line from one client, bound for the device
#[derive(Debug)]
struct ClientLine {
    client: ClientId,
    line: Line,
}

/// Everything a client task needs, cloned per connection
#[derive(Clone)]
struct ClientContext {
    path: String,
    ws_config: WebSocketConfig,
    sink: Arc<dyn DiagnosticSink>,
    events: Arc<EventBus>,
    clients: Arc<RwLock<HashMap<ClientId, SocketAddr>>>,
    chunks: broadcast::Sender<Bytes>,
    lines: mpsc::Sender<ClientLine>,
    stop: CancellationToken,
}

/// Multiplexing gateway between one device and many WebSocket clients
pub struct Gateway {
    config: GatewayConfig,
    sink: Arc<dyn DiagnosticSink>,
    events: Arc<EventBus>,
    clients: Arc<RwLock<HashMap<ClientId, SocketAddr>>>,
    cancel: CancellationToken,
}

impl Gateway {
    /// Create a gateway that mirrors raw traffic to `sink`
    pub fn new(config: GatewayConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            sink,
            events: Arc::new(EventBus::new()),
            clients: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Lifecycle events published by this gateway
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Connected clients and their peer addresses
    pub fn clients(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients.read().iter().map(|(id, peer)| (*id, *peer)).collect()
    }

    /// Token that stops [`Gateway::serve`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve clients on `listener` until the device closes or shutdown
    ///
    /// Returns `Ok(())` after a requested shutdown and an error when the
    /// device stream ends. Either way every client is told to close.
    pub async fn serve(&self, listener: TcpListener, device: DeviceLink) -> Result<()> {
        let device_name = device.name().to_string();
        let (reader, writer) = device.into_split();

        let (chunks, _) = broadcast::channel(self.config.broadcast_capacity.max(1));
        let (lines, line_rx) = mpsc::channel(self.config.line_queue_capacity.max(1));
        let stop = self.cancel.child_token();

        let mut device_reader =
            tokio::spawn(read_device(reader, chunks.clone(), self.sink.clone()));
        let mut device_writer =
            tokio::spawn(write_device(writer, line_rx, self.events.clone()));

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let context = ClientContext {
            path: self.config.path.clone(),
            ws_config,
            sink: self.sink.clone(),
            events: self.events.clone(),
            clients: self.clients.clone(),
            chunks,
            lines,
            stop: stop.clone(),
        };

        let address = listener.local_addr().map_err(|e| ConnectionError::Bind {
            address: "listener".to_string(),
            reason: e.to_string(),
        })?;
        tracing::info!("Gateway for {} listening on {}", device_name, address);
        let _ = self.events.publish(GatewayEvent::Listening { address });

        let outcome = loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => {
                    tracing::info!("Gateway shutting down");
                    break Ok(());
                }

                finished = &mut device_reader => {
                    break Err(self.device_closed("read", finished));
                }

                finished = &mut device_writer => {
                    break Err(self.device_closed("write", finished));
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_client(context.clone(), stream, peer));
                    }
                    Err(e) => tracing::warn!("Failed to accept connection: {}", e),
                },
            }
        };

        stop.cancel();
        device_reader.abort();
        outcome
    }

    fn device_closed(
        &self,
        direction: &str,
        finished: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
    ) -> Error {
        let (reason, error) = match finished {
            Ok(Ok(())) => (
                "end of stream".to_string(),
                Error::from(ConnectionError::DeviceClosed),
            ),
            Ok(Err(e)) => (e.to_string(), Error::from(e)),
            Err(e) => (
                e.to_string(),
                Error::other(format!("device {} task failed: {}", direction, e)),
            ),
        };
        tracing::error!("Device {} side closed: {}", direction, reason);
        let _ = self.events.publish(GatewayEvent::DeviceClosed { reason });
        error
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("clients", &self.client_count())
            .finish()
    }
}

/// Mirror device output to the sink and every subscribed client
async fn read_device(
    mut reader: DeviceReader,
    chunks: broadcast::Sender<Bytes>,
    sink: Arc<dyn DiagnosticSink>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; DEVICE_READ_BUFFER];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        sink.device_output(&buf[..n]);
        // no receivers just means no clients yet
        let _ = chunks.send(Bytes::copy_from_slice(&buf[..n]));
    }
}

/// The only task that writes to the device
async fn write_device(
    mut writer: DeviceWriter,
    mut lines: mpsc::Receiver<ClientLine>,
    events: Arc<EventBus>,
) -> std::io::Result<()> {
    while let Some(ClientLine { client, line }) = lines.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        tracing::debug!("{} > {:?}", client, String::from_utf8_lossy(line.content()));
        let _ = events.publish(GatewayEvent::LineForwarded {
            client,
            bytes: line.len(),
        });
    }
    let _ = writer.shutdown().await;
    Ok(())
}

#[allow(clippy::result_large_err)]
fn check_path(
    expected: &str,
    request: &Request,
    response: Response,
) -> std::result::Result<Response, ErrorResponse> {
    if request.uri().path() == expected {
        return Ok(response);
    }
    let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

async fn handle_client(context: ClientContext, stream: TcpStream, peer: SocketAddr) {
    let path = context.path.clone();
    let callback =
        move |request: &Request, response: Response| check_path(&path, request, response);

    let accepted =
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(context.ws_config))
            .await;
    let ws = match accepted {
        Ok(ws) => ws,
        Err(e) => {
            let error = ConnectionError::WebSocket {
                reason: e.to_string(),
            };
            tracing::debug!("Rejected connection from {}: {}", peer, error);
            return;
        }
    };

    let client = ClientId::new();
    let mut chunks = context.chunks.subscribe();
    context.clients.write().insert(client, peer);
    tracing::info!("{} connected from {}", client, peer);
    let _ = context.events.publish(GatewayEvent::ClientConnected { client, peer });

    let (mut outgoing, mut incoming) = ws.split();
    let mut framer = LineFramer::new();
    let mut settle_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = context.stop.cancelled() => {
                let _ = outgoing.send(Message::Close(None)).await;
                break;
            }

            chunk = chunks.recv() => match chunk {
                Ok(chunk) => {
                    if let Err(e) = outgoing.send(Message::Binary(chunk.to_vec())).await {
                        tracing::debug!("{} send failed: {}", client, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("{} lagged {} chunks behind the device; closing", client, skipped);
                    let _ = context.events.publish(GatewayEvent::ClientLagged { client, skipped });
                    // What a client has seen must stay a prefix of the device stream
                    let _ = outgoing.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            message = incoming.next() => {
                let data = match message {
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!("{} read failed: {}", client, e);
                        break;
                    }
                };
                if !forward(&context, client, &mut framer, &data).await {
                    break;
                }
                settle_deadline = framer.holds_cr().then(|| Instant::now() + HELD_CR_SETTLE);
            }

            _ = tokio::time::sleep_until(settle_deadline.unwrap_or_else(Instant::now)), if settle_deadline.is_some() => {
                settle_deadline = None;
                if let Some(line) = framer.release_held_cr() {
                    if context.lines.send(ClientLine { client, line }).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    context.clients.write().remove(&client);
    let discarded_bytes = framer.take_pending().map(|line| line.len()).unwrap_or(0);
    if discarded_bytes > 0 {
        tracing::debug!("{} left {} unterminated bytes; discarded", client, discarded_bytes);
    }
    tracing::info!("{} disconnected", client);
    let _ = context.events.publish(GatewayEvent::ClientDisconnected {
        client,
        discarded_bytes,
    });
}

/// Pass whole lines on to the device writer; false once it is gone
async fn forward(
    context: &ClientContext,
    client: ClientId,
    framer: &mut LineFramer,
    data: &[u8],
) -> bool {
    context.sink.client_input(client, data);
    let complete: Vec<Line> = framer.feed(data).collect();
    for line in complete {
        if context.lines.send(ClientLine { client, line }).await.is_err() {
            return false;
        }
    }
    true
}
