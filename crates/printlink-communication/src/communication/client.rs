//! Gateway client
//!
//! The observer side of the gateway: connect over WebSocket, treat the socket
//! as a plain byte pipe and run a [`DeviceSession`] against it. Every client
//! session sees the same device output, so replies to other clients' commands
//! also release this client's queue.

use crate::communication::session::{DeviceSession, SessionConfig, SessionHandle, SessionSummary};
use futures_util::{SinkExt, StreamExt};
use printlink_core::{ConnectionError, Result, SessionListener};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const BRIDGE_CAPACITY: usize = 16 * 1024;

/// Expose a WebSocket as a duplex byte stream
///
/// Bytes written to the returned stream go out as binary messages; the
/// payload of every binary or text message received is readable from it.
/// The stream reaches end-of-file when the socket closes, and shutting down
/// its write side closes the socket.
pub fn bridge_websocket<S>(ws: WebSocketStream<S>) -> DuplexStream
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (local, remote) = tokio::io::duplex(BRIDGE_CAPACITY);
    tokio::spawn(pump(ws, remote));
    local
}

async fn pump<S>(ws: WebSocketStream<S>, remote: DuplexStream)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);
    let (mut outgoing, mut incoming) = ws.split();
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            read = remote_read.read(&mut buf) => match read {
                Ok(0) | Err(_) => {
                    let _ = outgoing.send(Message::Close(None)).await;
                    break;
                }
                Ok(n) => {
                    if let Err(e) = outgoing.send(Message::Binary(buf[..n].to_vec())).await {
                        tracing::debug!("WebSocket send failed: {}", e);
                        break;
                    }
                }
            },

            message = incoming.next() => {
                let data = match message {
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket read failed: {}", e);
                        break;
                    }
                };
                if remote_write.write_all(&data).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = remote_write.shutdown().await;
}

/// Connect to a gateway and run a session over the multiplexed stream
///
/// Returns the handle for sending commands and the task running the session.
pub async fn connect_session(
    url: &str,
    config: SessionConfig,
    listener: Arc<dyn SessionListener>,
) -> Result<(SessionHandle, JoinHandle<Result<SessionSummary>>)> {
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| ConnectionError::WebSocket {
            reason: format!("{}: {}", url, e),
        })?;
    tracing::info!("Connected to gateway at {}", url);

    let (reader, writer) = tokio::io::split(bridge_websocket(ws));
    let (session, handle) = DeviceSession::new(reader, writer, config, listener);
    Ok((handle, tokio::spawn(session.run())))
}
