//! Event type definitions for the event bus.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::data::ClientId;

/// Gateway lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayEvent {
    /// The client listener is bound and accepting
    Listening {
        /// Local address of the listener.
        address: SocketAddr,
    },
    /// A client completed the WebSocket upgrade and joined the broadcast set
    ClientConnected {
        /// The new client.
        client: ClientId,
        /// Remote peer address.
        peer: SocketAddr,
    },
    /// A client left the broadcast set
    ClientDisconnected {
        /// The departed client.
        client: ClientId,
        /// Bytes of an unterminated line that were discarded.
        discarded_bytes: usize,
    },
    /// A client fell behind the broadcast and missed chunks
    ClientLagged {
        /// The lagging client.
        client: ClientId,
        /// Number of chunks skipped.
        skipped: u64,
    },
    /// A whole line from a client was written to the device
    LineForwarded {
        /// The client the line came from.
        client: ClientId,
        /// Line length in bytes, terminator included.
        bytes: usize,
    },
    /// The device stream closed; the gateway is shutting down
    DeviceClosed {
        /// Why the device stream ended.
        reason: String,
    },
}

impl GatewayEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            GatewayEvent::Listening { .. }
            | GatewayEvent::ClientConnected { .. }
            | GatewayEvent::ClientDisconnected { .. }
            | GatewayEvent::ClientLagged { .. } => EventCategory::Client,
            GatewayEvent::LineForwarded { .. } | GatewayEvent::DeviceClosed { .. } => {
                EventCategory::Device
            }
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            GatewayEvent::Listening { address } => format!("Listening on {}", address),
            GatewayEvent::ClientConnected { client, peer } => {
                format!("{} connected from {}", client, peer)
            }
            GatewayEvent::ClientDisconnected {
                client,
                discarded_bytes,
            } => format!(
                "{} disconnected ({} pending bytes discarded)",
                client, discarded_bytes
            ),
            GatewayEvent::ClientLagged { client, skipped } => {
                format!("{} lagged, {} chunks skipped", client, skipped)
            }
            GatewayEvent::LineForwarded { client, bytes } => {
                format!("{} wrote {} bytes to device", client, bytes)
            }
            GatewayEvent::DeviceClosed { reason } => format!("Device closed: {}", reason),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Client membership events.
    Client,
    /// Device stream events.
    Device,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Client => write!(f, "client"),
            EventCategory::Device => write!(f, "device"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let client = ClientId::new();
        assert_eq!(
            GatewayEvent::ClientLagged { client, skipped: 3 }.category(),
            EventCategory::Client
        );
        assert_eq!(
            GatewayEvent::DeviceClosed {
                reason: "eof".into()
            }
            .category(),
            EventCategory::Device
        );
    }

    #[test]
    fn test_events_serialize_as_json() {
        let event = GatewayEvent::ClientDisconnected {
            client: ClientId::new(),
            discarded_bytes: 4,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"discarded_bytes\":4"));
        let back: GatewayEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
