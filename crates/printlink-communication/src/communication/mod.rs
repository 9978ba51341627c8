//! Connection handling: the device link, device sessions, the multiplexing
//! gateway and its WebSocket client side.

pub mod client;
pub mod device;
pub mod gateway;
pub mod session;
pub mod sink;

pub use client::{bridge_websocket, connect_session};
pub use device::{DeviceLink, DeviceReader, DeviceWriter};
pub use gateway::{Gateway, GatewayConfig};
pub use session::{DeviceSession, SessionConfig, SessionEnd, SessionHandle, SessionSummary};
pub use sink::{DiagnosticSink, MemorySink, NullSink, StdoutSink, TracingSink};
