//! # printlink Communication
//!
//! Talking to the printer and to the people watching it.
//! The [`protocol`] layer frames bytes into lines, gates lines into replies
//! and runs the one-command-at-a-time queue. The [`communication`] layer
//! binds that to real connections: the device link, device sessions, and the
//! WebSocket gateway that shares one device between many clients.

pub mod communication;
pub mod protocol;

// recording listener for tests, behind the `testing` feature
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use communication::{
    bridge_websocket, connect_session, DeviceLink, DeviceSession, DiagnosticSink, Gateway,
    GatewayConfig, MemorySink, NullSink, SessionConfig, SessionEnd, SessionHandle,
    SessionSummary, StdoutSink, TracingSink,
};

pub use protocol::{
    parse_reply, CommandQueue, Dispatch, FileEntry, LineFramer, ReplyAggregator, Report,
    TemperatureReading,
};
