//! Diagnostic mirroring of raw traffic
//!
//! The gateway copies every device chunk, and every client chunk, to an
//! injected [`DiagnosticSink`]. Production uses [`StdoutSink`]; tests use
//! [`MemorySink`] and inspect what was mirrored.

use parking_lot::Mutex;
use printlink_core::ClientId;
use std::io::Write;

/// Receiver of mirrored raw traffic
pub trait DiagnosticSink: Send + Sync {
    /// A chunk read from the device, verbatim
    fn device_output(&self, chunk: &[u8]);

    /// A chunk received from a client, verbatim
    fn client_input(&self, _client: ClientId, _chunk: &[u8]) {}
}

/// Writes device output to standard output unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn device_output(&self, chunk: &[u8]) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(chunk).and_then(|_| stdout.flush()) {
            tracing::debug!("stdout mirror failed: {}", e);
        }
    }

    fn client_input(&self, _client: ClientId, chunk: &[u8]) {
        self.device_output(chunk);
    }
}

/// Emits traffic as trace-level events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn device_output(&self, chunk: &[u8]) {
        tracing::trace!(target: "printlink::traffic", "device: {:?}", String::from_utf8_lossy(chunk));
    }

    fn client_input(&self, client: ClientId, chunk: &[u8]) {
        tracing::trace!(target: "printlink::traffic", "{}: {:?}", client, String::from_utf8_lossy(chunk));
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn device_output(&self, _chunk: &[u8]) {}
}

/// Records traffic in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    device: Mutex<Vec<u8>>,
    clients: Mutex<Vec<(ClientId, Vec<u8>)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All device output so far, concatenated
    pub fn device_bytes(&self) -> Vec<u8> {
        self.device.lock().clone()
    }

    /// All client chunks so far, in arrival order
    pub fn client_chunks(&self) -> Vec<(ClientId, Vec<u8>)> {
        self.clients.lock().clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn device_output(&self, chunk: &[u8]) {
        self.device.lock().extend_from_slice(chunk);
    }

    fn client_input(&self, client: ClientId, chunk: &[u8]) {
        self.clients.lock().push((client, chunk.to_vec()));
    }
}
