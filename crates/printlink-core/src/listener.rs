//! Session listener interface
//!
//! Defines the listener trait for device session events

use crate::data::Reply;
use async_trait::async_trait;
use std::time::Duration;

/// Listener trait for device session events
///
/// Implement this trait to observe a session. Every callback is awaited
/// inline on the session task, in the order the events occur, so a slow
/// listener delays the session.
#[async_trait]
pub trait SessionListener: Send + Sync {
    /// Called once the connection is open and the queue may send
    async fn on_connected(&self) {}

    /// Called after a command has been written to the connection
    async fn on_command_sent(&self, _command: &str) {}

    /// Called for every complete reply
    async fn on_reply(&self, _reply: &Reply) {}

    /// Called when the queue is idle with an empty backlog
    async fn on_idle(&self) {}

    /// Called once per command that has waited longer than the reply timeout
    async fn on_stalled(&self, _command: &str, _waited: Duration) {}

    /// Called when the connection closes or fails
    async fn on_disconnected(&self, _reason: &str) {}
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

#[async_trait]
impl SessionListener for NoOpListener {}
