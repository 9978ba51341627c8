//! Test support
//!
//! A [`SessionListener`] that records everything it sees and lets a test
//! wait until a condition on the recording holds.

use async_trait::async_trait;
use parking_lot::Mutex;
use printlink_core::{Reply, SessionListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// One recorded session event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    /// `on_connected`
    Connected,
    /// `on_command_sent`
    Sent(String),
    /// `on_reply`, reply text
    Reply(String),
    /// `on_idle`
    Idle,
    /// `on_stalled`
    Stalled(String),
    /// `on_disconnected`
    Disconnected(String),
}

/// Listener that records events in order
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
    changed: Notify,
}

impl RecordingListener {
    /// Create a recorder behind an `Arc`, ready to hand to a session
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything recorded so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Commands sent, in order
    pub fn sent(&self) -> Vec<String> {
        self.collect(|e| match e {
            RecordedEvent::Sent(c) => Some(c.clone()),
            _ => None,
        })
    }

    /// Reply texts, in order
    pub fn replies(&self) -> Vec<String> {
        self.collect(|e| match e {
            RecordedEvent::Reply(r) => Some(r.clone()),
            _ => None,
        })
    }

    /// Commands reported as stalled
    pub fn stalls(&self) -> Vec<String> {
        self.collect(|e| match e {
            RecordedEvent::Stalled(c) => Some(c.clone()),
            _ => None,
        })
    }

    /// Disconnect reasons
    pub fn disconnects(&self) -> Vec<String> {
        self.collect(|e| match e {
            RecordedEvent::Disconnected(r) => Some(r.clone()),
            _ => None,
        })
    }

    /// Number of idle notifications
    pub fn idle_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| **e == RecordedEvent::Idle)
            .count()
    }

    /// Wait until `condition` holds for the recording
    pub async fn wait_for<F>(&self, condition: F)
    where
        F: Fn(&[RecordedEvent]) -> bool,
    {
        loop {
            let changed = self.changed.notified();
            if condition(self.events.lock().as_slice()) {
                return;
            }
            changed.await;
        }
    }

    /// [`RecordingListener::wait_for`] bounded by a timeout; true if it held
    pub async fn wait_for_within<F>(&self, timeout: Duration, condition: F) -> bool
    where
        F: Fn(&[RecordedEvent]) -> bool,
    {
        tokio::time::timeout(timeout, self.wait_for(condition))
            .await
            .is_ok()
    }

    fn collect<T>(&self, pick: impl Fn(&RecordedEvent) -> Option<T>) -> Vec<T> {
        self.events.lock().iter().filter_map(pick).collect()
    }

    fn record(&self, event: RecordedEvent) {
        self.events.lock().push(event);
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl SessionListener for RecordingListener {
    async fn on_connected(&self) {
        self.record(RecordedEvent::Connected);
    }

    async fn on_command_sent(&self, command: &str) {
        self.record(RecordedEvent::Sent(command.to_string()));
    }

    async fn on_reply(&self, reply: &Reply) {
        self.record(RecordedEvent::Reply(reply.text()));
    }

    async fn on_idle(&self) {
        self.record(RecordedEvent::Idle);
    }

    async fn on_stalled(&self, command: &str, _waited: Duration) {
        self.record(RecordedEvent::Stalled(command.to_string()));
    }

    async fn on_disconnected(&self, reason: &str) {
        self.record(RecordedEvent::Disconnected(reason.to_string()));
    }
}
