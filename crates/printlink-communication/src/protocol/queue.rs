//! Flow-controlled command queue
//!
//! Implements the ping-pong streaming discipline used by printer firmware:
//! exactly one command may be outstanding, and the next one leaves only once
//! the reply to the previous one has been seen.
//!
//! The queue is a plain state machine. Every mutating operation ends by
//! running the transition function, [`CommandQueue::evaluate`], and returns
//! its [`Dispatch`]. That function is the only place a command is released
//! for sending, which is what keeps the at-most-one-outstanding invariant.
//! The caller owns the connection and performs the actual write.

use printlink_core::Reply;
use std::collections::VecDeque;

/// Outcome of one run of the transition function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Write this command (terminator not included) to the device now
    Send(String),
    /// Nothing outstanding and nothing queued
    Idle,
    /// A command is in flight or the link is not up; nothing to do
    Busy,
}

impl Dispatch {
    /// The command to send, if any
    pub fn command(&self) -> Option<&str> {
        match self {
            Dispatch::Send(command) => Some(command),
            _ => None,
        }
    }
}

/// Command queue state: busy flag plus FIFO backlog
#[derive(Debug, Clone)]
pub struct CommandQueue {
    busy: bool,
    backlog: VecDeque<String>,
    in_flight: Option<String>,
    sent_count: u64,
    reply_count: u64,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    /// Create a queue in the busy state; nothing is sent before `on_connected`
    pub fn new() -> Self {
        Self {
            busy: true,
            backlog: VecDeque::new(),
            in_flight: None,
            sent_count: 0,
            reply_count: 0,
        }
    }

    /// Append a command to the tail of the backlog
    pub fn enqueue(&mut self, command: impl Into<String>) -> Dispatch {
        self.backlog.push_back(command.into());
        self.evaluate()
    }

    /// Append a command unless an equal one is already waiting in the backlog
    ///
    /// Only the backlog is checked; a command that is already in flight does
    /// not count. This keeps periodic polls from piling up behind a slow
    /// device while still letting one fresh poll follow the outstanding one.
    pub fn enqueue_if_absent(&mut self, command: &str) -> Dispatch {
        if !self.contains(command) {
            self.backlog.push_back(command.to_string());
        }
        self.evaluate()
    }

    /// The connection is open: leave the initial busy state
    pub fn on_connected(&mut self) -> Dispatch {
        self.busy = false;
        self.evaluate()
    }

    /// A reply arrived: the in-flight command (if any) is done
    pub fn on_reply(&mut self, reply: &Reply) -> Dispatch {
        tracing::debug!("< {}", reply.text().trim_end());
        self.busy = false;
        self.in_flight = None;
        self.reply_count += 1;
        self.evaluate()
    }

    /// The connection is gone: block further sends, keep the backlog
    pub fn on_disconnected(&mut self) {
        self.busy = true;
        self.in_flight = None;
    }

    /// Transition function
    ///
    /// When not busy, release the head of the backlog and become busy; with
    /// an empty backlog report idle.
    pub fn evaluate(&mut self) -> Dispatch {
        if self.busy {
            return Dispatch::Busy;
        }

        match self.backlog.pop_front() {
            Some(command) => {
                self.busy = true;
                self.in_flight = Some(command.clone());
                self.sent_count += 1;
                tracing::debug!("> {}", command);
                Dispatch::Send(command)
            }
            None => Dispatch::Idle,
        }
    }

    /// True while a command is outstanding or before the link is up
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The command sent and not yet answered
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Commands waiting to be sent, front first
    pub fn backlog(&self) -> impl Iterator<Item = &str> {
        self.backlog.iter().map(String::as_str)
    }

    /// Number of commands waiting to be sent
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    /// True when the backlog is empty
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// True when an equal command waits in the backlog
    pub fn contains(&self, command: &str) -> bool {
        self.backlog.iter().any(|c| c == command)
    }

    /// Total commands released for sending
    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    /// Total replies observed
    pub fn reply_count(&self) -> u64 {
        self.reply_count
    }

    /// Drop every queued command; the in-flight one is unaffected
    pub fn clear(&mut self) {
        self.backlog.clear();
    }
}
