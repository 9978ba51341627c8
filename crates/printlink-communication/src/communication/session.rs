//! Device session
//!
//! Binds the protocol building blocks to one connection: a [`LineFramer`], a
//! [`ReplyAggregator`] and a [`CommandQueue`] driven by a single task.
//!
//! The task is the only place session state changes. Inbound chunks, caller
//! commands, poll ticks and stall checks all arrive through one `select!`
//! loop and are handled to completion one at a time, so the queue needs no
//! locking.
//!
//! On start the session treats the connection as open: the queue leaves its
//! busy state, the handshake command is enqueued, and the status poll timer
//! starts. When the connection closes or fails the session ends in the
//! terminal [`SessionState::Disconnected`] state; it never reconnects.

use crate::protocol::{CommandQueue, Dispatch, LineFramer, ReplyAggregator, HELD_CR_SETTLE};
use parking_lot::RwLock;
use printlink_core::{Line, Reply, Result, SessionError, SessionListener, SessionState};
use printlink_settings::SessionSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Command enqueued once when the session starts
    pub handshake_command: Option<String>,
    /// Command enqueued on every poll tick unless already in the backlog
    pub poll_command: Option<String>,
    /// Poll period; the first tick fires one period after start. Periods
    /// shorter than a millisecond, zero included, run at one millisecond.
    pub poll_interval: Duration,
    /// Report a command that waits longer than this for its reply
    pub reply_timeout: Option<Duration>,
    /// Read buffer size for inbound chunks
    pub read_buffer_size: usize,
    /// Capacity of the caller command channel
    pub command_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            handshake_command: non_empty(&settings.handshake_command),
            poll_command: non_empty(&settings.poll_command),
            poll_interval: settings.poll_interval(),
            reply_timeout: settings.reply_timeout(),
            read_buffer_size: 4096,
            command_capacity: 256,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// [`SessionHandle::shutdown`] was called
    Shutdown,
    /// The connection reached end-of-file
    Closed,
    /// Reading or writing the connection failed
    Failed(String),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::Shutdown => write!(f, "shutdown"),
            SessionEnd::Closed => write!(f, "connection closed"),
            SessionEnd::Failed(reason) => write!(f, "connection failed: {}", reason),
        }
    }
}

/// Final state of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Why the session ended
    pub end: SessionEnd,
    /// Commands written to the connection
    pub commands_sent: u64,
    /// Replies observed
    pub replies: u64,
    /// Command still waiting for a reply when the session ended
    pub in_flight: Option<String>,
    /// Commands never sent
    pub backlog: Vec<String>,
    /// Lines received after the last reply
    pub pending_lines: usize,
}

/// Cloneable handle for talking to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<String>,
    cancel: CancellationToken,
    state: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
    /// Enqueue a command; the queue decides when it is written
    pub async fn send(&self, command: impl Into<String>) -> std::result::Result<(), SessionError> {
        let command = command.into();
        if command.contains(['\r', '\n']) {
            return Err(SessionError::InvalidCommand { command });
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Ask the session to stop; returns immediately
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// True once the session has ended
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// A session over one connection, ready to run
pub struct DeviceSession<R, W> {
    reader: R,
    writer: W,
    config: SessionConfig,
    listener: Arc<dyn SessionListener>,
    commands: mpsc::Receiver<String>,
    cancel: CancellationToken,
    state: Arc<RwLock<SessionState>>,
}

impl<R, W> DeviceSession<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a session and the handle used to feed it commands
    pub fn new(
        reader: R,
        writer: W,
        config: SessionConfig,
        listener: Arc<dyn SessionListener>,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let cancel = CancellationToken::new();
        let state = Arc::new(RwLock::new(SessionState::Connecting));

        let handle = SessionHandle {
            commands: tx,
            cancel: cancel.clone(),
            state: state.clone(),
        };
        let session = Self {
            reader,
            writer,
            config,
            listener,
            commands: rx,
            cancel,
            state,
        };
        (session, handle)
    }

    /// Drive the session until the connection ends or shutdown is requested
    pub async fn run(self) -> Result<SessionSummary> {
        let DeviceSession {
            mut reader,
            writer,
            config,
            listener,
            mut commands,
            cancel,
            state,
        } = self;

        let mut buf = vec![0u8; config.read_buffer_size.max(1)];
        let poll_command = config.poll_command.clone();
        let poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let mut poll = time::interval_at(Instant::now() + poll_interval, poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut core = SessionCore::new(writer, config.reply_timeout, listener);

        *state.write() = SessionState::Connected;
        let end = match core.start(config.handshake_command.as_deref()).await {
            Err(end) => end,
            Ok(()) => loop {
                let stall_deadline = core.stall_deadline();
                let settle_deadline = core.settle_deadline;

                let step = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => Err(SessionEnd::Shutdown),

                    Some(command) = commands.recv() => core.on_command(command).await,

                    read = reader.read(&mut buf) => match read {
                        Ok(0) => Err(SessionEnd::Closed),
                        Ok(n) => core.on_chunk(&buf[..n]).await,
                        Err(e) => Err(SessionEnd::Failed(e.to_string())),
                    },

                    _ = time::sleep_until(settle_deadline.unwrap_or_else(Instant::now)), if settle_deadline.is_some() => {
                        core.on_quiet().await
                    }

                    _ = poll.tick() => match poll_command.as_deref() {
                        Some(command) => core.on_poll(command).await,
                        None => Ok(()),
                    },

                    _ = time::sleep_until(stall_deadline.unwrap_or_else(Instant::now)), if stall_deadline.is_some() => {
                        core.on_stall_deadline().await;
                        Ok(())
                    }
                };

                if let Err(end) = step {
                    break end;
                }
            },
        };

        *state.write() = SessionState::Disconnected;
        commands.close();
        Ok(core.finish(end).await)
    }
}

/// Protocol state owned by the session task
struct SessionCore<W> {
    writer: W,
    framer: LineFramer,
    aggregator: ReplyAggregator,
    queue: CommandQueue,
    listener: Arc<dyn SessionListener>,
    reply_timeout: Option<Duration>,
    sent_at: Option<Instant>,
    stall_reported: bool,
    /// When a held trailing `\r` is given up on
    settle_deadline: Option<Instant>,
}

type Step = std::result::Result<(), SessionEnd>;

impl<W> SessionCore<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn new(writer: W, reply_timeout: Option<Duration>, listener: Arc<dyn SessionListener>) -> Self {
        Self {
            writer,
            framer: LineFramer::new(),
            aggregator: ReplyAggregator::new(),
            queue: CommandQueue::new(),
            listener,
            reply_timeout,
            sent_at: None,
            stall_reported: false,
            settle_deadline: None,
        }
    }

    async fn start(&mut self, handshake: Option<&str>) -> Step {
        tracing::info!("Session connected");
        self.listener.on_connected().await;

        let dispatch = self.queue.on_connected();
        self.apply(dispatch).await?;

        if let Some(handshake) = handshake {
            let dispatch = self.queue.enqueue(handshake);
            self.apply(dispatch).await?;
        }
        Ok(())
    }

    async fn on_chunk(&mut self, chunk: &[u8]) -> Step {
        let lines: Vec<_> = self.framer.feed(chunk).collect();
        self.settle_deadline = self
            .framer
            .holds_cr()
            .then(|| Instant::now() + HELD_CR_SETTLE);
        for line in lines {
            self.on_line(line).await?;
        }
        Ok(())
    }

    /// The device went quiet right after a `\r`
    async fn on_quiet(&mut self) -> Step {
        self.settle_deadline = None;
        match self.framer.release_held_cr() {
            Some(line) => self.on_line(line).await,
            None => Ok(()),
        }
    }

    async fn on_line(&mut self, line: Line) -> Step {
        match self.aggregator.observe(line) {
            Some(reply) => self.on_reply(reply).await,
            None => Ok(()),
        }
    }

    async fn on_reply(&mut self, reply: Reply) -> Step {
        self.sent_at = None;
        self.listener.on_reply(&reply).await;
        let dispatch = self.queue.on_reply(&reply);
        self.apply(dispatch).await
    }

    async fn on_command(&mut self, command: String) -> Step {
        let dispatch = self.queue.enqueue(command);
        self.apply(dispatch).await
    }

    async fn on_poll(&mut self, command: &str) -> Step {
        let dispatch = self.queue.enqueue_if_absent(command);
        self.apply(dispatch).await
    }

    fn stall_deadline(&self) -> Option<Instant> {
        if self.stall_reported {
            return None;
        }
        match (self.sent_at, self.reply_timeout) {
            (Some(sent_at), Some(timeout)) => Some(sent_at + timeout),
            _ => None,
        }
    }

    async fn on_stall_deadline(&mut self) {
        self.stall_reported = true;
        let waited = self.sent_at.map(|t| t.elapsed()).unwrap_or_default();
        let command = self.queue.in_flight().unwrap_or_default().to_string();
        tracing::warn!(
            "No reply to {:?} after {:?}; queue stalled with {} commands waiting",
            command,
            waited,
            self.queue.len()
        );
        self.listener.on_stalled(&command, waited).await;
    }

    /// Carry out what the transition function decided
    async fn apply(&mut self, dispatch: Dispatch) -> Step {
        match dispatch {
            Dispatch::Send(command) => {
                let mut wire = Vec::with_capacity(command.len() + 1);
                wire.extend_from_slice(command.as_bytes());
                wire.push(b'\n');

                let written = async {
                    self.writer.write_all(&wire).await?;
                    self.writer.flush().await
                };
                if let Err(e) = written.await {
                    tracing::error!("Failed to send {:?}: {}", command, e);
                    return Err(SessionEnd::Failed(e.to_string()));
                }

                self.sent_at = Some(Instant::now());
                self.stall_reported = false;
                self.listener.on_command_sent(&command).await;
                Ok(())
            }
            Dispatch::Idle => {
                self.listener.on_idle().await;
                Ok(())
            }
            Dispatch::Busy => Ok(()),
        }
    }

    async fn finish(mut self, end: SessionEnd) -> SessionSummary {
        match &end {
            SessionEnd::Failed(reason) => tracing::warn!("Session ended: {}", reason),
            other => tracing::info!("Session ended: {}", other),
        }

        let in_flight = self.queue.in_flight().map(str::to_string);
        self.queue.on_disconnected();
        let _ = self.writer.shutdown().await;
        self.listener.on_disconnected(&end.to_string()).await;

        SessionSummary {
            commands_sent: self.queue.sent_count(),
            replies: self.queue.reply_count(),
            in_flight,
            backlog: self.queue.backlog().map(str::to_string).collect(),
            pending_lines: self.aggregator.pending_lines(),
            end,
        }
    }
}
