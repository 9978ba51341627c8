//! Data model shared by the protocol layer
//!
//! Lines and replies are kept as raw bytes so that nothing fed to the framer
//! is lost or re-encoded; text views are lossy and only used for display and
//! parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Token that opens the line terminating a reply.
pub const SENTINEL: &[u8] = b"ok";

/// A single line received from or sent to the device.
///
/// Holds the line content together with its terminator (`\r\n`, `\r` or
/// `\n`). A line produced by draining a framer's remainder may have no
/// terminator at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Line(Vec<u8>);

impl Line {
    /// Wrap raw bytes as a line
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw bytes including the terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the line, returning the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes including the terminator
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length line
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Line content without its terminator
    pub fn content(&self) -> &[u8] {
        let end = self.0.len() - self.terminator().len();
        &self.0[..end]
    }

    /// The terminator bytes, empty when the line is unterminated
    pub fn terminator(&self) -> &[u8] {
        if self.0.ends_with(b"\r\n") {
            &self.0[self.0.len() - 2..]
        } else if self.0.ends_with(b"\n") || self.0.ends_with(b"\r") {
            &self.0[self.0.len() - 1..]
        } else {
            &[]
        }
    }

    /// True when the line ends with a terminator
    pub fn is_terminated(&self) -> bool {
        !self.terminator().is_empty()
    }

    /// True when the line content begins with the reply sentinel
    pub fn is_sentinel(&self) -> bool {
        self.0.starts_with(SENTINEL)
    }

    /// Lossy UTF-8 view of the whole line
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for Line {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Line {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Line {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// One acknowledgement-gated response from the device.
///
/// A reply is every line received since the previous reply, up to and
/// including the first sentinel line, concatenated verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    bytes: Vec<u8>,
    line_count: usize,
}

impl Reply {
    /// Build a reply from its lines, in order
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = Line>,
    {
        let mut bytes = Vec::new();
        let mut line_count = 0;
        for line in lines {
            bytes.extend_from_slice(line.as_bytes());
            line_count += 1;
        }
        Self { bytes, line_count }
    }

    /// Raw concatenated bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of lines the reply was built from
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Lossy UTF-8 text of the reply
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Iterate over the lines of the reply as lossy text, terminators stripped
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.bytes
            .split_inclusive(|b| *b == b'\n' || *b == b'\r')
            .map(|raw| {
                let trimmed = raw
                    .strip_suffix(b"\n")
                    .or_else(|| raw.strip_suffix(b"\r"))
                    .unwrap_or(raw);
                String::from_utf8_lossy(trimmed).into_owned()
            })
            .filter(|line| !line.is_empty())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

/// Lifecycle of one device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, connection not yet established; nothing may be sent
    #[default]
    Connecting,
    /// Connection open, queue running
    Connected,
    /// Connection closed or failed; terminal for this connection instance
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Identifier of one client connection on the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Create a new unique client id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", &self.0.to_string()[..8])
    }
}
