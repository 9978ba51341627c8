//! Protocol layer: pure, synchronous building blocks
//!
//! Bytes become lines ([`framer`]), lines become replies ([`reply`]), replies
//! drive the one-command-at-a-time queue ([`queue`]). [`report`] interprets
//! replies for observers. Nothing here performs I/O.

pub mod framer;
pub mod queue;
pub mod reply;
pub mod report;

pub use framer::{LineFramer, Lines, HELD_CR_SETTLE};
pub use queue::{CommandQueue, Dispatch};
pub use reply::ReplyAggregator;
pub use report::{parse_reply, FileEntry, Report, TemperatureReading};
