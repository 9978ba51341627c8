//! Line framing over an arbitrary chunk stream
//!
//! The device (and every client) delivers bytes in chunks that have nothing
//! to do with line boundaries. [`LineFramer`] keeps the unterminated tail of
//! everything fed so far and hands out complete lines as they appear.
//!
//! A line ends at `\n`, at `\r\n`, or at a lone `\r`. When the buffered data
//! ends in `\r` the framer cannot yet tell a lone `\r` from the first half of
//! `\r\n`, so that `\r` stays pending until the next byte arrives. A `\r\n`
//! split across two chunks therefore yields a single `...\r\n` line and never
//! an extra empty line.
//!
//! The cost is that a peer ending its last line with a lone `\r` (`ok\r`)
//! gets nothing delivered until it sends again. Callers that read from a live
//! connection wait [`HELD_CR_SETTLE`] of silence and then call
//! [`LineFramer::release_held_cr`] to treat that `\r` as a terminator.

use printlink_core::Line;
use std::time::Duration;

/// Quiet time after which a held trailing `\r` counts as a lone terminator
pub const HELD_CR_SETTLE: Duration = Duration::from_millis(50);

/// Reassembles lines from a stream of chunks
#[derive(Debug, Default, Clone)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over the lines it completes
    ///
    /// Lines are produced lazily. Any complete lines the caller does not
    /// consume stay buffered and are yielded first by the next call.
    /// Feeding an empty chunk yields nothing and leaves the state unchanged.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        let done = chunk.is_empty();
        self.buffer.extend_from_slice(chunk);
        Lines {
            buffer: &mut self.buffer,
            start: 0,
            done,
        }
    }

    /// The unterminated remainder held for the next call
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// True when nothing is held
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// True when the remainder is one line waiting only on a trailing `\r`
    pub fn holds_cr(&self) -> bool {
        match self.buffer.split_last() {
            Some((&b'\r', head)) => !head.iter().any(|b| *b == b'\n' || *b == b'\r'),
            _ => false,
        }
    }

    /// Give up waiting for a `\n` after a held `\r` and yield that line
    ///
    /// A `\n` arriving afterwards then starts a blank line of its own.
    pub fn release_held_cr(&mut self) -> Option<Line> {
        if self.holds_cr() {
            self.take_pending()
        } else {
            None
        }
    }

    /// Drain the remainder as a (possibly unterminated) line
    pub fn take_pending(&mut self) -> Option<Line> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(Line::new(std::mem::take(&mut self.buffer)))
        }
    }
}

/// Iterator over the complete lines available after a [`LineFramer::feed`]
///
/// Consumed bytes are removed from the framer when the iterator is dropped.
#[derive(Debug)]
pub struct Lines<'a> {
    buffer: &'a mut Vec<u8>,
    start: usize,
    done: bool,
}

impl Lines<'_> {
    /// Offset one past the terminator of the next complete line, if any
    fn next_end(&self) -> Option<usize> {
        let rest = &self.buffer[self.start..];
        let offset = rest.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        let at = self.start + offset;

        if self.buffer[at] == b'\n' {
            return Some(at + 1);
        }

        // `\r`: need the following byte to decide between `\r` and `\r\n`
        match self.buffer.get(at + 1) {
            Some(b'\n') => Some(at + 2),
            Some(_) => Some(at + 1),
            None => None,
        }
    }
}

impl Iterator for Lines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.done {
            return None;
        }

        match self.next_end() {
            Some(end) => {
                let line = Line::new(&self.buffer[self.start..end]);
                self.start = end;
                Some(line)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        self.buffer.drain(..self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(framer: &mut LineFramer, chunk: &str) -> Vec<String> {
        framer.feed(chunk.as_bytes()).map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_splits_on_every_terminator_kind() {
        let mut framer = LineFramer::new();
        let lines = collect(&mut framer, "a\nb\r\nc\rd");
        assert_eq!(lines, vec!["a\n", "b\r\n", "c\r"]);
        assert_eq!(framer.pending(), b"d");
    }

    #[test]
    fn test_remainder_joins_next_chunk() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, "T:2").is_empty());
        assert_eq!(collect(&mut framer, "10\nok"), vec!["T:210\n"]);
        assert_eq!(collect(&mut framer, "\n"), vec!["ok\n"]);
        assert!(framer.is_empty());
    }

    #[test]
    fn test_crlf_split_across_chunks_is_one_line() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, "ok\r").is_empty());
        assert_eq!(framer.pending(), b"ok\r");
        assert_eq!(collect(&mut framer, "\nnext"), vec!["ok\r\n"]);
        assert_eq!(framer.pending(), b"next");
    }

    #[test]
    fn test_lone_cr_released_by_next_byte() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, "busy\r").is_empty());
        assert_eq!(collect(&mut framer, "x"), vec!["busy\r"]);
        assert_eq!(framer.pending(), b"x");
    }

    #[test]
    fn test_held_cr_released_after_quiet() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, "ok\r").is_empty());
        assert!(framer.holds_cr());
        assert_eq!(framer.release_held_cr().unwrap().as_bytes(), b"ok\r");
        assert!(framer.is_empty());
        assert!(framer.release_held_cr().is_none());

        // only a bare trailing `\r` is released
        assert!(collect(&mut framer, "G1 X").is_empty());
        assert!(!framer.holds_cr());
        assert!(framer.release_held_cr().is_none());
        assert_eq!(framer.pending(), b"G1 X");
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut framer = LineFramer::new();
        assert!(collect(&mut framer, "partial").is_empty());
        assert!(collect(&mut framer, "").is_empty());
        assert_eq!(framer.pending(), b"partial");
    }

    #[test]
    fn test_unconsumed_lines_stay_buffered() {
        let mut framer = LineFramer::new();
        {
            let mut lines = framer.feed(b"one\ntwo\nthree\n");
            assert_eq!(lines.next().unwrap().as_bytes(), b"one\n");
        }
        assert_eq!(framer.pending(), b"two\nthree\n");
        assert_eq!(collect(&mut framer, "x"), vec!["two\n", "three\n"]);
    }

    #[test]
    fn test_blank_lines_are_lines() {
        let mut framer = LineFramer::new();
        assert_eq!(collect(&mut framer, "\n\r\n\n"), vec!["\n", "\r\n", "\n"]);
    }

    #[test]
    fn test_take_pending() {
        let mut framer = LineFramer::new();
        assert!(framer.take_pending().is_none());
        assert!(collect(&mut framer, "G1 X").is_empty());
        assert_eq!(framer.take_pending().unwrap().as_bytes(), b"G1 X");
        assert!(framer.is_empty());
    }
}
