//! Reply aggregation
//!
//! Groups lines into replies. A reply closes on the first line that begins
//! with the `ok` sentinel; every line seen before it (temperature reports,
//! echo output, file listings) is kept inside the reply.
//!
//! There is no timeout here. If the sentinel never arrives the accumulator
//! keeps growing; stalls are detected one level up, by the session.

use printlink_core::{Line, Reply};

/// Accumulates lines until a sentinel line completes a reply
#[derive(Debug, Default, Clone)]
pub struct ReplyAggregator {
    lines: Vec<Line>,
}

impl ReplyAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line, returning the reply it completes
    pub fn observe(&mut self, line: Line) -> Option<Reply> {
        let sentinel = line.is_sentinel();
        self.lines.push(line);

        if sentinel {
            Some(Reply::from_lines(self.lines.drain(..)))
        } else {
            None
        }
    }

    /// Number of lines waiting for a sentinel
    pub fn pending_lines(&self) -> usize {
        self.lines.len()
    }

    /// Discard any partial reply
    pub fn reset(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observe_all(aggregator: &mut ReplyAggregator, lines: &[&str]) -> Vec<Reply> {
        lines
            .iter()
            .filter_map(|l| aggregator.observe(Line::from(*l)))
            .collect()
    }

    #[test]
    fn test_informational_lines_stay_in_reply() {
        let mut aggregator = ReplyAggregator::new();
        let replies = observe_all(&mut aggregator, &["T:200\n", "ok\n"]);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].as_bytes(), b"T:200\nok\n");
        assert_eq!(aggregator.pending_lines(), 0);
    }

    #[test]
    fn test_bare_ok_is_a_reply() {
        let mut aggregator = ReplyAggregator::new();
        let replies = observe_all(&mut aggregator, &["ok\n"]);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].as_bytes(), b"ok\n");
    }

    #[test]
    fn test_no_sentinel_no_reply() {
        let mut aggregator = ReplyAggregator::new();
        assert!(observe_all(&mut aggregator, &["X\n", "Y\n"]).is_empty());
        assert_eq!(aggregator.pending_lines(), 2);
    }

    #[test]
    fn test_one_reply_per_sentinel() {
        let mut aggregator = ReplyAggregator::new();
        let replies = observe_all(&mut aggregator, &["ok\n", "echo\n", "ok T:1\n", "ok\n"]);
        let texts: Vec<String> = replies.iter().map(|r| r.text()).collect();
        assert_eq!(texts, vec!["ok\n", "echo\nok T:1\n", "ok\n"]);
    }

    #[test]
    fn test_sentinel_must_lead_the_line() {
        let mut aggregator = ReplyAggregator::new();
        assert!(aggregator.observe(Line::from("T:210 ok\n")).is_none());
        let reply = aggregator.observe(Line::from("ok\n")).unwrap();
        assert_eq!(reply.as_bytes(), b"T:210 ok\nok\n");
    }

    #[test]
    fn test_reset_discards_partial_reply() {
        let mut aggregator = ReplyAggregator::new();
        aggregator.observe(Line::from("stale\n"));
        aggregator.reset();
        let reply = aggregator.observe(Line::from("ok\n")).unwrap();
        assert_eq!(reply.as_bytes(), b"ok\n");
    }
}
