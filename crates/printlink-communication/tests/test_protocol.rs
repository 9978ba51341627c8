use printlink_communication::{CommandQueue, Dispatch, LineFramer, ReplyAggregator};
use printlink_core::{Line, Reply};
use proptest::prelude::*;
use proptest::sample::Index;

fn ok_reply() -> Reply {
    Reply::from_lines(vec![Line::from("ok\n")])
}

fn frame_in_chunks(data: &[u8], cuts: &[usize]) -> (Vec<Line>, Vec<u8>) {
    let mut framer = LineFramer::new();
    let mut lines = Vec::new();
    let mut start = 0;
    for &cut in cuts.iter().chain(std::iter::once(&data.len())) {
        lines.extend(framer.feed(&data[start..cut]));
        start = cut;
    }
    (lines, framer.pending().to_vec())
}

fn sorted_cuts(data: &[u8], picks: &[Index]) -> Vec<usize> {
    let mut cuts: Vec<usize> = picks.iter().map(|i| i.index(data.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

fn record_send(dispatch: &Dispatch, outstanding: &mut usize) -> Result<(), TestCaseError> {
    if let Dispatch::Send(_) = dispatch {
        prop_assert_eq!(*outstanding, 0, "sent while a command was outstanding");
        *outstanding += 1;
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(u8),
    Poll,
    Reply,
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        (0u8..8).prop_map(QueueOp::Enqueue),
        Just(QueueOp::Poll),
        Just(QueueOp::Reply),
    ]
}

proptest! {
    #[test]
    fn framer_reproduces_every_byte(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        picks in proptest::collection::vec(any::<Index>(), 0..16),
    ) {
        let cuts = sorted_cuts(&data, &picks);
        let (lines, pending) = frame_in_chunks(&data, &cuts);

        let mut rebuilt: Vec<u8> = lines.iter().flat_map(|l| l.as_bytes().to_vec()).collect();
        rebuilt.extend_from_slice(&pending);
        prop_assert_eq!(&rebuilt, &data);

        for line in &lines {
            prop_assert!(line.is_terminated());
            prop_assert!(!line.content().iter().any(|b| *b == b'\r' || *b == b'\n'));
        }
    }

    #[test]
    fn framer_output_independent_of_chunking(
        data in proptest::collection::vec(prop_oneof![Just(b'\r'), Just(b'\n'), Just(b'o'), Just(b'k')], 0..256),
        picks in proptest::collection::vec(any::<Index>(), 0..16),
    ) {
        let cuts = sorted_cuts(&data, &picks);
        let whole = frame_in_chunks(&data, &[]);
        let split = frame_in_chunks(&data, &cuts);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn queue_has_at_most_one_outstanding_command(
        ops in proptest::collection::vec(queue_op(), 0..128),
    ) {
        let mut queue = CommandQueue::new();
        let mut outstanding = 0usize;

        record_send(&queue.on_connected(), &mut outstanding)?;
        for op in ops {
            let dispatch = match op {
                QueueOp::Enqueue(n) => queue.enqueue(format!("G1 X{}", n)),
                QueueOp::Poll => queue.enqueue_if_absent("M105"),
                QueueOp::Reply => {
                    outstanding = 0;
                    queue.on_reply(&ok_reply())
                }
            };
            record_send(&dispatch, &mut outstanding)?;
            prop_assert_eq!(queue.in_flight().is_some(), outstanding == 1);
            prop_assert!(queue.backlog().filter(|c| *c == "M105").count() <= 1);
        }
    }
}

#[test]
fn test_crlf_split_across_chunks_is_one_line() {
    let (lines, pending) = frame_in_chunks(b"ok\r\nT:20\r\n", &[3]);
    let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(text, vec!["ok\r\n", "T:20\r\n"]);
    assert!(pending.is_empty());
}

#[test]
fn test_replies_group_informational_lines() {
    let mut framer = LineFramer::new();
    let mut aggregator = ReplyAggregator::new();
    let mut replies = Vec::new();

    for chunk in ["echo:busy\nT:2", "10 /210\nok\nok T:", "20\n"] {
        let lines: Vec<Line> = framer.feed(chunk.as_bytes()).collect();
        replies.extend(lines.into_iter().filter_map(|l| aggregator.observe(l)));
    }

    let text: Vec<String> = replies.iter().map(|r| r.text()).collect();
    assert_eq!(text, vec!["echo:busy\nT:210 /210\nok\n", "ok T:20\n"]);
    assert_eq!(aggregator.pending_lines(), 0);
}

#[test]
fn test_commands_sent_in_fifo_order() {
    let mut queue = CommandQueue::new();
    for command in ["A", "B", "C"] {
        assert_eq!(queue.enqueue(command), Dispatch::Busy);
    }

    let mut sent = Vec::new();
    let mut dispatch = queue.on_connected();
    while let Dispatch::Send(command) = dispatch {
        sent.push(command);
        dispatch = queue.on_reply(&ok_reply());
    }

    assert_eq!(sent, vec!["A", "B", "C"]);
    assert_eq!(dispatch, Dispatch::Idle);
}

#[test]
fn test_poll_deduplicated_while_device_silent() {
    let mut queue = CommandQueue::new();
    assert_eq!(queue.on_connected(), Dispatch::Idle);
    assert_eq!(queue.enqueue("M20"), Dispatch::Send("M20".to_string()));

    for _ in 0..5 {
        assert_eq!(queue.enqueue_if_absent("M105"), Dispatch::Busy);
    }
    assert_eq!(queue.backlog().collect::<Vec<_>>(), vec!["M105"]);

    assert_eq!(queue.on_reply(&ok_reply()), Dispatch::Send("M105".to_string()));
    assert!(queue.is_empty());
    // in flight does not count as present
    assert_eq!(queue.enqueue_if_absent("M105"), Dispatch::Busy);
    assert_eq!(queue.len(), 1);
}
