use std::io::Cursor;

use super::*;
use crate::foundation::error::LedError;
use crate::protocol::framing::write_frame;
use crate::schedule::sink::InMemoryConnector;

const POLL: Duration = Duration::from_millis(20);

struct RefusingConnector;

impl SinkConnector for RefusingConnector {
    fn connect(&self) -> LedResult<Box<dyn FrameSink>> {
        Err(LedError::protocol("renderer unavailable"))
    }
}

#[test]
fn reader_decodes_frames_then_disconnects() {
    let mut wire = Vec::new();
    write_frame(&mut wire, b"a").unwrap();
    write_frame(&mut wire, b"bb").unwrap();

    let rx = spawn_frame_reader(Cursor::new(wire), 2).unwrap();
    assert_eq!(rx.recv().unwrap().unwrap(), b"a");
    assert_eq!(rx.recv().unwrap().unwrap(), b"bb");
    assert!(rx.recv().is_err());
}

#[test]
fn reader_reports_truncation_as_error() {
    let rx = spawn_frame_reader(Cursor::new(vec![0u8, 0, 0, 9, 1, 2]), 2).unwrap();
    assert!(rx.recv().unwrap().is_err());
}

#[test]
fn end_of_stream_stops_relay_and_forwards_everything() {
    let (tx, rx) = crossbeam_channel::unbounded();
    for f in [b"x".to_vec(), b"y".to_vec()] {
        tx.send(Ok(f)).unwrap();
    }
    drop(tx);

    let connector = InMemoryConnector::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    let stats = relay_frames(&rx, &connector, deadline, &CancelToken::new(), POLL).unwrap();

    assert_eq!(stats.ended_by, RelayEnd::EndOfStream);
    assert_eq!(stats.frames, 2);
    assert_eq!(
        connector.connections(),
        vec![vec![b"x".to_vec(), b"y".to_vec()]]
    );
    assert_eq!(connector.ended_count(), 1);
}

#[test]
fn silent_producer_is_cut_at_deadline_without_opening_a_sink() {
    let (_tx, rx) = crossbeam_channel::unbounded::<LedResult<Vec<u8>>>();
    let connector = InMemoryConnector::new();

    let t0 = Instant::now();
    let deadline = t0 + Duration::from_millis(300);
    let stats = relay_frames(&rx, &connector, deadline, &CancelToken::new(), POLL).unwrap();

    let elapsed = t0.elapsed();
    assert_eq!(stats.ended_by, RelayEnd::Deadline);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(1500));
    assert!(connector.connections().is_empty());
}

#[test]
fn slow_producer_runs_until_deadline_and_is_never_overcounted() {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let producer = std::thread::spawn(move || {
        let mut sent = 0u64;
        for i in 0..100u8 {
            std::thread::sleep(Duration::from_millis(150));
            if tx.send(Ok(vec![i])).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    });

    let connector = InMemoryConnector::new();
    let t0 = Instant::now();
    let stats = relay_frames(
        &rx,
        &connector,
        t0 + Duration::from_millis(800),
        &CancelToken::new(),
        POLL,
    )
    .unwrap();
    assert!(t0.elapsed() >= Duration::from_millis(800));
    drop(rx);
    let sent = producer.join().unwrap();

    assert_eq!(stats.ended_by, RelayEnd::Deadline);
    assert!(stats.frames >= 3);
    assert!(stats.frames <= sent);
    let relayed: Vec<u8> = connector.connections()[0].iter().map(|f| f[0]).collect();
    assert_eq!(relayed, (0..stats.frames as u8).collect::<Vec<_>>());
}

#[test]
fn read_error_ends_relay() {
    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(Ok(b"ok".to_vec())).unwrap();
    tx.send(Err(LedError::protocol("torn frame"))).unwrap();

    let connector = InMemoryConnector::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    let stats = relay_frames(&rx, &connector, deadline, &CancelToken::new(), POLL).unwrap();
    assert!(matches!(stats.ended_by, RelayEnd::ReadError(_)));
    assert_eq!(stats.frames, 1);
}

#[test]
fn cancel_interrupts_relay() {
    let (_tx, rx) = crossbeam_channel::unbounded::<LedResult<Vec<u8>>>();
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        remote.cancel();
    });

    let t0 = Instant::now();
    let deadline = t0 + Duration::from_secs(30);
    let stats = relay_frames(&rx, &InMemoryConnector::new(), deadline, &cancel, POLL).unwrap();
    assert_eq!(stats.ended_by, RelayEnd::Cancelled);
    assert!(t0.elapsed() < Duration::from_secs(5));
}

#[test]
fn sink_failure_is_an_error() {
    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(Ok(b"frame".to_vec())).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    assert!(relay_frames(&rx, &RefusingConnector, deadline, &CancelToken::new(), POLL).is_err());
}
