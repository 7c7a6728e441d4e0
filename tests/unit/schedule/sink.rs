use std::os::unix::net::UnixStream;

use super::*;
use crate::protocol::framing::read_frame;

#[test]
fn ingest_sink_writes_length_prefixed_frames() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let mut sink = IngestSink::new(a);
    sink.push_frame(b"one").unwrap();
    sink.push_frame(b"").unwrap();
    sink.push_frame(b"three").unwrap();
    sink.end().unwrap();

    assert_eq!(read_frame(&mut b).unwrap().unwrap(), b"one");
    assert_eq!(read_frame(&mut b).unwrap().unwrap(), b"");
    assert_eq!(read_frame(&mut b).unwrap().unwrap(), b"three");
    assert!(read_frame(&mut b).unwrap().is_none());
}

#[test]
fn connecting_to_a_missing_socket_fails() {
    let connector = IngestConnector::new("target/unit-sink/no-such.sock");
    assert!(connector.connect().is_err());
}

#[test]
fn in_memory_connector_keeps_connections_apart() {
    let connector = InMemoryConnector::new();
    let mut first = connector.connect().unwrap();
    first.push_frame(b"a").unwrap();
    first.end().unwrap();
    let mut second = connector.connect().unwrap();
    second.push_frame(b"b").unwrap();
    second.push_frame(b"c").unwrap();

    assert_eq!(
        connector.connections(),
        vec![vec![b"a".to_vec()], vec![b"b".to_vec(), b"c".to_vec()]]
    );
    assert_eq!(connector.frame_count(), 3);
    assert_eq!(connector.ended_count(), 1);
}
