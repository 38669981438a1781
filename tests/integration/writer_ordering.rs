//! The writer emits `Regular` frames in strictly ascending `id` order
//! no matter what order `write` is called in; `Control`/`Ack`-style
//! special frames (id 0) interleave freely and never wait behind a gap.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use eh_test_support::InMemorySocketPair;
use exthost_bridge::prelude::*;

#[tokio::test]
async fn regular_frames_arrive_in_ascending_id_order_despite_write_order() {
    let (a, b) = InMemorySocketPair::connected();
    let writer = ProtocolWriter::new(a);
    let reader = ProtocolReader::new(b);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    reader.on_message(move |msg| sink.lock().unwrap().push(msg.id));

    writer.write(ProtocolMessage::new(MessageKind::Regular, 3, 0, Bytes::from_static(b"three"))).unwrap();
    writer.write(ProtocolMessage::new(MessageKind::Regular, 1, 0, Bytes::from_static(b"one"))).unwrap();
    writer.write(ProtocolMessage::new(MessageKind::Regular, 2, 0, Bytes::from_static(b"two"))).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn special_frames_are_not_held_back_by_a_regular_gap() {
    let (a, b) = InMemorySocketPair::connected();
    let writer = ProtocolWriter::new(a);
    let reader = ProtocolReader::new(b);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    reader.on_message(move |msg| sink.lock().unwrap().push((msg.kind, msg.id)));

    // id 1 is missing, so a naive writer would stall everything behind it.
    writer.write(ProtocolMessage::new(MessageKind::Regular, 2, 0, Bytes::from_static(b"two"))).unwrap();
    writer.write(ProtocolMessage::special(MessageKind::Ack, 0)).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec![(MessageKind::Ack, 0)]);

    writer.write(ProtocolMessage::new(MessageKind::Regular, 1, 0, Bytes::from_static(b"one"))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec![(MessageKind::Ack, 0), (MessageKind::Regular, 1), (MessageKind::Regular, 2)]);
}
