//! L1 outgoing framing with per-id ordering.
//!
//! Given calls to `write(msg)` in any order, eventually emits to the
//! socket exactly the sequence of framed bytes such that, filtering for
//! `MessageKind::Regular`, the emitted `id`s form the ascending sequence
//! `1, 2, 3, …` with no gaps. Special messages (`id == 0`) interleave
//! freely and are emitted as soon as they are seen. [`ProtocolWriter::retransmit`]
//! is the one deliberate exception: it re-emits an id that already passed
//! through the ordering gate once, for replay and reconnection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::WireError;
use crate::message::{MessageKind, ProtocolMessage};
use crate::socket::DuplexSocket;

const STALL_CHECK_INTERVAL: Duration = Duration::from_secs(5);

struct Queues {
    /// Regular frames awaiting contiguous emission, keyed by id.
    message_queue: BTreeMap<u32, Bytes>,
    /// Special (id == 0) frames, emitted as soon as seen.
    special_queue: Vec<Bytes>,
    /// Frames re-sent via [`ProtocolWriter::retransmit`]: already counted
    /// past by `next_expected_id` once, pushed straight to the wire
    /// instead of waiting their turn again.
    retransmit_queue: Vec<Bytes>,
    next_expected_id: u32,
}

/// Enforces in-order delivery of `Regular` messages over a [`DuplexSocket`].
pub struct ProtocolWriter<S: DuplexSocket> {
    socket: Mutex<Arc<S>>,
    queues: Mutex<Queues>,
    is_paused: AtomicBool,
    is_disposed: AtomicBool,
    flush_scheduled: AtomicBool,
}

impl<S: DuplexSocket> ProtocolWriter<S> {
    #[must_use]
    pub fn new(socket: Arc<S>) -> Arc<Self> {
        let writer = Arc::new(Self {
            socket: Mutex::new(socket),
            queues: Mutex::new(Queues {
                message_queue: BTreeMap::new(),
                special_queue: Vec::new(),
                retransmit_queue: Vec::new(),
                next_expected_id: 1,
            }),
            is_paused: AtomicBool::new(false),
            is_disposed: AtomicBool::new(false),
            flush_scheduled: AtomicBool::new(false),
        });
        writer.clone().spawn_stall_detector();
        writer
    }

    /// Splice a freshly connected socket in. `next_expected_id` and any
    /// queued-but-unsent frames are untouched: the writer's ordering
    /// state is a property of the logical stream, not the transport
    /// connection carrying it: reconnection re-sends the unacknowledged
    /// backlog through this same writer rather than a fresh one.
    pub fn rebind_socket(&self, socket: Arc<S>) {
        *self.socket.lock().unwrap() = socket;
        self.is_disposed.store(false, Ordering::SeqCst);
    }

    /// Enqueue `msg` for eventual emission. Returns immediately; the
    /// actual socket write happens on a scheduled flush task so that at
    /// most one write is ever in flight.
    pub fn write(self: &Arc<Self>, msg: ProtocolMessage) -> Result<(), WireError> {
        if self.is_disposed.load(Ordering::SeqCst) {
            return Err(WireError::Disposed);
        }
        let frame = msg.encode();
        {
            let mut queues = self.queues.lock().unwrap();
            if msg.kind.is_special() {
                queues.special_queue.push(frame);
            } else {
                if msg.id == 0 {
                    warn!("regular message written with id=0; treating as special to avoid corrupting ordering");
                    queues.special_queue.push(frame);
                } else {
                    queues.message_queue.insert(msg.id, frame);
                }
            }
        }
        self.schedule_flush();
        Ok(())
    }

    /// Re-send `msg` on a replay request or reconnection splice, bypassing
    /// the contiguous-ordering gate that [`Self::write`] is subject to.
    ///
    /// A retransmitted id has, by definition, already been counted past
    /// by `next_expected_id` once (or, if it never actually reached the
    /// socket because a reconnection was in progress, still needs to be
    /// before later ids can flow) so waiting for its own turn in
    /// `message_queue` would park it there forever. It is pushed straight
    /// to the wire instead, and `next_expected_id` is advanced past it so
    /// any not-yet-sent regular message behind it in the backlog still
    /// reaches the socket once its own turn comes.
    pub fn retransmit(self: &Arc<Self>, msg: ProtocolMessage) -> Result<(), WireError> {
        if self.is_disposed.load(Ordering::SeqCst) {
            return Err(WireError::Disposed);
        }
        let id = msg.id;
        let frame = msg.encode();
        {
            let mut queues = self.queues.lock().unwrap();
            queues.message_queue.remove(&id);
            queues.retransmit_queue.push(frame);
            if id >= queues.next_expected_id {
                queues.next_expected_id = id + 1;
            }
        }
        self.schedule_flush();
        Ok(())
    }

    pub fn pause(&self) {
        self.is_paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(self: &Arc<Self>) {
        self.is_paused.store(false, Ordering::SeqCst);
        self.schedule_flush();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::SeqCst)
    }

    /// Synchronously perform one emit pass.
    pub async fn flush(&self) -> Result<(), WireError> {
        if self.is_paused.load(Ordering::SeqCst) || self.is_disposed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let blob = {
            let mut queues = self.queues.lock().unwrap();
            emit_pass(&mut queues)
        };
        if let Some(blob) = blob {
            let socket = self.socket.lock().unwrap().clone();
            if let Err(e) = socket.write(blob).await {
                self.is_disposed.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn drain(&self) -> Result<(), WireError> {
        self.flush().await?;
        let socket = self.socket.lock().unwrap().clone();
        socket.drain().await
    }

    /// Single-flight: `flush_scheduled` stays set for as long as a flush
    /// task is alive, including while it is suspended inside
    /// `socket.write().await`, so a `write()` arriving mid-flush can never
    /// spawn a second overlapping flush. The flag is only cleared once the
    /// task is about to exit, and even then only after checking whether
    /// more work arrived while it was running.
    fn schedule_flush(self: &Arc<Self>) {
        if self.flush_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = this.flush().await {
                    warn!(error = %e, "protocol writer flush failed; writer disposed");
                    this.flush_scheduled.store(false, Ordering::SeqCst);
                    break;
                }
                this.flush_scheduled.store(false, Ordering::SeqCst);
                if this.is_paused.load(Ordering::SeqCst) || this.is_disposed.load(Ordering::SeqCst) {
                    break;
                }
                if !this.has_queued_frames() {
                    break;
                }
                // Something landed while we were flushing (or survived
                // this pass, e.g. a gap still waiting to be filled): keep
                // going under the same single-flight slot rather than
                // risk a concurrent write() racing to spawn its own task.
                if this.flush_scheduled.swap(true, Ordering::SeqCst) {
                    break;
                }
            }
        });
    }

    fn has_queued_frames(&self) -> bool {
        let queues = self.queues.lock().unwrap();
        !queues.special_queue.is_empty()
            || !queues.retransmit_queue.is_empty()
            || queues.message_queue.contains_key(&queues.next_expected_id)
    }

    fn spawn_stall_detector(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STALL_CHECK_INTERVAL);
            loop {
                interval.tick().await;
                if self.is_disposed.load(Ordering::SeqCst) {
                    break;
                }
                let queues = self.queues.lock().unwrap();
                if queues.message_queue.is_empty() {
                    continue;
                }
                if !queues.message_queue.contains_key(&queues.next_expected_id) {
                    let ids: Vec<u32> = queues.message_queue.keys().copied().collect();
                    let first_gap_end = ids.first().copied().unwrap_or(queues.next_expected_id);
                    debug!(
                        expected = queues.next_expected_id,
                        queued = ?ids,
                        gap = format!("{}..{}", queues.next_expected_id, first_gap_end),
                        "writer stalled waiting for contiguous id"
                    );
                }
            }
        });
    }
}

/// Under the lock: concatenate the special blob, the pending retransmit
/// blob, and as many contiguous `message_queue` entries starting at
/// `next_expected_id` as are available, advancing `next_expected_id`
/// past them.
fn emit_pass(queues: &mut Queues) -> Option<Bytes> {
    let mut out = BytesMut::new();
    for frame in queues.special_queue.drain(..) {
        out.extend_from_slice(&frame);
    }
    for frame in queues.retransmit_queue.drain(..) {
        out.extend_from_slice(&frame);
    }

    while let Some(frame) = queues.message_queue.remove(&queues.next_expected_id) {
        out.extend_from_slice(&frame);
        queues.next_expected_id += 1;
    }

    if out.is_empty() { None } else { Some(out.freeze()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::decode_header;
    use std::sync::Arc as StdArc;
    use tokio::sync::{Mutex as AsyncMutex, broadcast};

    struct CollectingSocket {
        written: AsyncMutex<Vec<Bytes>>,
        events: broadcast::Sender<crate::socket::SocketEvent>,
    }

    impl CollectingSocket {
        fn new() -> StdArc<Self> {
            let (events, _) = broadcast::channel(8);
            StdArc::new(Self {
                written: AsyncMutex::new(Vec::new()),
                events,
            })
        }
    }

    impl DuplexSocket for CollectingSocket {
        fn subscribe(&self) -> broadcast::Receiver<crate::socket::SocketEvent> {
            self.events.subscribe()
        }

        async fn write(&self, bytes: Bytes) -> Result<(), WireError> {
            self.written.lock().await.push(bytes);
            Ok(())
        }

        async fn end(&self) -> Result<(), WireError> {
            Ok(())
        }

        fn start_receiving(&self) {}
    }

    fn regular(id: u32, payload: &'static [u8]) -> ProtocolMessage {
        ProtocolMessage::new(MessageKind::Regular, id, 0, Bytes::from_static(payload))
    }

    #[tokio::test]
    async fn out_of_order_writes_emit_in_ascending_id_order() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());

        writer.write(regular(3, b"c")).unwrap();
        writer.write(regular(1, b"a")).unwrap();
        writer.write(regular(2, b"b")).unwrap();
        writer.flush().await.unwrap();

        let written = socket.written.lock().await;
        assert_eq!(written.len(), 1, "a single coalesced write");
        let mut offset = 0;
        let mut ids = Vec::new();
        let blob = &written[0];
        while offset < blob.len() {
            let header = decode_header(blob.slice(offset..offset + crate::message::HEADER_LENGTH));
            ids.push(header.id);
            offset += crate::message::HEADER_LENGTH + header.size as usize;
        }
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn gap_holds_back_later_messages_until_filled() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());

        writer.write(regular(2, b"b")).unwrap();
        writer.flush().await.unwrap();
        {
            let written = socket.written.lock().await;
            assert!(written.is_empty(), "id=2 must wait for id=1");
        }

        writer.write(regular(1, b"a")).unwrap();
        writer.flush().await.unwrap();
        let written = socket.written.lock().await;
        assert_eq!(written.len(), 1);
        let header = decode_header(written[0].slice(0..crate::message::HEADER_LENGTH));
        assert_eq!(header.id, 1);
    }

    #[tokio::test]
    async fn special_messages_bypass_ordering_and_flush_immediately() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());

        writer.write(regular(5, b"blocked")).unwrap();
        writer
            .write(ProtocolMessage::special(MessageKind::Ack, 0))
            .unwrap();
        writer.flush().await.unwrap();

        let written = socket.written.lock().await;
        assert_eq!(written.len(), 1);
        let header = decode_header(written[0].slice(0..crate::message::HEADER_LENGTH));
        assert_eq!(header.kind, MessageKind::Ack);
    }

    #[tokio::test]
    async fn pause_suppresses_writes_resume_flushes_backlog() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());
        writer.pause();
        writer.write(regular(1, b"a")).unwrap();
        writer.flush().await.unwrap();
        assert!(socket.written.lock().await.is_empty());

        writer.resume();
        writer.flush().await.unwrap();
        assert_eq!(socket.written.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn zero_id_on_regular_path_is_rerouted_to_special_queue() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());
        writer
            .write(ProtocolMessage::new(MessageKind::Regular, 0, 0, Bytes::new()))
            .unwrap();
        writer.flush().await.unwrap();
        // Does not block id=1 from flushing later.
        writer.write(regular(1, b"a")).unwrap();
        writer.flush().await.unwrap();
        let written = socket.written.lock().await;
        assert!(!written.is_empty());
    }

    #[tokio::test]
    async fn retransmit_bypasses_the_ordering_gate_for_an_already_emitted_id() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());

        writer.write(regular(1, b"a")).unwrap();
        writer.flush().await.unwrap();
        assert_eq!(socket.written.lock().await.len(), 1, "id=1 emitted once normally");

        // A plain write() of the same id would sit in message_queue
        // forever, since next_expected_id has already moved past 1.
        writer.retransmit(regular(1, b"a")).unwrap();
        writer.flush().await.unwrap();

        let written = socket.written.lock().await;
        assert_eq!(written.len(), 2, "retransmit must reach the socket a second time");
        let header = decode_header(written[1].slice(0..crate::message::HEADER_LENGTH));
        assert_eq!(header.id, 1);
    }

    #[tokio::test]
    async fn retransmit_unblocks_later_ids_still_waiting_their_turn() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());

        // id=2 queued but can't emit yet: id=1 was never written at all
        // (e.g. queued during a reconnection splice and never flushed).
        writer.write(regular(2, b"b")).unwrap();
        writer.flush().await.unwrap();
        assert!(socket.written.lock().await.is_empty());

        writer.retransmit(regular(1, b"a")).unwrap();
        writer.flush().await.unwrap();

        let written = socket.written.lock().await;
        assert_eq!(written.len(), 1, "retransmitted id=1 and the now-contiguous id=2 coalesce");
        let mut offset = 0;
        let mut ids = Vec::new();
        let blob = &written[0];
        while offset < blob.len() {
            let header = decode_header(blob.slice(offset..offset + crate::message::HEADER_LENGTH));
            ids.push(header.id);
            offset += crate::message::HEADER_LENGTH + header.size as usize;
        }
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn concurrent_writes_never_produce_overlapping_flushes() {
        let socket = CollectingSocket::new();
        let writer = ProtocolWriter::new(socket.clone());

        let mut handles = Vec::new();
        for id in 1..=50u32 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                writer.write(regular(id, b"x")).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        writer.flush().await.unwrap();

        let written = socket.written.lock().await;
        let mut ids = Vec::new();
        for blob in written.iter() {
            let mut offset = 0;
            while offset < blob.len() {
                let header = decode_header(blob.slice(offset..offset + crate::message::HEADER_LENGTH));
                ids.push(header.id);
                offset += crate::message::HEADER_LENGTH + header.size as usize;
            }
        }
        assert_eq!(ids, (1..=50).collect::<Vec<_>>(), "every id lands exactly once, in order");
    }
}
