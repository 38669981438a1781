//! L2: combines the L1 reader/writer with acknowledgement, retransmission,
//! reconnection splicing, keep-alive and unresponsiveness detection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use eh_wire::{CloseReason, DuplexSocket, MessageKind, ProtocolMessage, ProtocolReader, ProtocolWriter};
use tokio::sync::broadcast;
use tracing::warn;

use crate::constants::{
    ACKNOWLEDGE_TIME, KEEP_ALIVE_SEND_TIME, RECONNECTION_GRACE_TIME, RECONNECTION_SHORT_GRACE_TIME,
    REPLAY_REQUEST_MIN_INTERVAL, TIMEOUT_TIME, UNRESPONSIVE_POLL_FLOOR,
};
use crate::diagnostics::ProtocolStatus;
use crate::error::ProtocolError;
use crate::events::{ProtocolEvent, UnresponsivenessEvent};
use crate::load::{AlwaysIdleLoadEstimator, LoadEstimator};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct UnackEntry {
    msg: ProtocolMessage,
    written_time: Instant,
}

struct OutgoingState {
    next_out_id: u32,
    out_ack: u32,
    unack_queue: VecDeque<UnackEntry>,
}

struct IncomingState {
    next_in_id: u32,
    in_ack: u32,
    last_incoming_msg_time: Option<Instant>,
}

struct Timers {
    last_replay_request_time: Option<Instant>,
    last_timeout_time: Instant,
}

/// Reliable, resumable messaging over a [`DuplexSocket`], generic over a
/// pluggable [`LoadEstimator`] used to defer unresponsiveness
/// declarations when the host itself is the bottleneck.
pub struct PersistentProtocol<S: DuplexSocket, L: LoadEstimator = AlwaysIdleLoadEstimator> {
    reader: Arc<ProtocolReader<S>>,
    writer: Arc<ProtocolWriter<S>>,
    out: Mutex<OutgoingState>,
    inc: Mutex<IncomingState>,
    timers: Mutex<Timers>,
    is_reconnecting: AtomicBool,
    is_disposed: AtomicBool,
    awaiting_reconnection: AtomicBool,
    had_reconnected_once: AtomicBool,
    reconnection_epoch: AtomicU64,
    keep_alive_enabled: AtomicBool,
    load_estimator: L,
    events: broadcast::Sender<ProtocolEvent>,
}

impl<S: DuplexSocket> PersistentProtocol<S, AlwaysIdleLoadEstimator> {
    /// Construct a protocol instance with a load estimator that always
    /// reports idle, a reasonable default for hosts with no cheaper
    /// signal to consult.
    #[must_use]
    pub fn new(socket: Arc<S>, keep_alive_enabled: bool) -> Arc<Self> {
        Self::with_load_estimator(socket, keep_alive_enabled, AlwaysIdleLoadEstimator)
    }
}

impl<S: DuplexSocket, L: LoadEstimator> PersistentProtocol<S, L> {
    #[must_use]
    pub fn with_load_estimator(socket: Arc<S>, keep_alive_enabled: bool, load_estimator: L) -> Arc<Self> {
        let reader = ProtocolReader::new(socket.clone());
        let writer = ProtocolWriter::new(socket);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let protocol = Arc::new(Self {
            reader,
            writer,
            out: Mutex::new(OutgoingState {
                next_out_id: 0,
                out_ack: 0,
                unack_queue: VecDeque::new(),
            }),
            inc: Mutex::new(IncomingState {
                next_in_id: 0,
                in_ack: 0,
                last_incoming_msg_time: None,
            }),
            timers: Mutex::new(Timers {
                last_replay_request_time: None,
                last_timeout_time: Instant::now(),
            }),
            is_reconnecting: AtomicBool::new(false),
            is_disposed: AtomicBool::new(false),
            awaiting_reconnection: AtomicBool::new(false),
            had_reconnected_once: AtomicBool::new(false),
            reconnection_epoch: AtomicU64::new(0),
            keep_alive_enabled: AtomicBool::new(keep_alive_enabled),
            load_estimator,
            events,
        });

        protocol.install_reader_listeners();
        protocol.clone().spawn_ack_ticker();
        protocol.clone().spawn_unresponsiveness_detector();
        protocol.clone().spawn_keep_alive();
        protocol
    }

    /// Subscribe to protocol lifecycle/message events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> ProtocolStatus {
        let out = self.out.lock().unwrap();
        let inc = self.inc.lock().unwrap();
        ProtocolStatus {
            next_out_id: out.next_out_id,
            out_ack: out.out_ack,
            unacked_count: out.unack_queue.len(),
            next_in_id: inc.next_in_id,
            in_ack: inc.in_ack,
            is_reconnecting: self.is_reconnecting.load(Ordering::SeqCst),
            time_since_last_incoming: inc.last_incoming_msg_time.map(|t| t.elapsed()),
        }
    }

    /// Enqueue `payload` as the next REGULAR message. Queued immediately
    /// behind an outgoing ack cursor so the peer's `unackQueue` never
    /// grows from our silence; actually written to the wire unless a
    /// reconnection splice is in progress, in which case it waits in
    /// `unack_queue` for [`Self::end_accept_reconnection`].
    pub fn send(self: &Arc<Self>, payload: Bytes) -> Result<(), ProtocolError> {
        if self.is_disposed.load(Ordering::SeqCst) {
            return Err(ProtocolError::Disposed);
        }
        let msg = {
            let mut out = self.out.lock().unwrap();
            out.next_out_id += 1;
            let id = out.next_out_id;
            let ack = self.inc.lock().unwrap().next_in_id;
            let msg = ProtocolMessage::new(MessageKind::Regular, id, ack, payload);
            out.unack_queue.push_back(UnackEntry {
                msg: msg.clone(),
                written_time: Instant::now(),
            });
            msg
        };
        if !self.is_reconnecting.load(Ordering::SeqCst) {
            self.writer.write(msg)?;
        }
        Ok(())
    }

    pub fn send_control(self: &Arc<Self>, payload: Bytes) -> Result<(), ProtocolError> {
        let ack = self.inc.lock().unwrap().next_in_id;
        self.writer
            .write(ProtocolMessage::new(MessageKind::Control, 0, ack, payload))?;
        Ok(())
    }

    pub fn set_keep_alive_enabled(&self, enabled: bool) {
        self.keep_alive_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Splice a freshly connected socket in. Messages sent via
    /// [`Self::send`] while reconnecting are queued but not written
    /// until [`Self::end_accept_reconnection`].
    pub fn begin_accept_reconnection(self: &Arc<Self>, socket: Arc<S>, initial_chunk: Bytes) {
        self.is_reconnecting.store(true, Ordering::SeqCst);
        self.awaiting_reconnection.store(false, Ordering::SeqCst);
        self.reconnection_epoch.fetch_add(1, Ordering::SeqCst);
        self.writer.rebind_socket(socket.clone());
        self.reader.rebind(socket, initial_chunk);
    }

    /// Acknowledge the current read cursor, flush the unacknowledged
    /// backlog through the newly spliced writer, and resume normal
    /// sending.
    pub fn end_accept_reconnection(self: &Arc<Self>) -> Result<(), ProtocolError> {
        let ack = self.inc.lock().unwrap().next_in_id;
        self.writer.write(ProtocolMessage::special(MessageKind::Ack, ack))?;
        self.rewrite_unacked()?;
        self.had_reconnected_once.store(true, Ordering::SeqCst);
        self.is_reconnecting.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn dispose(&self) {
        if self.is_disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.events.send(ProtocolEvent::Dispose);
    }

    /// Re-send the unacknowledged backlog, in ascending id order, on a
    /// [`MessageKind::ReplayRequest`] or a reconnection splice. Goes
    /// through [`ProtocolWriter::retransmit`] rather than `write`: these
    /// ids may already have been counted past by the writer's ordering
    /// gate once, so a plain `write` would leave them parked forever.
    fn rewrite_unacked(&self) -> Result<(), ProtocolError> {
        let out = self.out.lock().unwrap();
        for entry in &out.unack_queue {
            self.writer.retransmit(entry.msg.clone())?;
        }
        Ok(())
    }

    fn install_reader_listeners(self: &Arc<Self>) {
        let this = self.clone();
        self.reader.on_message(move |msg| this.on_socket_message(msg));
        let this = self.clone();
        self.reader.on_closed(move |reason| this.on_socket_closed(reason));
    }

    fn on_socket_message(self: &Arc<Self>, msg: &ProtocolMessage) {
        self.handle_ack(msg.ack);
        match msg.kind {
            MessageKind::Regular => self.handle_regular(msg),
            MessageKind::Control => {
                let _ = self.events.send(ProtocolEvent::ControlMessage(msg.payload.clone()));
            }
            MessageKind::Ack => {}
            MessageKind::Disconnect => self.dispose(),
            MessageKind::ReplayRequest => {
                if let Err(e) = self.rewrite_unacked() {
                    warn!(error = %e, "failed to replay unacknowledged backlog");
                }
            }
            MessageKind::Pause => self.writer.pause(),
            MessageKind::Resume => self.writer.resume(),
            MessageKind::KeepAlive | MessageKind::None | MessageKind::Unknown(_) => {}
        }
    }

    fn on_socket_closed(self: &Arc<Self>, reason: CloseReason) {
        let _ = self.events.send(ProtocolEvent::SocketClose(reason));
        if self.is_disposed.load(Ordering::SeqCst) {
            return;
        }
        self.awaiting_reconnection.store(true, Ordering::SeqCst);
        let epoch = self.reconnection_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let grace = if self.had_reconnected_once.load(Ordering::SeqCst) {
            RECONNECTION_SHORT_GRACE_TIME
        } else {
            RECONNECTION_GRACE_TIME
        };
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if this.reconnection_epoch.load(Ordering::SeqCst) == epoch
                && this.awaiting_reconnection.load(Ordering::SeqCst)
            {
                this.dispose();
            }
        });
    }

    fn handle_ack(&self, ack: u32) {
        let mut out = self.out.lock().unwrap();
        if ack > out.out_ack {
            out.out_ack = ack;
        }
        while let Some(front) = out.unack_queue.front() {
            if front.msg.id <= out.out_ack {
                out.unack_queue.pop_front();
            } else {
                break;
            }
        }
    }

    fn handle_regular(self: &Arc<Self>, msg: &ProtocolMessage) {
        let expected_next = {
            let inc = self.inc.lock().unwrap();
            inc.next_in_id + 1
        };
        if msg.id == expected_next {
            {
                let mut inc = self.inc.lock().unwrap();
                inc.next_in_id = msg.id;
                inc.last_incoming_msg_time = Some(Instant::now());
            }
            let _ = self.events.send(ProtocolEvent::Message(msg.payload.clone()));
        } else if msg.id > expected_next {
            self.request_replay(expected_next, msg.id);
        }
        // id < expected_next: a duplicate delivered during a replay, drop silently.
    }

    fn request_replay(&self, expected: u32, got: u32) {
        let should_request = {
            let mut timers = self.timers.lock().unwrap();
            let now = Instant::now();
            let allow = timers
                .last_replay_request_time
                .is_none_or(|t| now.duration_since(t) >= REPLAY_REQUEST_MIN_INTERVAL);
            if allow {
                timers.last_replay_request_time = Some(now);
            }
            allow
        };
        if !should_request {
            return;
        }
        warn!(expected, got, "gap in incoming regular ids; requesting replay");
        let ack = self.inc.lock().unwrap().next_in_id;
        if let Err(e) = self.writer.write(ProtocolMessage::special(MessageKind::ReplayRequest, ack)) {
            warn!(error = %e, "failed to send replay request");
        }
    }

    fn maybe_send_dedicated_ack(&self) {
        let ack_to_send = {
            let mut inc = self.inc.lock().unwrap();
            if inc.next_in_id > inc.in_ack {
                inc.in_ack = inc.next_in_id;
                Some(inc.next_in_id)
            } else {
                None
            }
        };
        if let Some(ack) = ack_to_send {
            if let Err(e) = self.writer.write(ProtocolMessage::special(MessageKind::Ack, ack)) {
                warn!(error = %e, "failed to send dedicated ack");
            }
        }
    }

    fn spawn_ack_ticker(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ACKNOWLEDGE_TIME);
            loop {
                interval.tick().await;
                if self.is_disposed.load(Ordering::SeqCst) {
                    break;
                }
                self.maybe_send_dedicated_ack();
            }
        });
    }

    fn spawn_keep_alive(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(KEEP_ALIVE_SEND_TIME);
            loop {
                interval.tick().await;
                if self.is_disposed.load(Ordering::SeqCst) {
                    break;
                }
                if !self.keep_alive_enabled.load(Ordering::SeqCst) {
                    continue;
                }
                let ack = self.inc.lock().unwrap().next_in_id;
                if let Err(e) = self.writer.write(ProtocolMessage::special(MessageKind::KeepAlive, ack)) {
                    warn!(error = %e, "failed to send keep-alive");
                }
            }
        });
    }

    fn spawn_unresponsiveness_detector(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                if self.is_disposed.load(Ordering::SeqCst) {
                    break;
                }
                let delay = self.unresponsiveness_poll();
                tokio::time::sleep(delay).await;
            }
        });
    }

    fn unresponsiveness_poll(&self) -> Duration {
        let t_msg = {
            let out = self.out.lock().unwrap();
            match out.unack_queue.front() {
                Some(entry) => entry.written_time.elapsed(),
                None => return TIMEOUT_TIME,
            }
        };
        let t_rx = self
            .reader
            .last_read_time()
            .map_or(t_msg, |t| t.elapsed());
        let t_to = self.timers.lock().unwrap().last_timeout_time.elapsed();

        if t_msg >= TIMEOUT_TIME && t_rx >= TIMEOUT_TIME && t_to >= TIMEOUT_TIME {
            if self.load_estimator.has_high_load() {
                return UNRESPONSIVE_POLL_FLOOR;
            }
            self.timers.lock().unwrap().last_timeout_time = Instant::now();
            let unack_count = self.out.lock().unwrap().unack_queue.len();
            let _ = self.events.send(ProtocolEvent::SocketTimeout(UnresponsivenessEvent {
                unack_count,
                time_since_oldest_unacked: t_msg,
                time_since_last_rx: t_rx,
            }));
            TIMEOUT_TIME
        } else {
            let max_elapsed = t_msg.max(t_rx).max(t_to);
            TIMEOUT_TIME
                .checked_sub(max_elapsed)
                .unwrap_or(Duration::ZERO)
                .max(UNRESPONSIVE_POLL_FLOOR)
        }
    }
}
