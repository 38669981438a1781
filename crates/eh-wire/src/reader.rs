//! L1 incoming framing: turns a [`DuplexSocket`]'s byte stream into a
//! sequence of [`ProtocolMessage`]s.
//!
//! A small state machine alternates between header mode (13 bytes) and
//! body mode (`size` bytes). Errors raised by listeners are logged and
//! swallowed; reading continues.

use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, warn};

use crate::chunk::ChunkStream;
use crate::message::{self, Header, MessageKind, ProtocolMessage, HEADER_LENGTH};
use crate::socket::{CloseReason, DuplexSocket, SocketEvent};

#[derive(Clone, Copy)]
enum ReadState {
    Header,
    Body(Header),
}

type Listener = Box<dyn Fn(&ProtocolMessage) + Send + Sync>;

/// Parses framed [`ProtocolMessage`]s out of a socket's data events.
pub struct ProtocolReader<S: DuplexSocket> {
    socket: Mutex<std::sync::Arc<S>>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
    chunks: Mutex<ChunkStream>,
    state: Mutex<ReadState>,
    listeners: Mutex<Vec<Listener>>,
    closed_listeners: Mutex<Vec<Box<dyn Fn(CloseReason) + Send + Sync>>>,
    last_read_time: Mutex<Option<Instant>>,
}

impl<S: DuplexSocket> ProtocolReader<S> {
    #[must_use]
    pub fn new(socket: std::sync::Arc<S>) -> std::sync::Arc<Self> {
        let reader = std::sync::Arc::new(Self {
            socket: Mutex::new(socket),
            pump: Mutex::new(None),
            chunks: Mutex::new(ChunkStream::new()),
            state: Mutex::new(ReadState::Header),
            listeners: Mutex::new(Vec::new()),
            closed_listeners: Mutex::new(Vec::new()),
            last_read_time: Mutex::new(None),
        });
        reader.spawn_pump();
        reader
    }

    /// Feed bytes that were already consumed from the socket before this
    /// reader existed (a reconnection handshake's leftover prelude).
    pub fn feed_initial_chunk(&self, chunk: bytes::Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.accept_chunk(chunk);
    }

    /// Splice a freshly connected socket in, preserving listeners and the
    /// framing state machine (a message that started arriving on the old
    /// socket before it dropped stays half-read until replaced bytes
    /// arrive on the new one). Used for reconnection, not first connect.
    pub fn rebind(self: &std::sync::Arc<Self>, socket: std::sync::Arc<S>, initial_chunk: bytes::Bytes) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
        *self.socket.lock().unwrap() = socket;
        self.spawn_pump();
        self.feed_initial_chunk(initial_chunk);
    }

    /// Register a listener for every accepted [`ProtocolMessage`].
    /// Listeners are snapshotted before each dispatch so registering or
    /// dropping a listener from inside a callback is safe.
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&ProtocolMessage) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    pub fn on_closed<F>(&self, listener: F)
    where
        F: Fn(CloseReason) + Send + Sync + 'static,
    {
        self.closed_listeners.lock().unwrap().push(Box::new(listener));
    }

    #[must_use]
    pub fn last_read_time(&self) -> Option<Instant> {
        *self.last_read_time.lock().unwrap()
    }

    fn spawn_pump(self: &std::sync::Arc<Self>) {
        let this = self.clone();
        let socket = self.socket.lock().unwrap().clone();
        let mut sub = socket.subscribe();
        socket.start_receiving();
        let handle = tokio::spawn(async move {
            loop {
                match sub.recv().await {
                    Ok(SocketEvent::Data(bytes)) => this.accept_chunk(bytes),
                    Ok(SocketEvent::Close(reason)) => {
                        this.dispatch_closed(reason);
                        break;
                    }
                    Ok(SocketEvent::End) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "protocol reader lagged behind socket events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.pump.lock().unwrap() = Some(handle);
    }

    fn accept_chunk(&self, bytes: bytes::Bytes) {
        *self.last_read_time.lock().unwrap() = Some(Instant::now());
        self.chunks.lock().unwrap().accept(bytes);
        self.drain_available();
    }

    fn drain_available(&self) {
        loop {
            let maybe_message = {
                let mut chunks = self.chunks.lock().unwrap();
                let mut state = self.state.lock().unwrap();
                match *state {
                    ReadState::Header => {
                        if !chunks.has(HEADER_LENGTH) {
                            return;
                        }
                        let header_bytes = chunks.read(HEADER_LENGTH).unwrap();
                        let header = message::decode_header(header_bytes);
                        if header.size == 0 {
                            *state = ReadState::Header;
                            Some(ProtocolMessage::new(
                                header.kind,
                                header.id,
                                header.ack,
                                bytes::Bytes::new(),
                            ))
                        } else {
                            *state = ReadState::Body(header);
                            None
                        }
                    }
                    ReadState::Body(header) => {
                        if !chunks.has(header.size as usize) {
                            return;
                        }
                        let payload = chunks.read(header.size as usize).unwrap();
                        *state = ReadState::Header;
                        Some(ProtocolMessage::new(header.kind, header.id, header.ack, payload))
                    }
                }
            };

            match maybe_message {
                Some(msg) => self.dispatch_message(&msg),
                None => continue,
            }
        }
    }

    fn dispatch_message(&self, msg: &ProtocolMessage) {
        if matches!(msg.kind, MessageKind::Unknown(_)) {
            debug!(kind = msg.kind.to_u8(), "dropping frame with unknown type");
            return;
        }
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            // A listener panic is a programming error in the embedder;
            // it surfaces loudly rather than being swallowed here.
            listener(msg);
        }
    }

    fn dispatch_closed(&self, reason: CloseReason) {
        let listeners = self.closed_listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(reason.clone());
        }
    }
}
