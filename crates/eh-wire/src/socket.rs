//! L0: duplex byte stream abstraction.
//!
//! A socket exposes data/close/end events plus `write`/`end`/`drain` and
//! diagnostic tracing. Two concrete transports are
//! provided: [`TcpSocket`] (loopback TCP, used on Windows) and
//! [`UnixSocket`] (Unix domain socket, used elsewhere). Both implement
//! the same [`DuplexSocket`] trait so the layers above are transport
//! agnostic; `eh-test-support` provides a third, in-memory implementation
//! for tests.

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, trace, warn};

use crate::error::WireError;

/// Why a socket closed.
///
/// The spec's source union (`NodeSocketClose(hadError, error?)` /
/// `WebSocketClose(code, reason, wasClean, event?)`) collapses to one
/// shape here because this core only ever runs over TCP/Unix sockets.
#[derive(Debug, Clone)]
pub enum CloseReason {
    /// The peer performed an orderly shutdown (EOF with no pending error).
    Graceful,
    /// The connection failed; the message is the underlying I/O error
    /// rendered via `Display` (kept as a `String` so the event is `Clone`).
    Error(String),
}

/// Events a [`DuplexSocket`] emits. Errors never arrive through `Data`;
/// they always surface as a `Close` event.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    Data(Bytes),
    Close(CloseReason),
    End,
}

/// A duplex, byte-oriented, possibly-disconnecting transport.
///
/// Implementors must tolerate `write` being called while a previous
/// write is still draining; callers serialize writes themselves
/// ([`crate::writer::ProtocolWriter`] already guarantees at most one
/// write in flight).
pub trait DuplexSocket: Send + Sync + 'static {
    /// Subscribe to this socket's event stream. Each subscriber gets its
    /// own queue; a slow subscriber only drops events for itself
    /// (`broadcast::Receiver::recv` surfaces `Lagged`).
    fn subscribe(&self) -> broadcast::Receiver<SocketEvent>;

    /// Write `bytes` to the socket. Must not be called concurrently with
    /// itself by the same caller (the writer layer upholds this).
    fn write(&self, bytes: Bytes) -> impl Future<Output = Result<(), WireError>> + Send;

    /// Half-close the write side.
    fn end(&self) -> impl Future<Output = Result<(), WireError>> + Send;

    /// Suspend until any writer-side backlog is flushed. The concrete
    /// transports here write synchronously to the kernel socket buffer,
    /// so this is a no-op past `write` returning; it exists as a seam
    /// for transports (e.g. a rate-limited test double) that do buffer.
    fn drain(&self) -> impl Future<Output = Result<(), WireError>> + Send {
        std::future::ready(Ok(()))
    }

    /// Emit a structured diagnostic trace point; a no-op unless the
    /// embedder has wired tracing subscribers to act on it.
    fn trace_event(&self, kind: &str, data: &str) {
        trace!(kind, data, "socket event");
    }

    /// Begin the background read loop. Idempotent: a second call is a
    /// no-op. Must be called before any `Data`/`Close`/`End` events are
    /// delivered to subscribers.
    fn start_receiving(&self);
}

const READ_BUF_SIZE: usize = 64 * 1024;

macro_rules! impl_duplex_socket {
    ($name:ident, $stream:ty, $label:literal) => {
        /// A [`DuplexSocket`] backed by a
        #[doc = $label]
        pub struct $name {
            write_half: Mutex<tokio::io::WriteHalf<$stream>>,
            // Only ever taken once, by `start_receiving`; a std mutex is
            // fine since it is never held across an await point.
            read_half: std::sync::Mutex<Option<tokio::io::ReadHalf<$stream>>>,
            events: broadcast::Sender<SocketEvent>,
            receiving: std::sync::atomic::AtomicBool,
        }

        impl $name {
            #[must_use]
            pub fn new(stream: $stream) -> Arc<Self> {
                let (read_half, write_half) = tokio::io::split(stream);
                let (events, _) = broadcast::channel(1024);
                Arc::new(Self {
                    write_half: Mutex::new(write_half),
                    read_half: std::sync::Mutex::new(Some(read_half)),
                    events,
                    receiving: std::sync::atomic::AtomicBool::new(false),
                })
            }
        }

        impl DuplexSocket for $name {
            fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
                self.events.subscribe()
            }

            async fn write(&self, bytes: Bytes) -> Result<(), WireError> {
                let mut half = self.write_half.lock().await;
                half.write_all(&bytes).await?;
                Ok(())
            }

            async fn end(&self) -> Result<(), WireError> {
                let mut half = self.write_half.lock().await;
                half.shutdown().await?;
                Ok(())
            }

            fn start_receiving(&self) {
                use std::sync::atomic::Ordering;
                if self.receiving.swap(true, Ordering::SeqCst) {
                    return;
                }
                let Some(mut read_half) = self.read_half.lock().unwrap().take() else {
                    return;
                };
                let events = self.events.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; READ_BUF_SIZE];
                    loop {
                        match read_half.read(&mut buf).await {
                            Ok(0) => {
                                debug!("socket reached EOF");
                                let _ = events.send(SocketEvent::End);
                                let _ = events.send(SocketEvent::Close(CloseReason::Graceful));
                                break;
                            }
                            Ok(n) => {
                                let _ = events.send(SocketEvent::Data(Bytes::copy_from_slice(&buf[..n])));
                            }
                            Err(e) => {
                                warn!(error = %e, "socket read error");
                                let _ = events.send(SocketEvent::Close(CloseReason::Error(e.to_string())));
                                break;
                            }
                        }
                    }
                });
            }
        }
    };
}

impl_duplex_socket!(TcpSocket, TcpStream, "loopback TCP connection");
impl_duplex_socket!(UnixSocket, UnixStream, "Unix domain socket connection");
