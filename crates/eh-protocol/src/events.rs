use std::time::Duration;

use bytes::Bytes;
use eh_wire::CloseReason;

/// Fired when the oldest unacknowledged send has gone quiet for long
/// enough, and the load estimator didn't veto the declaration.
#[derive(Debug, Clone, Copy)]
pub struct UnresponsivenessEvent {
    pub unack_count: usize,
    pub time_since_oldest_unacked: Duration,
    pub time_since_last_rx: Duration,
}

/// Events a [`crate::PersistentProtocol`] emits. Mirrors the shape of the
/// handful of `tokio::sync::broadcast` event enums this codebase already
/// uses for session lifecycle fan-out, rather than a JS-style callback
/// registry.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    Message(Bytes),
    ControlMessage(Bytes),
    SocketClose(CloseReason),
    SocketTimeout(UnresponsivenessEvent),
    Dispose,
}
