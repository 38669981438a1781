use std::time::Duration;

pub use eh_wire::HEADER_LENGTH;

/// How long a peer has to acknowledge before we send a dedicated ACK
/// even though no outgoing regular traffic has piggy-backed one.
pub const ACKNOWLEDGE_TIME: Duration = Duration::from_millis(2000);

/// Threshold past which an un-acked send is considered for an
/// unresponsiveness declaration.
pub const TIMEOUT_TIME: Duration = Duration::from_millis(20_000);

/// Window during which a disconnected peer may reconnect and resume the
/// same logical session.
pub const RECONNECTION_GRACE_TIME: Duration = Duration::from_secs(3 * 60 * 60);

/// Shortened grace window used once a previous reconnection already
/// happened in this session.
pub const RECONNECTION_SHORT_GRACE_TIME: Duration = Duration::from_secs(5 * 60);

/// Interval between keep-alive emissions when keep-alive is enabled.
pub const KEEP_ALIVE_SEND_TIME: Duration = Duration::from_millis(5000);

/// Minimum spacing between replay requests for the same gap.
pub const REPLAY_REQUEST_MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Floor on the delay before the next unresponsiveness poll.
pub const UNRESPONSIVE_POLL_FLOOR: Duration = Duration::from_millis(500);
