use thiserror::Error;

/// Transport/framing errors from the L0/L1 layers.
///
/// Framing errors (malformed frames from a well-behaved peer should not
/// occur) are handled by dropping the offending frame at the call site,
/// not by constructing this type; `WireError` covers the genuinely
/// exceptional cases: I/O failure and use-after-dispose.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("writer is disposed")]
    Disposed,
    #[error("socket closed")]
    Closed,
}
