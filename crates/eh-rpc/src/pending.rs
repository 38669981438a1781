//! Caller-side bookkeeping for an outstanding request: a one-shot sink
//! that resolves exactly once with a value or an error, paired with the
//! disposable that would otherwise forward a peer cancellation once the
//! reply has already arrived.

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::args::ReplyValue;
use crate::error::RpcError;

/// The caller-side record for one in-flight `req`. Dropped (and its
/// `cancel_token` cancelled) once the reply arrives or the protocol is
/// disposed, whichever comes first.
pub struct PendingReply {
    tx: oneshot::Sender<Result<ReplyValue, RpcError>>,
    /// Signaled when the reply has been delivered, so a caller-side
    /// cancellation task stops watching and does not emit a stray
    /// `Cancel` after the call already completed.
    pub settled: CancellationToken,
}

impl PendingReply {
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<Result<ReplyValue, RpcError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx, settled: CancellationToken::new() }, rx)
    }

    /// Resolve the pending reply exactly once. A dropped receiver (the
    /// caller stopped awaiting) is not an error here; there is nothing
    /// left to deliver to.
    pub fn complete(self, result: Result<ReplyValue, RpcError>) {
        self.settled.cancel();
        let _ = self.tx.send(result);
    }
}
