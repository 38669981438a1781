//! Canceling a call before the callee answers delivers a `Cancel`
//! control frame, flips the callee's cooperative cancellation token,
//! and the caller's deferred settles with the same `Canceled` error the
//! callee replied with.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eh_test_support::InMemorySocketPair;
use exthost_bridge::prelude::*;
use tokio_util::sync::CancellationToken;

const SLOW: ProxyIdentifier = ProxyIdentifier::new(3, "Slow");

struct SlowActor(Arc<AtomicU32>);
impl LocalActor for SlowActor {
    fn call(&self, _method: &str, _args: Vec<RpcArg>, cancel: CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>> {
        let canceled = self.0.clone();
        Box::pin(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    canceled.fetch_add(1, Ordering::SeqCst);
                    Err(RpcError::Canceled)
                }
                () = tokio::time::sleep(Duration::from_secs(30)) => Ok(ReplyValue::Empty),
            }
        })
    }
}

#[tokio::test]
async fn canceling_before_the_callee_answers_settles_as_canceled() {
    let (a, b) = InMemorySocketPair::connected();
    let caller = RPCProtocol::new(PersistentProtocol::new(a, false), None);
    let callee = RPCProtocol::new(PersistentProtocol::new(b, false), None);
    let canceled = Arc::new(AtomicU32::new(0));
    callee.register_local(SLOW, Arc::new(SlowActor(canceled.clone())));

    let proxy = caller.proxy(SLOW);
    let token = CancellationToken::new();
    let call = {
        let token = token.clone();
        tokio::spawn(async move { proxy.call_cancellable("longOp", vec![], token).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .expect("the call should settle promptly once canceled")
        .unwrap();

    assert!(matches!(result, Err(RpcError::Remote { ref name, .. }) if name == "Canceled"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(canceled.load(Ordering::SeqCst), 1, "the callee's token should have observed the cancellation");
}
