//! L3 dispatch (§4.6): correlates outgoing requests with their replies,
//! answers incoming requests by looking up a registered [`LocalActor`],
//! and tracks RPC-level responsiveness independent of the socket-level
//! unresponsiveness `eh_protocol::PersistentProtocol` already watches.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use eh_protocol::{LoadEstimator, PersistentProtocol, ProtocolEvent};
use eh_wire::DuplexSocket;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::args::{RemoteError, ReplyValue, RpcArg, UriTransform};
use crate::error::RpcError;
use crate::ids::ProxyIdentifier;
use crate::pending::PendingReply;
use crate::responsive::{ResponsiveState, Unresponsiveness};
use crate::wire::InnerMessage;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Services the core's incoming calls for one registered [`ProxyIdentifier`].
/// Method/arity resolution among the actor's declared operations (§4.6
/// step 3) is this trait's own concern — Rust has no runtime reflection
/// to enumerate it generically, so each implementation matches on
/// `method` itself (design note 9(a): uniform dispatch, hand-rolled
/// typed wrappers on top, see DESIGN.md).
pub trait LocalActor: Send + Sync {
    fn call(&self, method: &str, args: Vec<RpcArg>, cancel: CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>>;
}

/// L3 RPC dispatch over a live [`PersistentProtocol`]. Owns the flat
/// `locals` registry (written once at registration, read thereafter),
/// the caller-side `pending` replies keyed by `req`, and the callee-side
/// cancellation tokens for in-flight handler tasks.
pub struct RPCProtocol<S: DuplexSocket, L: LoadEstimator> {
    protocol: Arc<PersistentProtocol<S, L>>,
    transform: Option<Arc<dyn UriTransform>>,
    locals: Mutex<Vec<Option<Arc<dyn LocalActor>>>>,
    pending: Mutex<HashMap<u32, PendingReply>>,
    in_flight: Mutex<HashMap<u32, CancellationToken>>,
    next_req: AtomicU32,
    unresponsive: Unresponsiveness,
    is_disposed: AtomicBool,
}

impl<S: DuplexSocket + 'static, L: LoadEstimator + 'static> RPCProtocol<S, L> {
    #[must_use]
    pub fn new(protocol: Arc<PersistentProtocol<S, L>>, transform: Option<Arc<dyn UriTransform>>) -> Arc<Self> {
        let rpc = Arc::new(Self {
            protocol,
            transform,
            locals: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_req: AtomicU32::new(0),
            unresponsive: Unresponsiveness::new(),
            is_disposed: AtomicBool::new(false),
        });
        rpc.clone().spawn_dispatch_loop();
        rpc.clone().spawn_unresponsive_poll();
        rpc
    }

    /// Register the handler for calls addressed to `id.nid`. Entries are
    /// written once, at startup, and never removed.
    pub fn register_local(&self, id: ProxyIdentifier, actor: Arc<dyn LocalActor>) {
        let mut locals = self.locals.lock().unwrap();
        let idx = id.nid as usize;
        if locals.len() <= idx {
            locals.resize(idx + 1, None);
        }
        locals[idx] = Some(actor);
    }

    /// A lightweight handle for calling the peer's `id` endpoint. Cheap
    /// to create repeatedly; there is nothing to cache (design note 9,
    /// `proxies[nid]` collapses to this constructor since the call path
    /// carries no per-proxy state of its own).
    #[must_use]
    pub fn proxy(self: &Arc<Self>, id: ProxyIdentifier) -> RpcProxy<S, L> {
        RpcProxy { rpc: self.clone(), id }
    }

    /// The underlying reliability-layer protocol, for callers that need
    /// to splice in a reconnected socket or subscribe to its events
    /// directly (host binaries, mostly).
    #[must_use]
    pub fn protocol(&self) -> &Arc<PersistentProtocol<S, L>> {
        &self.protocol
    }

    #[must_use]
    pub fn subscribe_responsive(&self) -> broadcast::Receiver<ResponsiveState> {
        self.unresponsive.subscribe()
    }

    #[must_use]
    pub fn responsive_state(&self) -> ResponsiveState {
        self.unresponsive.state()
    }

    /// Cancel every pending caller-side reply with [`RpcError::Disposed`]
    /// and cancel every in-flight callee-side handler task. Does not
    /// touch the underlying socket; the owner disposes that separately.
    pub fn dispose(&self) {
        if self.is_disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let pending: Vec<_> = self.pending.lock().unwrap().drain().map(|(_, p)| p).collect();
        for p in pending {
            p.complete(Err(RpcError::Disposed));
        }
        let in_flight: Vec<_> = self.in_flight.lock().unwrap().drain().map(|(_, t)| t).collect();
        for token in in_flight {
            token.cancel();
        }
    }

    async fn call_remote(
        self: &Arc<Self>,
        id: ProxyIdentifier,
        method: &str,
        args: Vec<RpcArg>,
        cancel: Option<CancellationToken>,
    ) -> Result<ReplyValue, RpcError> {
        if self.is_disposed.load(Ordering::SeqCst) {
            return Err(RpcError::Disposed);
        }
        let req = self.next_req.fetch_add(1, Ordering::SeqCst) + 1;
        let (pending, rx) = PendingReply::new();
        let settled = pending.settled.clone();
        self.pending.lock().unwrap().insert(req, pending);

        self.unresponsive.on_will_send_request();

        let with_cancellation = cancel.is_some();
        let msg = InnerMessage::Request {
            req,
            rpc_id: id.nid,
            method: method.to_owned(),
            args,
            with_cancellation,
        };
        let bytes = match msg.encode(self.transform.as_deref()) {
            Ok(b) => b,
            Err(e) => {
                self.pending.lock().unwrap().remove(&req);
                return Err(e);
            }
        };
        if let Err(e) = self.protocol.send(bytes) {
            if let Some(p) = self.pending.lock().unwrap().remove(&req) {
                p.complete(Err(RpcError::Protocol(e)));
            }
            return Err(RpcError::Disposed);
        }

        if let Some(token) = cancel {
            let this = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {
                        if !settled.is_cancelled() {
                            let _ = this.send_inner(InnerMessage::Cancel { req });
                        }
                    }
                    () = settled.cancelled() => {}
                }
            });
        }

        rx.await.unwrap_or(Err(RpcError::Disposed))
    }

    fn send_inner(&self, msg: InnerMessage) -> Result<(), RpcError> {
        let bytes = msg.encode(self.transform.as_deref())?;
        self.protocol.send(bytes)?;
        Ok(())
    }

    fn spawn_dispatch_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut events = self.protocol.subscribe();
            loop {
                match events.recv().await {
                    Ok(ProtocolEvent::Message(bytes)) => match InnerMessage::decode(bytes, self.transform.as_deref()) {
                        Ok(msg) => self.clone().handle_inner(msg),
                        Err(e) => warn!(error = %e, "dropping malformed inner RPC frame"),
                    },
                    Ok(ProtocolEvent::Dispose) => {
                        self.dispose();
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "rpc dispatch loop lagged behind protocol events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn spawn_unresponsive_poll(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                if self.is_disposed.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(Unresponsiveness::poll_interval()).await;
                self.unresponsive.poll();
            }
        });
    }

    fn handle_inner(self: Arc<Self>, msg: InnerMessage) {
        match msg {
            InnerMessage::Request { req, rpc_id, method, args, with_cancellation } => {
                self.spawn_request_handler(req, rpc_id, method, args, with_cancellation);
            }
            InnerMessage::Acknowledged { .. } => {
                self.unresponsive.on_did_receive_acknowledge();
            }
            InnerMessage::Cancel { req } => {
                if let Some(token) = self.in_flight.lock().unwrap().get(&req) {
                    token.cancel();
                }
            }
            InnerMessage::ReplyOkEmpty { req } => self.resolve_pending(req, Ok(ReplyValue::Empty)),
            InnerMessage::ReplyOkBuffer { req, buffer } => self.resolve_pending(req, Ok(ReplyValue::Buffer(buffer))),
            InnerMessage::ReplyOkJson { req, value } => self.resolve_pending(req, Ok(ReplyValue::Json(value))),
            InnerMessage::ReplyOkJsonWithBuffers { req, value } => {
                self.resolve_pending(req, Ok(ReplyValue::WithBuffers(value)));
            }
            InnerMessage::ReplyErrError { req, error } => {
                self.resolve_pending(req, Err(RpcError::Remote { name: error.name, message: error.message }));
            }
            InnerMessage::ReplyErrEmpty { req } => {
                self.resolve_pending(
                    req,
                    Err(RpcError::Remote { name: "Error".to_owned(), message: "unknown error".to_owned() }),
                );
            }
        }
    }

    fn resolve_pending(&self, req: u32, result: Result<ReplyValue, RpcError>) {
        if let Some(pending) = self.pending.lock().unwrap().remove(&req) {
            pending.complete(result);
        }
    }

    fn spawn_request_handler(self: Arc<Self>, req: u32, rpc_id: u8, method: String, args: Vec<RpcArg>, with_cancellation: bool) {
        tokio::spawn(async move {
            // §4.6 step 4: acknowledge receipt immediately so the peer's
            // unresponsiveness tracking is prompt, before the handler runs.
            if let Err(e) = self.send_inner(InnerMessage::Acknowledged { req }) {
                warn!(req, error = %e, "failed to send Acknowledged for incoming request");
            }

            let actor = self.locals.lock().unwrap().get(rpc_id as usize).cloned().flatten();
            let Some(actor) = actor else {
                let err = RpcError::MissingActor(ProxyIdentifier::new(rpc_id, "unknown"));
                let _ = self.send_inner(InnerMessage::ReplyErrError {
                    req,
                    error: RemoteError { name: "Error".to_owned(), message: err.to_string(), stack: String::new() },
                });
                return;
            };

            let token = CancellationToken::new();
            if with_cancellation {
                self.in_flight.lock().unwrap().insert(req, token.clone());
            }
            let result = actor.call(&method, args, token).await;
            if with_cancellation {
                self.in_flight.lock().unwrap().remove(&req);
            }

            let reply = match result {
                Ok(ReplyValue::Empty) => InnerMessage::ReplyOkEmpty { req },
                Ok(ReplyValue::Buffer(buffer)) => InnerMessage::ReplyOkBuffer { req, buffer },
                Ok(ReplyValue::Json(value)) => InnerMessage::ReplyOkJson { req, value },
                Ok(ReplyValue::WithBuffers(value)) => InnerMessage::ReplyOkJsonWithBuffers { req, value },
                Err(RpcError::Canceled) => InnerMessage::ReplyErrError {
                    req,
                    error: RemoteError { name: "Canceled".to_owned(), message: "canceled".to_owned(), stack: String::new() },
                },
                Err(e) => InnerMessage::ReplyErrError {
                    req,
                    error: RemoteError { name: "Error".to_owned(), message: e.to_string(), stack: String::new() },
                },
            };
            if let Err(e) = self.send_inner(reply) {
                warn!(req, error = %e, "failed to send reply for incoming request");
            }
        });
    }
}

/// A callable handle to the peer's `id` endpoint.
pub struct RpcProxy<S: DuplexSocket, L: LoadEstimator> {
    rpc: Arc<RPCProtocol<S, L>>,
    id: ProxyIdentifier,
}

impl<S: DuplexSocket + 'static, L: LoadEstimator + 'static> RpcProxy<S, L> {
    pub async fn call(&self, method: &str, args: Vec<RpcArg>) -> Result<ReplyValue, RpcError> {
        self.rpc.call_remote(self.id, method, args, None).await
    }

    pub async fn call_cancellable(
        &self,
        method: &str,
        args: Vec<RpcArg>,
        cancel: CancellationToken,
    ) -> Result<ReplyValue, RpcError> {
        self.rpc.call_remote(self.id, method, args, Some(cancel)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32 as TestCounter, Ordering as TestOrdering};

    use bytes::Bytes;
    use eh_test_support::InMemorySocketPair;
    use serde_json::{Value, json};

    use super::*;

    struct Echo;
    impl LocalActor for Echo {
        fn call(&self, method: &str, args: Vec<RpcArg>, _cancel: CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>> {
            let method = method.to_owned();
            Box::pin(async move {
                match method.as_str() {
                    "echo" => match args.into_iter().next() {
                        Some(RpcArg::Value(v)) => Ok(ReplyValue::Json(v)),
                        _ => Err(RpcError::MalformedFrame("echo expects one JSON arg")),
                    },
                    "blob" => match args.into_iter().next() {
                        Some(RpcArg::Buffer(b)) => Ok(ReplyValue::Buffer(b)),
                        _ => Err(RpcError::MalformedFrame("blob expects one buffer arg")),
                    },
                    other => Err(RpcError::NoMatchingMethod { actor: ECHO, method: other.to_owned(), arity: args.len() }),
                }
            })
        }
    }

    struct CountingSlowActor(Arc<TestCounter>);
    impl LocalActor for CountingSlowActor {
        fn call(&self, _method: &str, _args: Vec<RpcArg>, cancel: CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>> {
            let counter = self.0.clone();
            Box::pin(async move {
                tokio::select! {
                    () = cancel.cancelled() => {
                        counter.fetch_add(1, TestOrdering::SeqCst);
                        Err(RpcError::Canceled)
                    }
                    () = tokio::time::sleep(std::time::Duration::from_secs(30)) => {
                        Ok(ReplyValue::Empty)
                    }
                }
            })
        }
    }

    const ECHO: ProxyIdentifier = ProxyIdentifier::new(1, "echo");
    const SLOW: ProxyIdentifier = ProxyIdentifier::new(2, "slow");

    async fn connected_pair() -> (Arc<RPCProtocol<eh_test_support::InMemorySocket, eh_protocol::AlwaysIdleLoadEstimator>>, Arc<RPCProtocol<eh_test_support::InMemorySocket, eh_protocol::AlwaysIdleLoadEstimator>>)
    {
        let (a, b) = InMemorySocketPair::connected();
        let alice = RPCProtocol::new(PersistentProtocol::new(a, false), None);
        let bob = RPCProtocol::new(PersistentProtocol::new(b, false), None);
        bob.register_local(ECHO, Arc::new(Echo));
        alice.register_local(ECHO, Arc::new(Echo));
        (alice, bob)
    }

    #[tokio::test]
    async fn echo_round_trips_json_args() {
        let (alice, bob) = connected_pair().await;
        let _ = bob;
        let proxy = alice.proxy(ECHO);
        let result = proxy.call("echo", vec![RpcArg::Value(json!("hello"))]).await.unwrap();
        assert!(matches!(result, ReplyValue::Json(Value::String(ref s)) if s == "hello"));
    }

    #[tokio::test]
    async fn blob_round_trips_buffer_args() {
        let (alice, bob) = connected_pair().await;
        let _ = bob;
        let proxy = alice.proxy(ECHO);
        let result = proxy.call("blob", vec![RpcArg::Buffer(Bytes::from_static(&[0x00, 0xff, 0x42]))]).await.unwrap();
        assert!(matches!(result, ReplyValue::Buffer(ref b) if &b[..] == [0x00, 0xff, 0x42]));
    }

    #[tokio::test]
    async fn missing_actor_surfaces_as_remote_error() {
        let (alice, bob) = connected_pair().await;
        let _ = bob;
        let unregistered = ProxyIdentifier::new(99, "nothing");
        let proxy = alice.proxy(unregistered);
        let err = proxy.call("anything", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::Remote { ref name, .. } if name == "Error"));
    }

    #[tokio::test]
    async fn cancellation_reaches_the_handler_task() {
        let (a, b) = InMemorySocketPair::connected();
        let alice = RPCProtocol::new(PersistentProtocol::new(a, false), None);
        let bob = RPCProtocol::new(PersistentProtocol::new(b, false), None);
        let cancel_count = Arc::new(TestCounter::new(0));
        bob.register_local(SLOW, Arc::new(CountingSlowActor(cancel_count.clone())));

        let proxy = alice.proxy(SLOW);
        let token = CancellationToken::new();
        let call = {
            let token = token.clone();
            tokio::spawn(async move { proxy.call_cancellable("longOp", vec![], token).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), call)
            .await
            .expect("call should settle promptly after cancellation")
            .unwrap();
        assert!(matches!(result, Err(RpcError::Remote { ref name, .. }) if name == "Canceled"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(cancel_count.load(TestOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispose_rejects_outstanding_calls() {
        let (a, b) = InMemorySocketPair::connected();
        let alice = RPCProtocol::new(PersistentProtocol::new(a, false), None);
        let _bob_persistent = PersistentProtocol::new(b, false);
        // no actor ever registered on the peer side; alice's call hangs
        // until dispose rejects it.
        let proxy = alice.proxy(ECHO);
        let call = tokio::spawn(async move { proxy.call("echo", vec![RpcArg::Value(json!("x"))]).await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        alice.dispose();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), call).await.unwrap().unwrap();
        assert!(matches!(result, Err(RpcError::Disposed)));
    }
}
