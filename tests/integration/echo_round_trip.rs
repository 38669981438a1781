//! A local service registered on one side answers a call placed through
//! the peer's proxy, with a plain JSON argument and result.

use std::sync::Arc;

use eh_test_support::InMemorySocketPair;
use exthost_bridge::prelude::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const ECHO: ProxyIdentifier = ProxyIdentifier::new(1, "Echo");

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
                other => Err(RpcError::NoMatchingMethod { actor: ECHO, method: other.to_owned(), arity: args.len() }),
            }
        })
    }
}

#[tokio::test]
async fn caller_proxy_receives_the_calleds_echo() {
    let (a, b) = InMemorySocketPair::connected();
    let caller = RPCProtocol::new(PersistentProtocol::new(a, false), None);
    let callee = RPCProtocol::new(PersistentProtocol::new(b, false), None);
    callee.register_local(ECHO, Arc::new(Echo));

    let proxy = caller.proxy(ECHO);
    let result = proxy.call("echo", vec![RpcArg::Value(json!("hello"))]).await.unwrap();

    match result {
        ReplyValue::Json(v) => assert_eq!(v, json!("hello")),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn a_second_concurrent_call_gets_its_own_reply() {
    let (a, b) = InMemorySocketPair::connected();
    let caller = RPCProtocol::new(PersistentProtocol::new(a, false), None);
    let callee = RPCProtocol::new(PersistentProtocol::new(b, false), None);
    callee.register_local(ECHO, Arc::new(Echo));

    let proxy_a = caller.proxy(ECHO);
    let proxy_b = caller.proxy(ECHO);
    let (first, second) = tokio::join!(
        proxy_a.call("echo", vec![RpcArg::Value(json!("one"))]),
        proxy_b.call("echo", vec![RpcArg::Value(json!("two"))]),
    );
    assert!(matches!(first.unwrap(), ReplyValue::Json(v) if v == json!("one")));
    assert!(matches!(second.unwrap(), ReplyValue::Json(v) if v == json!("two")));
}
