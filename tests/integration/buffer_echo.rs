//! A method taking and returning a raw byte buffer round-trips via the
//! mixed-argument/out-of-band buffer encoding instead of JSON.

use std::sync::Arc;

use bytes::Bytes;
use eh_test_support::InMemorySocketPair;
use exthost_bridge::prelude::*;
use tokio_util::sync::CancellationToken;

const BLOB: ProxyIdentifier = ProxyIdentifier::new(2, "Blob");

struct BlobActor;
impl LocalActor for BlobActor {
    fn call(&self, method: &str, args: Vec<RpcArg>, _cancel: CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>> {
        let method = method.to_owned();
        Box::pin(async move {
            match method.as_str() {
                "blob" => match args.into_iter().next() {
                    Some(RpcArg::Buffer(b)) => Ok(ReplyValue::Buffer(b)),
                    _ => Err(RpcError::MalformedFrame("blob expects one buffer arg")),
                },
                other => Err(RpcError::NoMatchingMethod { actor: BLOB, method: other.to_owned(), arity: args.len() }),
            }
        })
    }
}

#[tokio::test]
async fn a_buffer_argument_comes_back_byte_for_byte() {
    let (a, b) = InMemorySocketPair::connected();
    let caller = RPCProtocol::new(PersistentProtocol::new(a, false), None);
    let callee = RPCProtocol::new(PersistentProtocol::new(b, false), None);
    callee.register_local(BLOB, Arc::new(BlobActor));

    let proxy = caller.proxy(BLOB);
    let payload = Bytes::from_static(&[0x00, 0xff, 0x42]);
    let result = proxy.call("blob", vec![RpcArg::Buffer(payload.clone())]).await.unwrap();

    match result {
        ReplyValue::Buffer(b) => assert_eq!(b, payload),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn an_empty_buffer_round_trips_too() {
    let (a, b) = InMemorySocketPair::connected();
    let caller = RPCProtocol::new(PersistentProtocol::new(a, false), None);
    let callee = RPCProtocol::new(PersistentProtocol::new(b, false), None);
    callee.register_local(BLOB, Arc::new(BlobActor));

    let proxy = caller.proxy(BLOB);
    let result = proxy.call("blob", vec![RpcArg::Buffer(Bytes::new())]).await.unwrap();
    assert!(matches!(result, ReplyValue::Buffer(b) if b.is_empty()));
}
