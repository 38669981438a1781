use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Protocol(#[from] eh_protocol::ProtocolError),
    #[error("inner RPC frame is truncated")]
    Truncated,
    #[error("malformed RPC frame: {0}")]
    MalformedFrame(&'static str),
    #[error("no actor registered for proxy {0:?}")]
    MissingActor(crate::ids::ProxyIdentifier),
    #[error("no method on {actor:?} matches {method:?} with {arity} argument(s)")]
    NoMatchingMethod {
        actor: crate::ids::ProxyIdentifier,
        method: String,
        arity: usize,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("request was canceled")]
    Canceled,
    #[error("remote call failed: {name}: {message}")]
    Remote { name: String, message: String },
    #[error("rpc protocol is disposed")]
    Disposed,
}
