//! RPC dispatch on top of `eh-protocol`'s reliable messaging. Typed
//! proxy identifiers, per-call pending replies, the mixed JSON/buffer
//! argument codec with out-of-band buffers and the URI-transform hook,
//! and cooperative request cancellation with its own 3s responsiveness
//! threshold.

mod args;
mod buffer;
mod error;
mod ids;
mod pending;
mod responsive;
mod rpc;
mod wire;

pub use args::{BufferValue, RemoteError, ReplyValue, RpcArg, UriTransform, is_uri_key, requires_mixed_encoding};
pub use error::RpcError;
pub use ids::ProxyIdentifier;
pub use responsive::ResponsiveState;
pub use rpc::{BoxFuture, LocalActor, RPCProtocol, RpcProxy};
