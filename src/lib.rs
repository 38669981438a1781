//! Top-level facade for the extension host bridge workspace.
//!
//! The actual layers live in their own crates (`eh-wire`, `eh-protocol`,
//! `eh-rpc`, `eh-services`); this crate exists to host the cross-crate
//! scenario tests under `tests/integration/` and to re-export a
//! convenient prelude for embedders.

pub mod prelude {
    pub use eh_protocol::{AlwaysIdleLoadEstimator, LoadEstimator, PersistentProtocol, ProtocolEvent};
    pub use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, RPCProtocol, ReplyValue, ResponsiveState, RpcArg, RpcError};
    pub use eh_wire::{DuplexSocket, MessageKind, ProtocolMessage, ProtocolReader, ProtocolWriter};
}
