//! Wires a listening socket through the reliability and RPC dispatch
//! layers and registers the collaborator shapes every extension host
//! is expected to call across.

pub mod collaborators;
pub mod config;

use std::sync::Arc;

use eh_protocol::{AlwaysIdleLoadEstimator, LoadEstimator};
use eh_rpc::RPCProtocol;
use eh_wire::DuplexSocket;

use collaborators::NoopCollaborator;

/// Register every collaborator shape against one freshly constructed
/// [`RPCProtocol`]. Called once per accepted session.
pub fn register_collaborators<S, L>(rpc: &Arc<RPCProtocol<S, L>>)
where
    S: DuplexSocket + 'static,
    L: LoadEstimator + 'static,
{
    let shared = Arc::new(NoopCollaborator);
    rpc.register_local(eh_services::terminal::ID, eh_services::terminal::actor(shared.clone()));
    rpc.register_local(eh_services::documents::ID, eh_services::documents::actor(shared.clone()));
    rpc.register_local(eh_services::editors::ID, eh_services::editors::actor(shared.clone()));
    rpc.register_local(eh_services::webviews::ID, eh_services::webviews::actor(shared.clone()));
    rpc.register_local(eh_services::commands::ID, eh_services::commands::actor(shared.clone()));
    rpc.register_local(eh_services::exthost::ID, eh_services::exthost::actor(shared.clone()));
    rpc.register_local(eh_services::storage::ID, eh_services::storage::actor(shared.clone()));
    rpc.register_local(eh_services::configuration::ID, eh_services::configuration::actor(shared.clone()));
    rpc.register_local(eh_services::tasks::ID, eh_services::tasks::actor(shared.clone()));
    rpc.register_local(eh_services::lm_tools::ID, eh_services::lm_tools::actor(shared.clone()));
    rpc.register_local(eh_services::errors::ID, eh_services::errors::actor(shared));
}

/// Construct a fresh [`RPCProtocol`] over `socket` with the default
/// (always-idle) load estimator and every collaborator shape registered.
#[must_use]
pub fn bootstrap_session<S>(socket: Arc<S>, keep_alive_enabled: bool) -> Arc<RPCProtocol<S, AlwaysIdleLoadEstimator>>
where
    S: DuplexSocket + 'static,
{
    let protocol = eh_protocol::PersistentProtocol::new(socket, keep_alive_enabled);
    let rpc = RPCProtocol::new(protocol, None);
    register_collaborators(&rpc);
    rpc
}
