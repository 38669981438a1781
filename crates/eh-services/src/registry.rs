//! Adapts a typed service trait onto `eh_rpc::LocalActor`'s uniform
//! `(method, args) -> result` dispatch entry point, favoring uniform
//! dispatch over code-generated stubs.
//!
//! Resolution is by `(method name, arity)`: each service shape here has a
//! small, fixed set of methods known entirely at registration time, so
//! two methods of the same name never share an arity in practice — a
//! numeric-widening/null-matches-optional tiebreak never has more than
//! one candidate to choose between for this core's own collaborator
//! shapes, and is therefore not implemented as a separate ranking pass
//! (recorded in DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcArg, RpcError};
use tokio_util::sync::CancellationToken;

type Handler = Box<dyn Fn(Vec<RpcArg>, CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>> + Send + Sync>;

/// A `LocalActor` built from a fixed table of `(name, arity) -> handler`
/// entries, registered once at construction and never mutated.
pub struct ServiceActor {
    id: ProxyIdentifier,
    methods: HashMap<(&'static str, usize), Handler>,
}

impl LocalActor for ServiceActor {
    fn call(&self, method: &str, args: Vec<RpcArg>, cancel: CancellationToken) -> BoxFuture<Result<ReplyValue, RpcError>> {
        let arity = args.len();
        let Some((&(name, _), handler)) = self
            .methods
            .iter()
            .find(|((name, declared_arity), _)| *name == method && *declared_arity == arity)
        else {
            let id = self.id;
            let method = method.to_owned();
            return Box::pin(async move { Err(RpcError::NoMatchingMethod { actor: id, method, arity }) });
        };
        tracing::trace!(actor = %self.id, method = name, arity, "dispatching service call");
        handler(args, cancel)
    }
}

/// Builds a [`ServiceActor`] for one [`ProxyIdentifier`].
pub struct ServiceActorBuilder {
    id: ProxyIdentifier,
    methods: HashMap<(&'static str, usize), Handler>,
}

impl ServiceActorBuilder {
    #[must_use]
    pub fn new(id: ProxyIdentifier) -> Self {
        Self { id, methods: HashMap::new() }
    }

    /// Register `name` for calls carrying exactly `arity` arguments.
    #[must_use]
    pub fn method<F, Fut>(mut self, name: &'static str, arity: usize, handler: F) -> Self
    where
        F: Fn(Vec<RpcArg>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<ReplyValue, RpcError>> + Send + 'static,
    {
        self.methods.insert((name, arity), Box::new(move |args, cancel| Box::pin(handler(args, cancel))));
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<ServiceActor> {
        Arc::new(ServiceActor { id: self.id, methods: self.methods })
    }
}

/// Decode the JSON argument at `index` as `T`, folding a missing-argument
/// or a type-mismatch into a [`RpcError`] the peer can see.
pub fn json_arg<T: serde::de::DeserializeOwned>(method: &'static str, args: &[RpcArg], index: usize) -> Result<T, RpcError> {
    let Some(arg) = args.get(index) else {
        return Err(crate::error::ServiceError::MissingArgument { method, index, got: args.len() }.into());
    };
    let value = match arg {
        RpcArg::Value(v) => v.clone(),
        RpcArg::Undefined => serde_json::Value::Null,
        RpcArg::Buffer(_) | RpcArg::WithBuffers(_) => {
            return Err(eh_rpc::RpcError::MalformedFrame("expected a JSON argument, got a buffer-bearing one"));
        }
    };
    serde_json::from_value(value).map_err(|source| crate::error::ServiceError::BadArgument { method, index, source }.into())
}
