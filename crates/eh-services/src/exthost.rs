//! Extension-host child-process lifecycle. The supervisor itself is out
//! of scope here; this is the registered shape the core uses to report
//! readiness and receive teardown requests.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(6, "extensionHost");

pub trait ExtensionHostShape: Send + Sync {
    fn ready(&self, extensions: Vec<String>) -> BoxFuture<Result<(), RpcError>>;
    fn request_termination(&self, reason: String) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn ExtensionHostShape>) -> Arc<dyn LocalActor> {
    let ready = shape.clone();
    let terminate = shape;
    ServiceActorBuilder::new(ID)
        .method("ready", 1, move |args, _cancel| {
            let ready = ready.clone();
            async move {
                let extensions: Vec<String> = json_arg("ready", &args, 0)?;
                ready.ready(extensions).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .method("requestTermination", 1, move |args, _cancel| {
            let terminate = terminate.clone();
            async move {
                let reason: String = json_arg("requestTermination", &args, 0)?;
                terminate.request_termination(reason).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
