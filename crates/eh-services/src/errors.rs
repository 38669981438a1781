//! Unhandled-exception and crash reporting. Telemetry collection itself
//! is out of scope here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(11, "errors");

pub trait ErrorsShape: Send + Sync {
    fn report(&self, message: String, stack: Option<String>) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn ErrorsShape>) -> Arc<dyn LocalActor> {
    ServiceActorBuilder::new(ID)
        .method("reportUnhandledError", 2, move |args, _cancel| {
            let shape = shape.clone();
            async move {
                let message: String = json_arg("reportUnhandledError", &args, 0)?;
                let stack: Option<String> = json_arg("reportUnhandledError", &args, 1)?;
                shape.report(message, stack).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
