//! Command palette / context-menu command registration and invocation.
//! UI integration itself is out of scope here; this is the registered
//! shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};
use serde_json::Value;

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(5, "commands");

pub trait CommandsShape: Send + Sync {
    fn register(&self, command_id: String, title: String) -> BoxFuture<Result<(), RpcError>>;
    fn execute(&self, command_id: String, args: Vec<Value>) -> BoxFuture<Result<Value, RpcError>>;
}

pub fn actor(shape: Arc<dyn CommandsShape>) -> Arc<dyn LocalActor> {
    let register = shape.clone();
    let execute = shape;
    ServiceActorBuilder::new(ID)
        .method("registerCommand", 2, move |args, _cancel| {
            let register = register.clone();
            async move {
                let command_id: String = json_arg("registerCommand", &args, 0)?;
                let title: String = json_arg("registerCommand", &args, 1)?;
                register.register(command_id, title).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .method("executeCommand", 2, move |args, _cancel| {
            let execute = execute.clone();
            async move {
                let command_id: String = json_arg("executeCommand", &args, 0)?;
                let call_args: Vec<Value> = json_arg("executeCommand", &args, 1)?;
                Ok(ReplyValue::Json(execute.execute(command_id, call_args).await?))
            }
        })
        .build()
}
