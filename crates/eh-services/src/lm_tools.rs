//! Language-model tool invocation. Actually executing a model tool is
//! out of scope here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};
use serde_json::Value;

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(10, "languageModelTools");

pub trait LmToolsShape: Send + Sync {
    fn invoke(&self, tool_name: String, input: Value) -> BoxFuture<Result<Value, RpcError>>;
}

pub fn actor(shape: Arc<dyn LmToolsShape>) -> Arc<dyn LocalActor> {
    ServiceActorBuilder::new(ID)
        .method("invokeTool", 2, move |args, _cancel| {
            let shape = shape.clone();
            async move {
                let tool_name: String = json_arg("invokeTool", &args, 0)?;
                let input: Value = json_arg("invokeTool", &args, 1)?;
                Ok(ReplyValue::Json(shape.invoke(tool_name, input).await?))
            }
        })
        .build()
}
