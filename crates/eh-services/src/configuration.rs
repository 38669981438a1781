//! Workspace/user configuration lookup. The configuration storage itself
//! is out of scope here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};
use serde_json::Value;

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(8, "configuration");

pub trait ConfigurationShape: Send + Sync {
    fn get(&self, section: String) -> BoxFuture<Result<Value, RpcError>>;
    fn update(&self, section: String, value: Value) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn ConfigurationShape>) -> Arc<dyn LocalActor> {
    let get = shape.clone();
    let update = shape;
    ServiceActorBuilder::new(ID)
        .method("getConfiguration", 1, move |args, _cancel| {
            let get = get.clone();
            async move {
                let section: String = json_arg("getConfiguration", &args, 0)?;
                Ok(ReplyValue::Json(get.get(section).await?))
            }
        })
        .method("updateConfiguration", 2, move |args, _cancel| {
            let update = update.clone();
            async move {
                let section: String = json_arg("updateConfiguration", &args, 0)?;
                let value: Value = json_arg("updateConfiguration", &args, 1)?;
                update.update(section, value).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
