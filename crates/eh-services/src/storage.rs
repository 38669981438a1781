//! Extension global/workspace key-value storage. The persistence backing
//! store itself is out of scope here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};
use serde_json::Value;

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(7, "storage");

pub trait StorageShape: Send + Sync {
    fn get(&self, extension_id: String, key: String) -> BoxFuture<Result<Option<Value>, RpcError>>;
    fn set(&self, extension_id: String, key: String, value: Value) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn StorageShape>) -> Arc<dyn LocalActor> {
    let get = shape.clone();
    let set = shape;
    ServiceActorBuilder::new(ID)
        .method("getValue", 2, move |args, _cancel| {
            let get = get.clone();
            async move {
                let extension_id: String = json_arg("getValue", &args, 0)?;
                let key: String = json_arg("getValue", &args, 1)?;
                Ok(ReplyValue::Json(serde_json::to_value(
                    get.get(extension_id, key).await?,
                )?))
            }
        })
        .method("setValue", 3, move |args, _cancel| {
            let set = set.clone();
            async move {
                let extension_id: String = json_arg("setValue", &args, 0)?;
                let key: String = json_arg("setValue", &args, 1)?;
                let value: Value = json_arg("setValue", &args, 2)?;
                set.set(extension_id, key, value).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
