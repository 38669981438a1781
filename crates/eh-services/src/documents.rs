//! Document/text-buffer mirroring. That state mirroring is out of scope
//! here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};
use serde::{Deserialize, Serialize};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(2, "documents");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEdit {
    pub start_offset: u32,
    pub end_offset: u32,
    pub text: String,
}

pub trait DocumentsShape: Send + Sync {
    fn open(&self, uri: String) -> BoxFuture<Result<String, RpcError>>;
    fn apply_edits(&self, uri: String, edits: Vec<TextEdit>) -> BoxFuture<Result<bool, RpcError>>;
}

pub fn actor(shape: Arc<dyn DocumentsShape>) -> Arc<dyn LocalActor> {
    let open = shape.clone();
    let apply = shape;
    ServiceActorBuilder::new(ID)
        .method("openDocument", 1, move |args, _cancel| {
            let open = open.clone();
            async move {
                let uri: String = json_arg("openDocument", &args, 0)?;
                Ok(ReplyValue::Json(serde_json::to_value(open.open(uri).await?)?))
            }
        })
        .method("applyEdits", 2, move |args, _cancel| {
            let apply = apply.clone();
            async move {
                let uri: String = json_arg("applyEdits", &args, 0)?;
                let edits: Vec<TextEdit> = json_arg("applyEdits", &args, 1)?;
                Ok(ReplyValue::Json(serde_json::to_value(apply.apply_edits(uri, edits).await?)?))
            }
        })
        .build()
}
