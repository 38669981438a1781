//! Active editor/selection mirroring. Editor/document/tab state
//! mirroring itself is out of scope here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};
use serde::{Deserialize, Serialize};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(3, "editors");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub anchor_offset: u32,
    pub active_offset: u32,
}

pub trait EditorsShape: Send + Sync {
    fn reveal_range(&self, uri: String, start_offset: u32, end_offset: u32) -> BoxFuture<Result<(), RpcError>>;
    fn set_selections(&self, uri: String, selections: Vec<Selection>) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn EditorsShape>) -> Arc<dyn LocalActor> {
    let reveal = shape.clone();
    let select = shape;
    ServiceActorBuilder::new(ID)
        .method("revealRange", 3, move |args, _cancel| {
            let reveal = reveal.clone();
            async move {
                let uri: String = json_arg("revealRange", &args, 0)?;
                let start: u32 = json_arg("revealRange", &args, 1)?;
                let end: u32 = json_arg("revealRange", &args, 2)?;
                reveal.reveal_range(uri, start, end).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .method("setSelections", 2, move |args, _cancel| {
            let select = select.clone();
            async move {
                let uri: String = json_arg("setSelections", &args, 0)?;
                let selections: Vec<Selection> = json_arg("setSelections", &args, 1)?;
                select.set_selections(uri, selections).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
