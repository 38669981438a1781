//! WebView hosting. Actually hosting a webview is out of scope here;
//! this is the registered shape only.

use std::sync::Arc;

use bytes::Bytes;
use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcArg, RpcError};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(4, "webviews");

pub trait WebviewsShape: Send + Sync {
    fn set_html(&self, panel_id: String, html: String) -> BoxFuture<Result<(), RpcError>>;
    fn post_message(&self, panel_id: String, payload: Bytes) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn WebviewsShape>) -> Arc<dyn LocalActor> {
    let html = shape.clone();
    let post = shape;
    ServiceActorBuilder::new(ID)
        .method("setHtml", 2, move |args, _cancel| {
            let html = html.clone();
            async move {
                let panel_id: String = json_arg("setHtml", &args, 0)?;
                let markup: String = json_arg("setHtml", &args, 1)?;
                html.set_html(panel_id, markup).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .method("postMessage", 2, move |args, _cancel| {
            let post = post.clone();
            async move {
                let panel_id: String = json_arg("postMessage", &args, 0)?;
                let payload = match args.into_iter().nth(1) {
                    Some(RpcArg::Buffer(b)) => b,
                    _ => return Err(RpcError::MalformedFrame("postMessage expects a buffer payload")),
                };
                post.post_message(panel_id, payload).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
