//! Terminal emulation and PTY proxying. That functionality is explicitly
//! out of scope here — this is the thin shape the core registers a
//! ProxyIdentifier for, not an implementation.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcArg, RpcError};
use serde::{Deserialize, Serialize};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(1, "terminal");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSpawned {
    pub terminal_id: u32,
}

/// What the host side of a terminal collaborator must answer.
pub trait TerminalShape: Send + Sync {
    fn create(&self, shell_path: Option<String>, cwd: Option<String>) -> BoxFuture<Result<TerminalSpawned, RpcError>>;
    fn write(&self, terminal_id: u32, data: String) -> BoxFuture<Result<(), RpcError>>;
    fn dispose(&self, terminal_id: u32) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn TerminalShape>) -> Arc<dyn LocalActor> {
    let create = shape.clone();
    let write = shape.clone();
    let dispose = shape;
    ServiceActorBuilder::new(ID)
        .method("createTerminal", 2, move |args, _cancel| {
            let create = create.clone();
            async move {
                let shell_path: Option<String> = json_arg("createTerminal", &args, 0)?;
                let cwd: Option<String> = json_arg("createTerminal", &args, 1)?;
                let spawned = create.create(shell_path, cwd).await?;
                Ok(ReplyValue::Json(serde_json::to_value(spawned)?))
            }
        })
        .method("write", 2, move |args, _cancel| {
            let write = write.clone();
            async move {
                let terminal_id: u32 = json_arg("write", &args, 0)?;
                let data: String = json_arg("write", &args, 1)?;
                write.write(terminal_id, data).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .method("dispose", 1, move |args, _cancel| {
            let dispose = dispose.clone();
            async move {
                let terminal_id: u32 = json_arg("dispose", &args, 0)?;
                dispose.dispose(terminal_id).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
