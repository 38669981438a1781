//! No-op implementations of every registered collaborator shape.
//!
//! None of the collaborators themselves (terminal emulation, document
//! mirroring, webview hosting, ...) are this core's concern; it only
//! owns the wire protocol and RPC dispatch that would carry their
//! traffic. Registering these stand-ins means an extension host that
//! calls across before a real collaborator is wired up gets a
//! descriptive remote error instead of silence.

use eh_rpc::{BoxFuture, RpcError};
use eh_services::commands::CommandsShape;
use eh_services::configuration::ConfigurationShape;
use eh_services::documents::{DocumentsShape, TextEdit};
use eh_services::editors::{EditorsShape, Selection};
use eh_services::errors::ErrorsShape;
use eh_services::exthost::ExtensionHostShape;
use eh_services::lm_tools::LmToolsShape;
use eh_services::storage::StorageShape;
use eh_services::tasks::{TasksShape, TaskStarted};
use eh_services::terminal::{TerminalShape, TerminalSpawned};
use eh_services::webviews::WebviewsShape;
use serde_json::Value;

fn unimplemented<T>(method: &str) -> Result<T, RpcError> {
    tracing::debug!(method, "collaborator call has no backing implementation");
    Err(RpcError::Remote {
        name: "NotImplemented".to_owned(),
        message: format!("{method} is not implemented by this host"),
    })
}

pub struct NoopCollaborator;

impl TerminalShape for NoopCollaborator {
    fn create(&self, _shell_path: Option<String>, _cwd: Option<String>) -> BoxFuture<Result<TerminalSpawned, RpcError>> {
        Box::pin(async { unimplemented("createTerminal") })
    }
    fn write(&self, _terminal_id: u32, _data: String) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("write") })
    }
    fn dispose(&self, _terminal_id: u32) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("dispose") })
    }
}

impl DocumentsShape for NoopCollaborator {
    fn open(&self, _uri: String) -> BoxFuture<Result<String, RpcError>> {
        Box::pin(async { unimplemented("openDocument") })
    }
    fn apply_edits(&self, _uri: String, _edits: Vec<TextEdit>) -> BoxFuture<Result<bool, RpcError>> {
        Box::pin(async { unimplemented("applyEdits") })
    }
}

impl EditorsShape for NoopCollaborator {
    fn reveal_range(&self, _uri: String, _start_offset: u32, _end_offset: u32) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("revealRange") })
    }
    fn set_selections(&self, _uri: String, _selections: Vec<Selection>) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("setSelections") })
    }
}

impl WebviewsShape for NoopCollaborator {
    fn set_html(&self, _panel_id: String, _html: String) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("setHtml") })
    }
    fn post_message(&self, _panel_id: String, _payload: bytes::Bytes) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("postMessage") })
    }
}

impl CommandsShape for NoopCollaborator {
    fn register(&self, _command_id: String, _title: String) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("registerCommand") })
    }
    fn execute(&self, _command_id: String, _args: Vec<Value>) -> BoxFuture<Result<Value, RpcError>> {
        Box::pin(async { unimplemented("executeCommand") })
    }
}

impl ExtensionHostShape for NoopCollaborator {
    fn ready(&self, extensions: Vec<String>) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async move {
            tracing::info!(count = extensions.len(), "extension host reported ready");
            Ok(())
        })
    }
    fn request_termination(&self, reason: String) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async move {
            tracing::info!(reason, "extension host requested termination");
            Ok(())
        })
    }
}

impl StorageShape for NoopCollaborator {
    fn get(&self, _extension_id: String, _key: String) -> BoxFuture<Result<Option<Value>, RpcError>> {
        Box::pin(async { unimplemented("getValue") })
    }
    fn set(&self, _extension_id: String, _key: String, _value: Value) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("setValue") })
    }
}

impl ConfigurationShape for NoopCollaborator {
    fn get(&self, _section: String) -> BoxFuture<Result<Value, RpcError>> {
        Box::pin(async { unimplemented("getConfiguration") })
    }
    fn update(&self, _section: String, _value: Value) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("updateConfiguration") })
    }
}

impl TasksShape for NoopCollaborator {
    fn run(&self, _task_name: String) -> BoxFuture<Result<TaskStarted, RpcError>> {
        Box::pin(async { unimplemented("runTask") })
    }
    fn terminate(&self, _task_id: u32) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async { unimplemented("terminateTask") })
    }
}

impl LmToolsShape for NoopCollaborator {
    fn invoke(&self, _tool_name: String, _input: Value) -> BoxFuture<Result<Value, RpcError>> {
        Box::pin(async { unimplemented("invokeTool") })
    }
}

impl ErrorsShape for NoopCollaborator {
    fn report(&self, message: String, stack: Option<String>) -> BoxFuture<Result<(), RpcError>> {
        Box::pin(async move {
            tracing::warn!(message, stack, "unhandled error reported by extension host");
            Ok(())
        })
    }
}
