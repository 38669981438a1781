//! Build/test task execution. The task runner itself is out of scope
//! here; this is the registered shape only.

use std::sync::Arc;

use eh_rpc::{BoxFuture, LocalActor, ProxyIdentifier, ReplyValue, RpcError};

use crate::registry::{ServiceActorBuilder, json_arg};

pub const ID: ProxyIdentifier = ProxyIdentifier::new(9, "tasks");

pub struct TaskStarted {
    pub task_id: u32,
}

pub trait TasksShape: Send + Sync {
    fn run(&self, task_name: String) -> BoxFuture<Result<TaskStarted, RpcError>>;
    fn terminate(&self, task_id: u32) -> BoxFuture<Result<(), RpcError>>;
}

pub fn actor(shape: Arc<dyn TasksShape>) -> Arc<dyn LocalActor> {
    let run = shape.clone();
    let terminate = shape;
    ServiceActorBuilder::new(ID)
        .method("runTask", 1, move |args, _cancel| {
            let run = run.clone();
            async move {
                let task_name: String = json_arg("runTask", &args, 0)?;
                let started = run.run(task_name).await?;
                Ok(ReplyValue::Json(serde_json::json!({ "taskId": started.task_id })))
            }
        })
        .method("terminateTask", 1, move |args, _cancel| {
            let terminate = terminate.clone();
            async move {
                let task_id: u32 = json_arg("terminateTask", &args, 0)?;
                terminate.terminate(task_id).await?;
                Ok(ReplyValue::Empty)
            }
        })
        .build()
}
