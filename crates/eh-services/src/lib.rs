//! Typed shapes for the collaborator services registered on top of the
//! RPC dispatch layer: terminal, documents, editors, webviews, commands,
//! extension-host lifecycle, storage, configuration, tasks, language-model
//! tools, and error reporting. Each module is a thin `LocalActor` built
//! from a small, fixed method table — none implement their collaborator's
//! actual behavior, which is explicitly out of scope; they exist so the
//! RPC layer has something concrete to dispatch to in tests and in the
//! host binary.

pub mod commands;
pub mod configuration;
pub mod documents;
pub mod editors;
pub mod error;
pub mod errors;
pub mod exthost;
pub mod lm_tools;
pub mod registry;
pub mod storage;
pub mod tasks;
pub mod terminal;
pub mod webviews;

pub use error::ServiceError;
pub use registry::{ServiceActor, ServiceActorBuilder, json_arg};
