use thiserror::Error;

/// Failures specific to adapting a typed service shape onto the uniform
/// `(method, args) -> result` dispatch `eh-rpc` requires (design note
/// 9(a)); wraps straight through to `RpcError` once registered.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("argument {index} for {method:?} could not be decoded as the expected type: {source}")]
    BadArgument {
        method: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{method:?} expected argument {index}, but only {got} were supplied")]
    MissingArgument {
        method: &'static str,
        index: usize,
        got: usize,
    },
}

impl From<ServiceError> for eh_rpc::RpcError {
    fn from(e: ServiceError) -> Self {
        // The core doesn't know this service's internal error variants;
        // it only needs a peer-presentable message, replied as a remote
        // error with a descriptive string.
        eh_rpc::RpcError::Remote {
            name: "Error".to_owned(),
            message: e.to_string(),
        }
    }
}
