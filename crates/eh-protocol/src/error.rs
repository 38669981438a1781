use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Wire(#[from] eh_wire::WireError),
    #[error("protocol is disposed")]
    Disposed,
}
