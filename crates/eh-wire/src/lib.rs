//! L0/L1 of the extension host bridge: a duplex socket abstraction and
//! the fixed-header framing protocol layered on top of it.
//!
//! [`DuplexSocket`] covers the byte-level transport; [`ProtocolReader`]
//! and [`ProtocolWriter`] turn it into a framed, ordered message stream
//! that the reliability layer above builds on.

mod chunk;
mod error;
mod message;
mod reader;
mod socket;
mod writer;

pub use chunk::ChunkStream;
pub use error::WireError;
pub use message::{HEADER_LENGTH, Header, MessageKind, ProtocolMessage, decode_header};
pub use reader::ProtocolReader;
pub use socket::{CloseReason, DuplexSocket, SocketEvent, TcpSocket, UnixSocket};
pub use writer::ProtocolWriter;
