//! Outer wire frame: `type:u8 | id:u32 | ack:u32 | size:u32 | payload`.
//!
//! All integers are big-endian. This is the fixed, shared wire format
//! described by section 3/6 of the protocol spec — it does not evolve.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Length of the fixed outer header, in bytes.
pub const HEADER_LENGTH: usize = 13;

/// Discriminant for the outer frame's `type` field.
///
/// Receivers that encounter an unrecognized byte treat the frame as
/// [`MessageKind::Unknown`] and the caller is expected to drop it and
/// keep parsing subsequent frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    None,
    Regular,
    Control,
    Ack,
    Disconnect,
    ReplayRequest,
    Pause,
    Resume,
    KeepAlive,
    /// Not a real wire type; used internally to mean "drop this frame".
    Unknown(u8),
}

impl MessageKind {
    const NONE: u8 = 0;
    const REGULAR: u8 = 1;
    const CONTROL: u8 = 2;
    const ACK: u8 = 3;
    const DISCONNECT: u8 = 4;
    const REPLAY_REQUEST: u8 = 5;
    const PAUSE: u8 = 6;
    const RESUME: u8 = 7;
    const KEEP_ALIVE: u8 = 8;

    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            MessageKind::None => Self::NONE,
            MessageKind::Regular => Self::REGULAR,
            MessageKind::Control => Self::CONTROL,
            MessageKind::Ack => Self::ACK,
            MessageKind::Disconnect => Self::DISCONNECT,
            MessageKind::ReplayRequest => Self::REPLAY_REQUEST,
            MessageKind::Pause => Self::PAUSE,
            MessageKind::Resume => Self::RESUME,
            MessageKind::KeepAlive => Self::KEEP_ALIVE,
            MessageKind::Unknown(b) => b,
        }
    }

    #[must_use]
    pub fn from_u8(b: u8) -> Self {
        match b {
            Self::NONE => MessageKind::None,
            Self::REGULAR => MessageKind::Regular,
            Self::CONTROL => MessageKind::Control,
            Self::ACK => MessageKind::Ack,
            Self::DISCONNECT => MessageKind::Disconnect,
            Self::REPLAY_REQUEST => MessageKind::ReplayRequest,
            Self::PAUSE => MessageKind::Pause,
            Self::RESUME => MessageKind::Resume,
            Self::KEEP_ALIVE => MessageKind::KeepAlive,
            other => MessageKind::Unknown(other),
        }
    }

    /// Special messages (id=0) bypass the writer's per-id ordering.
    #[must_use]
    pub fn is_special(self) -> bool {
        !matches!(self, MessageKind::Regular)
    }
}

/// A single framed unit on the wire.
///
/// Two messages are equal iff `kind`, `id`, `ack`, and `payload` all
/// match; `written_time` is writer-side bookkeeping, not part of the
/// wire image, and is deliberately excluded from equality.
#[derive(Debug, Clone)]
pub struct ProtocolMessage {
    pub kind: MessageKind,
    pub id: u32,
    pub ack: u32,
    pub payload: Bytes,
    /// Set by the writer right after the frame is handed to the socket;
    /// used for unresponsiveness/timeout accounting only.
    pub written_time: Option<std::time::Instant>,
}

impl PartialEq for ProtocolMessage {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.id == other.id
            && self.ack == other.ack
            && self.payload == other.payload
    }
}

impl ProtocolMessage {
    #[must_use]
    pub fn new(kind: MessageKind, id: u32, ack: u32, payload: Bytes) -> Self {
        Self {
            kind,
            id,
            ack,
            payload,
            written_time: None,
        }
    }

    #[must_use]
    pub fn special(kind: MessageKind, ack: u32) -> Self {
        debug_assert!(kind.is_special());
        Self::new(kind, 0, ack, Bytes::new())
    }

    /// Serialize header + payload into a single contiguous frame.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH + self.payload.len());
        buf.put_u8(self.kind.to_u8());
        buf.put_u32(self.id);
        buf.put_u32(self.ack);
        buf.put_u32(self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// A parsed header, prior to the body being available.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub kind: MessageKind,
    pub id: u32,
    pub ack: u32,
    pub size: u32,
}

/// Decode exactly [`HEADER_LENGTH`] bytes into a [`Header`].
///
/// # Panics
/// Panics if `bytes.len() != HEADER_LENGTH`; callers (the `ChunkStream`
/// state machine) only ever invoke this once that many bytes are
/// available.
#[must_use]
pub fn decode_header(mut bytes: Bytes) -> Header {
    assert_eq!(bytes.len(), HEADER_LENGTH);
    let kind = MessageKind::from_u8(bytes.get_u8());
    let id = bytes.get_u32();
    let ack = bytes.get_u32();
    let size = bytes.get_u32();
    Header { kind, id, ack, size }
}
