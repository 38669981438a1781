//! Big-endian, length-prefixed primitives used to build the inner RPC
//! frame carried inside an [`eh_protocol::PersistentProtocol`]'s
//! `Regular` message payload. This is a second, independent framing
//! layer from `eh-wire`'s outer header: the outer header's `id`/`ack`
//! never appear here.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::RpcError;

/// An append-only writer for the inner RPC frame format.
#[derive(Default)]
pub struct MessageBufferWriter {
    buf: BytesMut,
}

impl MessageBufferWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    /// A string whose UTF-8 byte length fits in a `u8` (method names,
    /// error class names — short, bounded identifiers).
    pub fn write_short_string(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        debug_assert!(bytes.len() <= u8::MAX as usize, "short string exceeds 255 bytes");
        self.buf.put_u8(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// A string whose UTF-8 byte length needs the full `u32` range
    /// (JSON argument/result payloads).
    pub fn write_long_string(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        self.buf.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_buffer(&mut self, value: &[u8]) -> &mut Self {
        self.buf.put_u32(value.len() as u32);
        self.buf.extend_from_slice(value);
        self
    }

    #[must_use]
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// A cursor over the inner RPC frame format, used for decoding.
pub struct MessageBufferReader {
    buf: Bytes,
}

impl MessageBufferReader {
    #[must_use]
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> Result<(), RpcError> {
        if self.buf.remaining() < n {
            return Err(RpcError::Truncated);
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, RpcError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u32(&mut self) -> Result<u32, RpcError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_short_string(&mut self) -> Result<String, RpcError> {
        let len = self.read_u8()? as usize;
        self.read_utf8(len)
    }

    pub fn read_long_string(&mut self) -> Result<String, RpcError> {
        let len = self.read_u32()? as usize;
        self.read_utf8(len)
    }

    pub fn read_buffer(&mut self) -> Result<Bytes, RpcError> {
        let len = self.read_u32()? as usize;
        self.need(len)?;
        Ok(self.buf.copy_to_bytes(len))
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, RpcError> {
        self.need(len)?;
        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| RpcError::MalformedFrame("invalid utf-8"))
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_primitive() {
        let mut w = MessageBufferWriter::new();
        w.write_u8(7)
            .write_u32(0xdead_beef)
            .write_short_string("ping")
            .write_long_string("a longer payload")
            .write_buffer(&[1, 2, 3, 4]);
        let mut r = MessageBufferReader::new(w.finish());

        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.read_short_string().unwrap(), "ping");
        assert_eq!(r.read_long_string().unwrap(), "a longer payload");
        assert_eq!(&r.read_buffer().unwrap()[..], &[1, 2, 3, 4]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reading_past_the_end_is_truncated_not_a_panic() {
        let mut r = MessageBufferReader::new(Bytes::new());
        assert!(matches!(r.read_u8(), Err(RpcError::Truncated)));
    }
}
