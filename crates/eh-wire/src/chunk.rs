//! Append-only FIFO of byte chunks with a `read(n)` that coalesces
//! across chunk boundaries. The socket may deliver data in arbitrary
//! chunk sizes; nothing above this layer may depend on them.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct ChunkStream {
    chunks: VecDeque<Bytes>,
    byte_length: usize,
}

impl ChunkStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.byte_length += chunk.len();
        self.chunks.push_back(chunk);
    }

    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    #[must_use]
    pub fn has(&self, n: usize) -> bool {
        self.byte_length >= n
    }

    /// Remove and return exactly `n` bytes, coalescing across chunks.
    ///
    /// Returns `None` if fewer than `n` bytes are buffered; the stream
    /// is left untouched in that case.
    pub fn read(&mut self, n: usize) -> Option<Bytes> {
        if !self.has(n) {
            return None;
        }
        // Fast path: the whole read is satisfied by (a prefix of) the
        // front chunk, the overwhelmingly common case for a live socket.
        if let Some(front) = self.chunks.front() {
            if front.len() == n {
                self.byte_length -= n;
                return self.chunks.pop_front();
            }
            if front.len() > n {
                let front = self.chunks.front_mut().unwrap();
                let taken = front.split_to(n);
                self.byte_length -= n;
                return Some(taken);
            }
        }

        let mut out = BytesMut::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let front = self.chunks.front_mut().expect("has(n) guarantees enough data");
            if front.len() <= remaining {
                remaining -= front.len();
                let piece = self.chunks.pop_front().unwrap();
                out.extend_from_slice(&piece);
            } else {
                let piece = front.split_to(remaining);
                out.extend_from_slice(&piece);
                remaining = 0;
            }
        }
        self.byte_length -= n;
        Some(out.freeze())
    }
}
