//! Frame header layout.
//!
//! ```text
//! [Length(3, little-endian)] [Sequence(1)] [Payload(Length)]
//! ```
//!
//! A frame whose length equals the connection's maximum payload length means
//! the logical packet continues in the next frame. A shorter frame, including
//! a zero-length one, ends the packet.

use bytes::{BufMut, BytesMut};

/// Size of a frame header on the wire
pub const HEADER_LEN: usize = 4;

/// Largest payload the 24-bit length field can describe
pub const MAX_PAYLOAD_LEN: u32 = 0x00FF_FFFF;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub sequence: u8,
}

impl FrameHeader {
    pub fn new(length: u32, sequence: u8) -> Self {
        debug_assert!(length <= MAX_PAYLOAD_LEN);
        Self { length, sequence }
    }

    /// Decode the four header bytes.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            length: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]),
            sequence: bytes[3],
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        self.write_into(&mut out);
        out
    }

    /// Write the header over the first four bytes of `dst`.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than [`HEADER_LEN`].
    pub fn write_into(&self, dst: &mut [u8]) {
        let len = self.length.to_le_bytes();
        dst[..3].copy_from_slice(&len[..3]);
        dst[3] = self.sequence;
    }
}

/// Allocate a write buffer with the header bytes reserved and room for
/// `payload_capacity` bytes of payload after them.
pub fn reserve_header(payload_capacity: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload_capacity);
    buf.put_bytes(0, HEADER_LEN);
    buf
}

/// Copy `payload` into a fresh write buffer that reserves the header bytes.
pub fn packet_buffer(payload: &[u8]) -> BytesMut {
    let mut buf = reserve_header(payload.len());
    buf.extend_from_slice(payload);
    buf
}
