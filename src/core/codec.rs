//! `tokio-util` codec for the same framing.
//!
//! [`PacketCodec`] lets callers drive a stream through `Framed` instead of a
//! [`Connection`](crate::core::connection::Connection). Decoding consumes whole
//! frames only, so the sequence counter never moves for a frame that is still
//! arriving. A single-frame packet is handed out as a zero-copy split of the
//! read buffer; multi-frame packets are gathered in a reassembly buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::config::ConnectionConfig;
use crate::core::header::{FrameHeader, HEADER_LEN, MAX_PAYLOAD_LEN};
use crate::error::{PacketError, Result};

#[derive(Debug)]
pub struct PacketCodec {
    sequence: u8,
    max_payload_len: u32,
    max_packet_size: Option<usize>,
    allow_empty_packets: bool,
    pending: BytesMut,
    frames: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self {
            sequence: 0,
            max_payload_len: MAX_PAYLOAD_LEN,
            max_packet_size: None,
            allow_empty_packets: false,
            pending: BytesMut::new(),
            frames: 0,
        }
    }
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a codec with the framing limits of `config`.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(PacketError::ConfigError(errors.join("; ")));
        }
        Ok(Self {
            max_payload_len: config.max_payload_len,
            max_packet_size: config.max_packet_size,
            allow_empty_packets: config.allow_empty_packets,
            ..Self::default()
        })
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Restart numbering and drop any partially reassembled packet.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
        self.pending.clear();
        self.frames = 0;
    }

    fn check_header(&self, header: FrameHeader) -> Result<()> {
        let empty_first = header.length == 0 && self.frames == 0 && !self.allow_empty_packets;
        if empty_first || header.length > self.max_payload_len {
            warn!(length = header.length, "Invalid frame length");
            return Err(PacketError::InvalidLength(header.length));
        }

        if header.sequence != self.sequence {
            warn!(
                expected = self.sequence,
                actual = header.sequence,
                "Frame sequence mismatch"
            );
            return Err(PacketError::SequenceMismatch {
                expected: self.sequence,
                actual: header.sequence,
            });
        }

        if let Some(limit) = self.max_packet_size {
            let size = self.pending.len().saturating_add(header.length as usize);
            if size > limit {
                return Err(PacketError::OversizedPacket { size, limit });
            }
        }
        Ok(())
    }
}

impl Decoder for PacketCodec {
    type Item = BytesMut;
    type Error = PacketError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            if src.len() < HEADER_LEN {
                src.reserve(HEADER_LEN - src.len());
                return Ok(None);
            }

            let header = FrameHeader::decode(&[src[0], src[1], src[2], src[3]]);
            self.check_header(header)?;

            let frame_len = HEADER_LEN + header.length as usize;
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            src.advance(HEADER_LEN);
            let payload = src.split_to(header.length as usize);
            trace!(length = header.length, sequence = header.sequence, "Frame decoded");
            self.sequence = self.sequence.wrapping_add(1);
            self.frames += 1;

            if header.length < self.max_payload_len {
                self.frames = 0;
                if self.pending.is_empty() {
                    return Ok(Some(payload));
                }
                self.pending.extend_from_slice(&payload);
                return Ok(Some(self.pending.split()));
            }

            self.pending.extend_from_slice(&payload);
        }
    }
}

impl<'a> Encoder<&'a [u8]> for PacketCodec {
    type Error = PacketError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<()> {
        let max = self.max_payload_len as usize;
        let frames = item.len() / max + 1;
        dst.reserve(item.len() + frames * HEADER_LEN);

        let mut rest = item;
        while rest.len() >= max {
            dst.put_slice(&FrameHeader::new(self.max_payload_len, self.sequence).encode());
            dst.put_slice(&rest[..max]);
            self.sequence = self.sequence.wrapping_add(1);
            rest = &rest[max..];
        }

        dst.put_slice(&FrameHeader::new(rest.len() as u32, self.sequence).encode());
        dst.put_slice(rest);
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }
}

impl Encoder<Bytes> for PacketCodec {
    type Error = PacketError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&[u8]>::encode(self, &item[..], dst)
    }
}
