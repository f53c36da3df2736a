//! Packet connection over a buffered byte stream.
//!
//! A [`Connection`] owns the stream, a buffered reader sized to amortize the
//! four-byte header reads, and the sequence counter shared by both
//! directions. Logical packets larger than the maximum payload length are
//! split into consecutive full frames followed by one short frame.
//!
//! ## Call discipline
//! A connection has no internal locking. At most one read and one write may
//! be in flight, and because both directions advance the same sequence
//! counter the usual pattern is strict request/response turn-taking. Callers
//! that need deadlines wrap the whole `read_packet` future in
//! `tokio::time::timeout`; a cancelled read leaves the connection unusable.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::core::header::{FrameHeader, HEADER_LEN};
use crate::error::{PacketError, Result};
use crate::utils::metrics::{global_metrics, Metrics, Timer};

/// Framed, sequenced connection over `S`.
pub struct Connection<S> {
    stream: Option<BufReader<S>>,
    sequence: u8,
    config: ConnectionConfig,
    metrics: Arc<Metrics>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream with the default configuration.
    pub fn new(stream: S) -> Self {
        Self::build(stream, ConnectionConfig::default(), global_metrics().clone())
    }

    /// Wrap an established stream, rejecting invalid configuration.
    pub fn with_config(stream: S, config: ConnectionConfig) -> Result<Self> {
        Self::with_config_and_metrics(stream, config, global_metrics().clone())
    }

    /// Like [`Connection::with_config`], recording into `metrics` instead of
    /// the process-wide collector.
    pub fn with_config_and_metrics(
        stream: S,
        config: ConnectionConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(PacketError::ConfigError(errors.join("; ")));
        }
        Ok(Self::build(stream, config, metrics))
    }

    fn build(stream: S, config: ConnectionConfig, metrics: Arc<Metrics>) -> Self {
        metrics.connection_opened();
        Self {
            stream: Some(BufReader::with_capacity(config.read_buffer_size, stream)),
            sequence: 0,
            config,
            metrics,
        }
    }

    /// Sequence number expected on the next frame, in either direction.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Restart frame numbering at zero. No I/O.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Borrow the underlying stream, if still open.
    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref().map(BufReader::get_ref)
    }

    /// Mutably borrow the underlying stream, if still open.
    ///
    /// Reading from it directly skips bytes already held in the read buffer
    /// and desynchronizes the framing.
    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.stream.as_mut().map(BufReader::get_mut)
    }

    /// Read one logical packet into a freshly sized buffer.
    ///
    /// The accumulator starts at `initial_read_capacity`. When its capacity
    /// ends up more than 10% larger than the payload, the payload is copied
    /// into an exactly sized buffer so oversized allocations are not retained.
    pub async fn read_packet(&mut self) -> Result<Vec<u8>> {
        let _timer = Timer::start("read_packet");
        let mut body = Vec::with_capacity(self.config.initial_read_capacity);
        self.read_packet_into(&mut body).await?;

        let length = body.len();
        if body.capacity() > length + length / 10 {
            Ok(body.as_slice().to_vec())
        } else {
            Ok(body)
        }
    }

    /// Read one logical packet frame by frame, streaming each payload into
    /// `sink`. Returns the number of payload bytes written.
    pub async fn read_packet_into<W>(&mut self, sink: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let max = self.config.max_payload_len;
        let mut total = 0usize;
        let mut frames = 0usize;

        loop {
            let reader = self.stream.as_mut().ok_or_else(PacketError::closed)?;

            let mut raw = [0u8; HEADER_LEN];
            if let Err(e) = reader.read_exact(&mut raw).await {
                self.metrics.connection_error();
                return Err(PacketError::BadConnection(e));
            }
            let header = FrameHeader::decode(&raw);

            // Only the first frame must be non-empty; a zero-length frame after
            // full ones terminates an exact-multiple packet.
            let empty_first =
                header.length == 0 && frames == 0 && !self.config.allow_empty_packets;
            if empty_first || header.length > max {
                warn!(length = header.length, max, "Invalid frame length");
                self.metrics.framing_error();
                return Err(PacketError::InvalidLength(header.length));
            }

            if header.sequence != self.sequence {
                warn!(
                    expected = self.sequence,
                    actual = header.sequence,
                    "Frame sequence mismatch"
                );
                self.metrics.sequence_mismatch();
                return Err(PacketError::SequenceMismatch {
                    expected: self.sequence,
                    actual: header.sequence,
                });
            }

            let length = header.length as usize;
            if let Some(limit) = self.config.max_packet_size {
                let size = total.saturating_add(length);
                if size > limit {
                    warn!(size, limit, "Packet exceeds size limit");
                    self.metrics.framing_error();
                    return Err(PacketError::OversizedPacket { size, limit });
                }
            }

            self.sequence = self.sequence.wrapping_add(1);

            let mut payload = (&mut *reader).take(length as u64);
            let copied = match tokio::io::copy_buf(&mut payload, &mut *sink).await {
                Ok(n) => n,
                Err(e) => {
                    self.metrics.connection_error();
                    return Err(PacketError::BadConnection(e));
                }
            };
            if copied != length as u64 {
                self.metrics.connection_error();
                return Err(PacketError::BadConnection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("frame payload truncated at {copied} of {length} bytes"),
                )));
            }

            trace!(length, sequence = header.sequence, "Frame received");
            self.metrics.frame_received(copied);
            total += length;
            frames += 1;

            if header.length < max {
                break;
            }
        }

        if let Err(e) = sink.flush().await {
            self.metrics.connection_error();
            return Err(PacketError::BadConnection(e));
        }

        self.metrics.packet_received();
        debug!(bytes = total, frames, "Packet received");
        Ok(total)
    }

    /// Send one logical packet.
    ///
    /// `packet` must start with [`HEADER_LEN`] reserved bytes followed by the
    /// payload (see [`crate::core::header::packet_buffer`]). Frame headers are
    /// written in place, so on success the same buffer is handed back with
    /// its contents unspecified; it is only good for clearing and reuse.
    pub async fn write_packet(&mut self, mut packet: BytesMut) -> Result<BytesMut> {
        let writer = self.stream.as_mut().ok_or_else(PacketError::closed)?;
        if packet.len() < HEADER_LEN {
            return Err(PacketError::MissingHeaderReserve(packet.len()));
        }

        let _timer = Timer::start("write_packet");
        let max = self.config.max_payload_len as usize;

        let mut length = packet.len() - HEADER_LEN;
        let mut start = 0usize;
        let mut frames = 0usize;

        while length >= max {
            // Overwrites the tail of the frame just sent.
            FrameHeader::new(max as u32, self.sequence).write_into(&mut packet[start..]);
            if let Err(e) = writer.write_all(&packet[start..start + HEADER_LEN + max]).await {
                self.metrics.connection_error();
                return Err(PacketError::BadConnection(e));
            }
            trace!(length = max, sequence = self.sequence, "Frame sent");
            self.metrics.frame_sent(max as u64);

            self.sequence = self.sequence.wrapping_add(1);
            length -= max;
            start += max;
            frames += 1;
        }

        FrameHeader::new(length as u32, self.sequence).write_into(&mut packet[start..]);
        if let Err(e) = writer.write_all(&packet[start..]).await {
            self.metrics.connection_error();
            return Err(PacketError::BadConnection(e));
        }
        if let Err(e) = writer.flush().await {
            self.metrics.connection_error();
            return Err(PacketError::BadConnection(e));
        }
        trace!(length, sequence = self.sequence, "Frame sent");
        self.metrics.frame_sent(length as u64);
        self.sequence = self.sequence.wrapping_add(1);
        frames += 1;

        self.metrics.packet_sent();
        debug!(bytes = packet.len() - HEADER_LEN, frames, "Packet sent");
        Ok(packet)
    }

    /// Reset the sequence and shut down the stream.
    ///
    /// Idempotent: closing an already closed connection succeeds. Any read or
    /// write afterwards fails with `BadConnection`.
    pub async fn close(&mut self) -> Result<()> {
        self.sequence = 0;
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        self.metrics.connection_closed();
        match stream.shutdown().await {
            Ok(()) => {
                debug!("Connection closed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                debug!("Connection closed by peer before shutdown");
                Ok(())
            }
            Err(e) => Err(PacketError::BadConnection(e)),
        }
    }
}
