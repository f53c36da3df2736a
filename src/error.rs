//! # Error Types
//!
//! Error handling for the packet framing layer.
//!
//! Every failure on a send or receive aborts that call immediately. Nothing is
//! retried at this layer: once a frame transfer fails the stream can no longer
//! be trusted to sit on a frame boundary, so callers should close the
//! connection and reconnect.
//!
//! ## Error Categories
//! - **Connection errors**: short reads, short writes, I/O failures, use after close
//! - **Framing errors**: invalid frame lengths, sequence desynchronization, oversized packets
//! - **Usage errors**: write buffers without a reserved header, invalid configuration
//!
//! ## Example Usage
//! ```rust
//! use packet_conn::error::PacketError;
//! use tracing::error;
//!
//! fn report(err: &PacketError) {
//!     if err.is_fatal() {
//!         error!(error = %err, "Dropping connection");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    pub const ERR_CONNECTION_CLOSED: &str = "Connection already closed";
}

// PacketError is the error type for all framing operations
#[derive(Error, Debug)]
pub enum PacketError {
    /// Short read, short write or any I/O failure while moving a frame.
    #[error("Bad connection: {0}")]
    BadConnection(#[source] io::Error),

    /// A frame header declared a payload length the protocol does not allow here.
    #[error("Invalid payload length {0}")]
    InvalidLength(u32),

    /// The frame's sequence byte differs from the connection's expected value.
    #[error("Invalid sequence {actual} != {expected}")]
    SequenceMismatch { expected: u8, actual: u8 },

    /// The reassembled packet would exceed the configured size cap.
    #[error("Packet too large: {size} bytes (limit {limit})")]
    OversizedPacket { size: usize, limit: usize },

    /// A write buffer did not reserve the leading header bytes.
    #[error("Write buffer of {0} bytes has no room for the frame header")]
    MissingHeaderReserve(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PacketError {
    /// Build a `BadConnection` for an operation on a closed connection.
    pub(crate) fn closed() -> Self {
        PacketError::BadConnection(io::Error::new(
            io::ErrorKind::NotConnected,
            constants::ERR_CONNECTION_CLOSED,
        ))
    }

    /// Whether the connection must be discarded after this error.
    ///
    /// All framing and I/O failures leave the sequence counter and the stream
    /// position unspecified. Only configuration mistakes are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PacketError::ConfigError(_))
    }
}

impl From<io::Error> for PacketError {
    fn from(err: io::Error) -> Self {
        PacketError::BadConnection(err)
    }
}

/// Type alias for Results using PacketError
pub type Result<T> = std::result::Result<T, PacketError>;
