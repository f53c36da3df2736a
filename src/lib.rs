//! # packet-conn
//!
//! Packet framing layer for client/server wire protocols that carry
//! arbitrarily large messages over a byte stream.
//!
//! Each logical packet travels as one or more frames. A frame is a 4-byte
//! header (24-bit little-endian payload length, 8-bit sequence number)
//! followed by the payload. A frame carrying exactly the maximum payload
//! length means more frames follow; a shorter one, possibly empty, ends the
//! packet. Both peers advance a shared sequence counter once per frame, which
//! exposes lost or misrouted frames as a [`PacketError::SequenceMismatch`].
//!
//! ## Example
//! ```rust,no_run
//! use packet_conn::{packet_buffer, Connection};
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> packet_conn::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:3306").await?;
//! let mut conn = Connection::new(stream);
//!
//! let greeting = conn.read_packet().await?;
//! conn.write_packet(packet_buffer(&greeting)).await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod utils;

pub use crate::config::{ConnectionConfig, FramingConfig};
pub use crate::core::codec::PacketCodec;
pub use crate::core::connection::Connection;
pub use crate::core::header::{
    packet_buffer, reserve_header, FrameHeader, HEADER_LEN, MAX_PAYLOAD_LEN,
};
pub use crate::error::{PacketError, Result};
