//! # Core Framing Components
//!
//! Frame headers, the packet connection, and a `tokio-util` codec.
//!
//! ## Components
//! - **Header**: 4-byte frame header encode/decode and write-buffer helpers
//! - **Connection**: sequenced packet reads and writes over a buffered stream
//! - **Codec**: the same framing for `tokio_util::codec::Framed`
//!
//! ## Wire Format
//! ```text
//! [Length(3, LE)] [Sequence(1)] [Payload(Length)]
//! ```
//!
//! ## Integrity
//! - The sequence byte detects lost, duplicated or interleaved frames
//! - Frames longer than the configured maximum payload are rejected
//! - An optional cap bounds the size of a reassembled packet

pub mod codec;
pub mod connection;
pub mod header;
