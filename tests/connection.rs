//! Integration tests for packet connections over in-memory duplex streams.
//!
//! Most tests scale frames down to 16 bytes so multi-frame packets stay
//! small; one round trip runs at the full 24-bit frame size.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use bytes::BytesMut;
use packet_conn::utils::metrics::Metrics;
use packet_conn::{
    packet_buffer, Connection, ConnectionConfig, PacketError, HEADER_LEN, MAX_PAYLOAD_LEN,
};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

const SMALL_MAX: u32 = 16;

fn small_config() -> ConnectionConfig {
    ConnectionConfig {
        max_payload_len: SMALL_MAX,
        ..ConnectionConfig::default()
    }
}

fn connection(stream: DuplexStream, config: ConnectionConfig) -> Connection<DuplexStream> {
    Connection::with_config_and_metrics(stream, config, Arc::new(Metrics::new()))
        .expect("valid config")
}

/// Connection on one end, the raw stream on the other.
fn raw_pair(config: ConnectionConfig) -> (Connection<DuplexStream>, DuplexStream) {
    let (a, b) = duplex(64 * 1024);
    (connection(a, config), b)
}

fn conn_pair(config: ConnectionConfig) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    let (a, b) = duplex(64 * 1024);
    (connection(a, config.clone()), connection(b, config))
}

/// Split raw wire bytes into (length, sequence) headers.
fn frame_headers(mut wire: &[u8]) -> Vec<(u32, u8)> {
    let mut headers = Vec::new();
    while !wire.is_empty() {
        let length = u32::from_le_bytes([wire[0], wire[1], wire[2], 0]);
        headers.push((length, wire[3]));
        wire = &wire[HEADER_LEN + length as usize..];
    }
    headers
}

// ============================================================================
// ROUND TRIPS AND FRAME LAYOUT
// ============================================================================

#[tokio::test]
async fn test_roundtrip_across_frame_boundaries() {
    let config = ConnectionConfig {
        allow_empty_packets: true,
        ..small_config()
    };
    let (mut tx, mut rx) = conn_pair(config);

    for size in [0usize, 1, 15, 16, 17, 31, 32, 33, 48, 80] {
        let payload: Vec<u8> = (0..size).map(|i| (i * 7 + size) as u8).collect();
        tx.write_packet(packet_buffer(&payload)).await.unwrap();
        let body = rx.read_packet().await.unwrap();
        assert_eq!(body, payload, "payload of {size} bytes");
        assert_eq!(tx.sequence(), rx.sequence());
    }
}

#[tokio::test]
async fn test_three_frame_wire_layout() {
    let (mut tx, mut raw) = raw_pair(small_config());
    let payload: Vec<u8> = (0x01..=0x23).collect();

    tx.write_packet(packet_buffer(&payload)).await.unwrap();

    let mut wire = vec![0u8; payload.len() + 3 * HEADER_LEN];
    raw.read_exact(&mut wire).await.unwrap();
    assert_eq!(frame_headers(&wire), vec![(16, 0), (16, 1), (3, 2)]);
    assert_eq!(&wire[4..20], &payload[..16]);
    assert_eq!(&wire[24..40], &payload[16..32]);
    assert_eq!(&wire[44..], &payload[32..]);
    assert_eq!(tx.sequence(), 3);

    // Feed the same bytes to a fresh connection.
    let (mut rx, mut feeder) = raw_pair(small_config());
    feeder.write_all(&wire).await.unwrap();
    assert_eq!(rx.read_packet().await.unwrap(), payload);
    assert_eq!(rx.sequence(), 3);
}

#[tokio::test]
async fn test_exact_multiple_ends_with_empty_frame() {
    let (mut tx, mut raw) = raw_pair(small_config());

    tx.write_packet(packet_buffer(&[0x5A; 48])).await.unwrap();

    let mut wire = vec![0u8; 48 + 4 * HEADER_LEN];
    raw.read_exact(&mut wire).await.unwrap();
    assert_eq!(
        frame_headers(&wire),
        vec![(16, 0), (16, 1), (16, 2), (0, 3)]
    );
}

#[tokio::test]
async fn test_empty_terminator_accepted_on_read() {
    let (mut rx, mut raw) = raw_pair(small_config());

    let mut wire = vec![16u8, 0, 0, 0];
    wire.extend_from_slice(&[0xEE; 16]);
    wire.extend_from_slice(&[0, 0, 0, 1]);
    raw.write_all(&wire).await.unwrap();

    assert_eq!(rx.read_packet().await.unwrap(), vec![0xEE; 16]);
    assert_eq!(rx.sequence(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_roundtrip_at_full_frame_size() {
    let (mut tx, mut rx) = conn_pair(ConnectionConfig::default());
    let len = 2 * MAX_PAYLOAD_LEN as usize;
    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let writer = tokio::spawn(async move {
        tx.write_packet(packet_buffer(&payload)).await.unwrap();
        tx.sequence()
    });

    let body = rx.read_packet().await.unwrap();
    assert_eq!(writer.await.unwrap(), 3);
    assert_eq!(rx.sequence(), 3);
    assert_eq!(body.len(), len);
    assert!(body == expected, "reassembled payload differs");
    assert!(body.capacity() <= len + len / 10);

    let snap = rx.metrics().snapshot();
    assert_eq!(snap.frames_received, 3);
    assert_eq!(snap.bytes_received, len as u64);
}

// ============================================================================
// SEQUENCE HANDLING
// ============================================================================

#[tokio::test]
async fn test_sequence_wraps_modulo_256() {
    let (mut tx, mut rx) = conn_pair(ConnectionConfig::default());

    for i in 0..300u32 {
        tx.write_packet(packet_buffer(&i.to_le_bytes())).await.unwrap();
        let body = rx.read_packet().await.unwrap();
        assert_eq!(body, i.to_le_bytes());
    }
    assert_eq!(tx.sequence(), (300 % 256) as u8);
    assert_eq!(rx.sequence(), (300 % 256) as u8);
}

#[tokio::test]
async fn test_reset_sequence_restarts_at_zero() {
    let (mut tx, mut raw) = raw_pair(ConnectionConfig::default());

    tx.write_packet(packet_buffer(b"one")).await.unwrap();
    tx.write_packet(packet_buffer(b"two")).await.unwrap();
    assert_eq!(tx.sequence(), 2);

    tx.reset_sequence();
    assert_eq!(tx.sequence(), 0);
    tx.write_packet(packet_buffer(b"three")).await.unwrap();

    let mut wire = vec![0u8; 3 * HEADER_LEN + 11];
    raw.read_exact(&mut wire).await.unwrap();
    assert_eq!(frame_headers(&wire), vec![(3, 0), (3, 1), (5, 0)]);
}

#[tokio::test]
async fn test_request_response_shares_counter() {
    let (mut client, mut server) = conn_pair(ConnectionConfig::default());

    client.write_packet(packet_buffer(b"query")).await.unwrap();
    assert_eq!(server.read_packet().await.unwrap(), b"query");
    server.write_packet(packet_buffer(b"result")).await.unwrap();
    assert_eq!(client.read_packet().await.unwrap(), b"result");

    assert_eq!(client.sequence(), 2);
    assert_eq!(server.sequence(), 2);
}

#[tokio::test]
async fn test_sequence_mismatch_detected() {
    let (mut rx, mut raw) = raw_pair(ConnectionConfig::default());
    raw.write_all(&[1, 0, 0, 5, 0xAA]).await.unwrap();

    let mut sink = Vec::new();
    match rx.read_packet_into(&mut sink).await {
        Err(PacketError::SequenceMismatch { expected, actual }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 5);
        }
        other => panic!("expected sequence mismatch, got {other:?}"),
    }
    assert_eq!(rx.sequence(), 0);
    assert!(sink.is_empty());
    assert_eq!(rx.metrics().snapshot().sequence_mismatches, 1);
}

#[tokio::test]
async fn test_mismatch_on_continuation_frame() {
    let (mut rx, mut raw) = raw_pair(small_config());

    let mut wire = vec![16u8, 0, 0, 0];
    wire.extend_from_slice(&[1; 16]);
    wire.extend_from_slice(&[2, 0, 0, 9, 1, 1]);
    raw.write_all(&wire).await.unwrap();

    let err = rx.read_packet().await.unwrap_err();
    assert!(matches!(
        err,
        PacketError::SequenceMismatch {
            expected: 1,
            actual: 9
        }
    ));
}

// ============================================================================
// LENGTH VALIDATION
// ============================================================================

#[tokio::test]
async fn test_empty_first_frame_rejected() {
    let (mut rx, mut raw) = raw_pair(ConnectionConfig::default());
    raw.write_all(&[0, 0, 0, 0]).await.unwrap();

    let err = rx.read_packet().await.unwrap_err();
    assert!(matches!(err, PacketError::InvalidLength(0)));
    assert_eq!(rx.sequence(), 0);
}

#[tokio::test]
async fn test_empty_packet_allowed_when_configured() {
    let config = ConnectionConfig {
        allow_empty_packets: true,
        ..ConnectionConfig::default()
    };
    let (mut tx, mut rx) = conn_pair(config);

    tx.write_packet(packet_buffer(&[])).await.unwrap();
    assert!(rx.read_packet().await.unwrap().is_empty());
    assert_eq!(rx.sequence(), 1);
}

#[tokio::test]
async fn test_frame_longer_than_max_rejected() {
    let (mut rx, mut raw) = raw_pair(small_config());
    raw.write_all(&[17, 0, 0, 0]).await.unwrap();

    let err = rx.read_packet().await.unwrap_err();
    assert!(matches!(err, PacketError::InvalidLength(17)));
}

#[tokio::test]
async fn test_packet_size_cap() {
    let config = ConnectionConfig {
        max_packet_size: Some(20),
        ..small_config()
    };
    let (mut tx, mut rx) = conn_pair(config);

    tx.write_packet(packet_buffer(&[3u8; 40])).await.unwrap();
    let err = rx.read_packet().await.unwrap_err();
    assert!(matches!(
        err,
        PacketError::OversizedPacket {
            size: 32,
            limit: 20
        }
    ));
}

// ============================================================================
// BUFFER HANDLING
// ============================================================================

#[tokio::test]
async fn test_read_packet_tightens_oversized_buffer() {
    let (mut tx, mut rx) = conn_pair(ConnectionConfig::default());
    let payload = vec![0x42u8; 35];

    tx.write_packet(packet_buffer(&payload)).await.unwrap();
    let body = rx.read_packet().await.unwrap();

    assert_eq!(body, payload);
    assert_eq!(body.capacity(), body.len());
}

#[tokio::test]
async fn test_read_packet_keeps_buffer_within_slack() {
    let config = ConnectionConfig {
        initial_read_capacity: 100,
        ..ConnectionConfig::default()
    };
    let (mut tx, mut rx) = conn_pair(config);
    let payload: Vec<u8> = (0..95).collect();

    tx.write_packet(packet_buffer(&payload)).await.unwrap();
    let body = rx.read_packet().await.unwrap();

    assert_eq!(body, payload);
    assert_eq!(body.capacity(), 100);
}

#[tokio::test]
async fn test_read_packet_into_appends_to_sink() {
    let (mut tx, mut rx) = conn_pair(small_config());
    tx.write_packet(packet_buffer(&[9u8; 20])).await.unwrap();

    let mut sink = b"prefix:".to_vec();
    let written = rx.read_packet_into(&mut sink).await.unwrap();

    assert_eq!(written, 20);
    assert_eq!(&sink[..7], b"prefix:");
    assert_eq!(&sink[7..], &[9u8; 20][..]);
}

#[tokio::test]
async fn test_missing_header_reserve_rejected() {
    let (mut tx, _raw) = raw_pair(ConnectionConfig::default());
    let err = tx.write_packet(BytesMut::new()).await.unwrap_err();
    assert!(matches!(err, PacketError::MissingHeaderReserve(0)));
}

// ============================================================================
// CONNECTION FAILURES
// ============================================================================

#[tokio::test]
async fn test_closed_connection_rejects_io() {
    let (mut conn, _raw) = raw_pair(ConnectionConfig::default());
    conn.close().await.unwrap();

    assert!(matches!(
        conn.read_packet().await,
        Err(PacketError::BadConnection(_))
    ));
    assert!(matches!(
        conn.write_packet(packet_buffer(b"late")).await,
        Err(PacketError::BadConnection(_))
    ));
    // Closed takes precedence over a malformed write buffer.
    assert!(matches!(
        conn.write_packet(BytesMut::new()).await,
        Err(PacketError::BadConnection(_))
    ));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_close_resets_sequence() {
    let (mut tx, _rx) = conn_pair(ConnectionConfig::default());
    tx.write_packet(packet_buffer(b"x")).await.unwrap();
    assert_eq!(tx.sequence(), 1);

    tx.close().await.unwrap();
    assert_eq!(tx.sequence(), 0);
    assert!(tx.is_closed());
}

#[tokio::test]
async fn test_truncated_header_is_bad_connection() {
    let (mut rx, mut raw) = raw_pair(ConnectionConfig::default());
    raw.write_all(&[5, 0]).await.unwrap();
    drop(raw);

    let err = rx.read_packet().await.unwrap_err();
    assert!(matches!(err, PacketError::BadConnection(_)));
}

#[tokio::test]
async fn test_truncated_payload_is_bad_connection() {
    let (mut rx, mut raw) = raw_pair(ConnectionConfig::default());
    raw.write_all(&[10, 0, 0, 0, 1, 2, 3]).await.unwrap();
    drop(raw);

    match rx.read_packet().await {
        Err(PacketError::BadConnection(e)) => {
            assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof)
        }
        other => panic!("expected bad connection, got {other:?}"),
    }
    assert_eq!(rx.metrics().snapshot().connection_errors, 1);
}

#[tokio::test]
async fn test_write_to_dropped_peer_is_bad_connection() {
    let (mut tx, raw) = raw_pair(ConnectionConfig::default());
    drop(raw);

    let err = tx.write_packet(packet_buffer(b"nobody")).await.unwrap_err();
    assert!(matches!(err, PacketError::BadConnection(_)));
    assert!(err.is_fatal());
}
