#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use packet_conn::{ConnectionConfig, PacketCodec};
use tokio_util::codec::{Decoder, Encoder};

fuzz_target!(|data: &[u8]| {
    let config = ConnectionConfig {
        max_payload_len: 32,
        allow_empty_packets: true,
        ..ConnectionConfig::default()
    };
    let (Ok(mut encoder), Ok(mut decoder)) = (
        PacketCodec::from_config(&config),
        PacketCodec::from_config(&config),
    ) else {
        return;
    };

    let mut wire = BytesMut::new();
    if encoder.encode(data, &mut wire).is_err() {
        return;
    }
    let decoded = decoder.decode(&mut wire).ok().flatten();
    assert_eq!(decoded.as_deref(), Some(data));
    assert!(wire.is_empty());
});
