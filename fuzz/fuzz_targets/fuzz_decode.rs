#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use packet_conn::{ConnectionConfig, PacketCodec};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary wire bytes must decode or fail cleanly, never panic or spin
    let config = ConnectionConfig {
        max_payload_len: 64,
        max_packet_size: Some(4096),
        ..ConnectionConfig::default()
    };
    let Ok(mut codec) = PacketCodec::from_config(&config) else {
        return;
    };

    let mut src = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut src) {}
});
