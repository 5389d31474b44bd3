//! Fuzzing entry points for radiotftp-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Run fuzzer: cargo fuzz run fuzz_link_decode

use radiotftp_core::{
    decode_link_frame, scan_stream, Datagram, FrameSync, LineCodec, Manchester, Message,
    SyncConfig,
};

pub fn fuzz_link_decode(data: &[u8]) {
    // Try to decode - should never panic
    if let Ok(frame) = decode_link_frame(data) {
        let _ = Datagram::decode(&frame.payload);
    }
    let _ = Manchester.decode(data);
}

pub fn fuzz_message_parse(data: &[u8]) {
    let _ = Message::parse(data);
    let _ = Datagram::decode(data);
}

pub fn fuzz_sync(data: &[u8]) {
    // A small buffer makes overflow reachable
    let config = SyncConfig {
        capacity: 32,
        ..SyncConfig::default()
    };
    if let Ok(mut sync) = FrameSync::new(config) {
        for &byte in data {
            if let Some(frame) = sync.on_byte_received(byte) {
                let _ = Manchester.decode(&frame);
            }
        }
    }
    let _ = scan_stream(data, Manchester, config);
}
