//! Fuzz target for datagram routing, event decoding and escaped strings.
//!
//! Run with: cargo +nightly fuzz run fuzz_datagram_decoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use wpactl_core::codec::{self, Routing};

fuzz_target!(|data: &[u8]| {
    if let Routing::Unsolicited { priority, payload } = codec::route(data) {
        assert!(priority <= codec::MAX_PRIORITY);
        let event = wpactl_core::decode_event(priority, payload);
        assert_eq!(event.priority, priority);
    }

    // Decoding never grows the input.
    let decoded = codec::decode_byte_literal(data);
    assert!(decoded.len() <= data.len());

    let encoded = codec::encode_byte_literal(data);
    assert_eq!(codec::decode_byte_literal(encoded.as_bytes()), data);
});
