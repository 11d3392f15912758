//! Fuzz target for wire payload decoding
//!
//! Inbound multicast payloads and client events are attacker-controlled
//! bytes; decoding must never panic and a decode failure must leave no
//! partial value behind.

#![no_main]

use gavel_proto::{ClientEvent, PushEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = ClientEvent::decode(data) {
        // Whatever decodes must re-encode to a decodable envelope.
        let encoded = event.encode();
        assert!(ClientEvent::decode(encoded.as_bytes()).is_ok());
    }

    if let Ok(event) = PushEvent::decode(data) {
        let encoded = event.encode();
        assert!(PushEvent::decode(encoded.as_bytes()).is_ok());
    }
});
