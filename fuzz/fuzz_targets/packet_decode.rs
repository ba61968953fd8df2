//! Fuzz target for MQTT packet decoding
//!
//! The decoder should never panic, only return Ok or Err.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaylink_mqtt::Packet;

fuzz_target!(|data: &[u8]| {
    if let Ok((packet, used)) = Packet::decode(data) {
        assert!(used <= data.len());

        // Anything we accept must re-encode
        let encoded = packet.encode().expect("decoded packet must encode");
        let (again, _) = Packet::decode(&encoded).expect("re-encoded packet must decode");
        assert_eq!(again, packet);
    }
});
