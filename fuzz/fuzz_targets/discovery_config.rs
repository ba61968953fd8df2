//! Fuzz target for discovery address parsing
//!
//! Arbitrary address strings must produce a config or an error, never a panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relaylink_discovery::DiscoveryConfig;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    broadcast: &'a str,
    listen: &'a str,
    broker_port: u16,
}

fuzz_target!(|input: Input<'_>| {
    if let Ok(config) = DiscoveryConfig::parse(input.broadcast, input.listen, input.broker_port) {
        let _ = config.validate();
    }
});
