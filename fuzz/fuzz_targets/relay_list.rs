//! Fuzz target for relay list parsing and bank setup

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaylink_gpio::{MemoryDriver, RelayBank, parse_relay_list};

fuzz_target!(|data: &str| {
    let (pins, errors) = parse_relay_list(data);
    if !data.trim().is_empty() {
        assert_eq!(pins.len() + errors.len(), data.split(',').count());
    }

    let driver = MemoryDriver::new();
    let state = driver.state();
    let bank = RelayBank::setup(Box::new(driver), data).expect("memory driver never fails");
    assert!(bank.len() <= pins.len());
    drop(bank);
    assert_eq!(state.close_count(), 1);
});
