//! Fuzz target for the tabular and key=value reply parsers.
//!
//! Run with: cargo +nightly fuzz run fuzz_response_parsers
//!
//! Replies come straight off the socket, so any byte sequence must parse
//! into results or errors without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wpactl_core::parse::{parse_list_networks, parse_scan_results, parse_status};

fuzz_target!(|data: &[u8]| {
    let _ = parse_scan_results(data);
    let _ = parse_list_networks(data);
    let _ = parse_status(data);
});
