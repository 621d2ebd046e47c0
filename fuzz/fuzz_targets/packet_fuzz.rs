//! Packet fuzz target: feed arbitrary datagrams to both decode modes.
//! Neither may panic, and both must agree on counts and warnings.
//! Build with: cargo fuzz run packet_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let config = collectd_dissect::DecoderConfig::default();
    let tree = collectd_dissect::frame::decode_tree(data, &config);
    let counts = collectd_dissect::walk_packet(data, &config);
    assert_eq!(tree.counts, counts.counts);
    assert_eq!(tree.warnings, counts.warnings);
    let _ = collectd_dissect::dump::render_tree(&tree);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run packet_fuzz");
}
