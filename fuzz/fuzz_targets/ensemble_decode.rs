//! Fuzz target for `codec::decode`.
//!
//! Covers the full ensemble path: envelope, address abbreviation, and
//! every payload type's decoder, across both `Single` and `Overlay`
//! encapsulation. A malformed address or payload body must only skip that
//! one record (`RecordOutcome::Skipped`); only a truncated envelope or a
//! length field that overruns the buffer may abort the whole ensemble.
//! Neither case may ever panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaymesh_proto::codec;

fuzz_target!(|data: &[u8]| {
    let _ = codec::decode(data);
});
