//! Fuzz target for `Envelope::decode`.
//!
//! Arbitrary byte sequences must never panic: a short buffer, a bad magic
//! byte, an unrecognised encap byte, or a truncated sender address should
//! all surface as a structured `ProtocolError`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaymesh_proto::envelope::Envelope;

fuzz_target!(|data: &[u8]| {
    let _ = Envelope::decode(data);
});
