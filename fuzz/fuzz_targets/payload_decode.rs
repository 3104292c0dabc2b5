//! Fuzz target for `DecodedPayload::decode`.
//!
//! Exercises every payload body decoder (self-announce-ack, node-announce,
//! rhizome advert, please-explain, plain data) against the same arbitrary
//! bytes. All invalid inputs must return an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaymesh_proto::payloads::{
    TYPE_DATA, TYPE_DATA_VOICE, TYPE_NODEANNOUNCE, TYPE_PLEASEEXPLAIN, TYPE_RHIZOME_ADVERT,
    TYPE_SELFANNOUNCE_ACK,
};
use relaymesh_proto::DecodedPayload;

const FRAME_TYPES: [u8; 6] = [
    TYPE_DATA,
    TYPE_DATA_VOICE,
    TYPE_SELFANNOUNCE_ACK,
    TYPE_NODEANNOUNCE,
    TYPE_RHIZOME_ADVERT,
    TYPE_PLEASEEXPLAIN,
];

fuzz_target!(|data: &[u8]| {
    for frame_type in FRAME_TYPES {
        let _ = DecodedPayload::decode(frame_type, data);
    }
    // An unrecognised type byte is preserved as opaque data, not rejected;
    // still must never panic.
    let _ = DecodedPayload::decode(0xFF, data);
});
