//! Wire codec for the relaymesh overlay: the fixed ensemble envelope, the
//! per-payload header with its address-abbreviation scheme, and the
//! payload bodies dispatched by type byte.
//!
//! This crate is pure codec: no sockets, no timers, no state beyond what a
//! single ensemble's decode/encode context needs. [`relaymesh_core`] owns
//! everything stateful (link scoring, route selection, queues) and drives
//! this crate's [`codec::decode`]/[`codec::encode`] at its boundary.

pub mod abbrev;
pub mod codec;
pub mod envelope;
pub mod errors;
pub mod header;
pub mod payloads;
pub mod sid;

pub use codec::{decode, encode, Ensemble, RecordOutcome};
pub use envelope::{Encap, Envelope};
pub use errors::{ProtocolError, Result};
pub use header::PayloadHeader;
pub use payloads::DecodedPayload;
pub use sid::Sid;
