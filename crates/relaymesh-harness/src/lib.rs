//! Deterministic simulation harness for relaymesh overlay testing.
//!
//! [`SimNetwork`] wires several [`relaymesh_core::Context`]s together over
//! virtual, lossy links driven by a manually-advanced clock ([`SimEnv`]),
//! for reproducible multi-node scenarios without real sockets or wall-clock
//! time.
//!
//! # Invariant testing
//!
//! The `invariants` module checks behavioural properties that must hold
//! across every run, as opposed to one specific scenario. Use
//! [`InvariantRegistry::standard()`] for the common subscriber-consistency
//! checks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{Invariant, InvariantRegistry, InvariantResult, NetworkSnapshot, Violation};
pub use sim_driver::{sim_interface, NodeIndex, SimNetwork};
pub use sim_env::SimEnv;
