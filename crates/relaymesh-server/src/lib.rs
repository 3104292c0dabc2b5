//! Production interface manager and event loop for the relaymesh overlay
//! (spec §4.2, §5).
//!
//! This crate provides real I/O around [`relaymesh_core`]'s sans-IO state
//! machines: it discovers and binds OS interfaces, frames bytes for
//! whichever [`relaymesh_core::interface::SocketType`] backs each one, and
//! runs the single-threaded cooperative loop that turns socket readiness
//! and timer ticks into core calls.
//!
//! # Components
//!
//! - [`config`]: pre-parsed interface rules and debug flags (spec §6).
//! - [`discover`]: matches OS interfaces against configured rules.
//! - [`transport`]: datagram, stream (SLIP-framed) and file encapsulations.
//! - [`driver`]: the production event loop.
//! - [`system_env`]: [`Environment`](relaymesh_core::Environment) backed by
//!   system time and OS randomness.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod discover;
pub mod driver;
pub mod error;
pub mod slip;
pub mod system_env;
pub mod transport;

pub use driver::Driver;
pub use error::ServerError;
pub use system_env::SystemEnv;
