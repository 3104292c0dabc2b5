//! Server-level errors (spec §7): everything above the overlay core that
//! can fail — binding sockets, reading configuration, transport I/O.

use thiserror::Error;

/// Errors raised by the production driver and its transports.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The overlay core itself rejected something (decode failure,
    /// congestion, exhausted resources).
    #[error(transparent)]
    Core(#[from] relaymesh_core::CoreError),

    /// Socket bind, file open, or read/write failure on a transport.
    #[error("transport io error on interface {interface}: {source}")]
    Transport {
        /// Interface the failing transport belongs to.
        interface: relaymesh_core::InterfaceId,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed or referenced an invalid rule.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An interface rule referenced a socket type its section does not
    /// support (e.g. a `packet_interval` on a dgram interface).
    #[error("interface {0}: {1}")]
    InterfaceConfig(String, String),
}
