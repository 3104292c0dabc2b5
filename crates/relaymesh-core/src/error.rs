//! Error types for the relaymesh overlay core (spec §7).
//!
//! `CoreError` covers the core's own failure modes (congestion, a dead
//! interface, exhausted resources); wire decode failures arrive wrapped
//! from [`relaymesh_proto::ProtocolError`] via `From`.

use std::io;

use thiserror::Error;

/// Errors raised by the overlay core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An ensemble could not be decoded at all (bad envelope, truncated
    /// header, length field overrunning the buffer).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An address abbreviation in an otherwise-valid ensemble could not be
    /// resolved; the payload record carrying it was dropped.
    #[error("unknown address (abbreviation unresolved)")]
    UnknownAddress,

    /// The destination's queue was full and drop-oldest could not make
    /// room (new frame itself already breaches the queue's policy).
    #[error("queue congested: {queue_class} already at max length {max_length}")]
    QueueCongested {
        /// Queue class that rejected the frame.
        queue_class: u8,
        /// Configured maximum length for that queue.
        max_length: usize,
    },

    /// The interface a frame needed to go out on is not `Up`.
    #[error("interface {0} is down")]
    InterfaceDown(u8),

    /// A fixed-capacity table (neighbour slots, node observations) had no
    /// room and random eviction still could not proceed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// Underlying I/O failure from a driver-owned socket/file, carried
    /// through so the core's logs and error reporting stay in one place.
    #[error("io error: {0}")]
    IoFatal(String),
}

impl From<relaymesh_proto::ProtocolError> for CoreError {
    fn from(err: relaymesh_proto::ProtocolError) -> Self {
        use relaymesh_proto::ProtocolError::{BadAddressForm, UnknownAddress};
        match err {
            UnknownAddress { .. } => Self::UnknownAddress,
            BadAddressForm(_) => Self::UnknownAddress,
            other => Self::MalformedFrame(other.to_string()),
        }
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        Self::IoFatal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaymesh_proto::ProtocolError;

    #[test]
    fn unresolved_address_maps_to_unknown_address() {
        let proto_err = ProtocolError::UnknownAddress { tag: 0x01 };
        assert_eq!(CoreError::from(proto_err), CoreError::UnknownAddress);
    }

    #[test]
    fn truncated_maps_to_malformed_frame() {
        let proto_err = ProtocolError::Truncated { expected: 4, actual: 1 };
        assert!(matches!(CoreError::from(proto_err), CoreError::MalformedFrame(_)));
    }
}
