//! Codec error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding an ensemble or a payload header.
///
/// See spec §7: decode errors never abort the caller's loop. `MalformedFrame`
/// drops the whole ensemble; `UnknownAddress` drops only the current payload
/// record and decoding continues with the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Envelope prefix (`00 ENCAP`) was not recognised.
    #[error("bad envelope prefix: {0:#04x} {1:#04x}")]
    BadEnvelopePrefix(u8, u8),

    /// A length-prefixed payload record's declared length exceeds the
    /// remaining ensemble bytes.
    #[error("payload length {declared} exceeds remaining buffer ({remaining} bytes)")]
    LengthExceedsBuffer {
        /// Declared payload length.
        declared: usize,
        /// Bytes actually remaining in the ensemble.
        remaining: usize,
    },

    /// The ensemble ended before a required header byte could be read.
    #[error("ensemble truncated: expected at least {expected} more bytes, got {actual}")]
    Truncated {
        /// Minimum bytes required to continue parsing.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// An address abbreviation could not be resolved against the per-packet
    /// decode context.
    ///
    /// Per spec §4.1: the codec records this and continues decoding; the
    /// payload the address belonged to is neither processed nor forwarded.
    #[error("unresolvable address abbreviation (tag {tag:#04x})")]
    UnknownAddress {
        /// The address-form tag byte that could not be resolved.
        tag: u8,
    },

    /// A reserved/unknown address-form tag byte was encountered.
    #[error("unrecognised address form tag {0:#04x}")]
    BadAddressForm(u8),

    /// `log_index`/context accessor called on a payload that does not carry
    /// that field (defensive, should not occur via the public API).
    #[error("field not present for this record")]
    FieldNotPresent,
}
