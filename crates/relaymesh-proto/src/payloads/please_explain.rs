//! `PLEASEEXPLAIN` payload: sent back to an envelope sender when one of its
//! payload records was rejected, carrying just enough context for the peer
//! to identify what was dropped without reproducing the original's
//! human-readable debug string wire format.

use crate::errors::{ProtocolError, Result};

/// Maximum bytes of the offending header this payload will quote.
pub const MAX_CONTEXT_LEN: usize = 16;

/// Why a payload record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reason {
    /// A header byte could not be read (ensemble truncated).
    Malformed = 0,
    /// An address abbreviation could not be resolved.
    UnknownAddress = 1,
    /// A length-prefixed record's declared length exceeded the buffer.
    LengthExceedsBuffer = 2,
}

impl Reason {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Malformed),
            1 => Some(Self::UnknownAddress),
            2 => Some(Self::LengthExceedsBuffer),
            _ => None,
        }
    }
}

/// A please-explain payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PleaseExplain {
    /// Why the triggering payload record was rejected.
    pub reason: Reason,
    /// First [`MAX_CONTEXT_LEN`] bytes of the rejected record, for
    /// debugging; not interpreted.
    pub context: Vec<u8>,
}

impl PleaseExplain {
    /// Build a please-explain, truncating `context` to [`MAX_CONTEXT_LEN`].
    #[must_use]
    pub fn new(reason: Reason, context: &[u8]) -> Self {
        let len = context.len().min(MAX_CONTEXT_LEN);
        Self { reason, context: context[..len].to_vec() }
    }

    /// Encode into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.reason as u8);
        out.extend_from_slice(&self.context);
    }

    /// Decode a whole payload slice.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let reason_byte = *buf.first().ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
        let reason = Reason::from_byte(reason_byte).ok_or(ProtocolError::BadAddressForm(reason_byte))?;
        let context = buf[1..].iter().copied().take(MAX_CONTEXT_LEN).collect();
        Ok(Self { reason, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let pe = PleaseExplain::new(Reason::UnknownAddress, &[1, 2, 3, 4]);
        let mut buf = Vec::new();
        pe.encode(&mut buf);
        assert_eq!(PleaseExplain::decode(&buf).unwrap(), pe);
    }

    #[test]
    fn context_is_truncated() {
        let long = [7u8; 64];
        let pe = PleaseExplain::new(Reason::Malformed, &long);
        assert_eq!(pe.context.len(), MAX_CONTEXT_LEN);
    }

    #[test]
    fn rejects_unknown_reason_byte() {
        assert!(PleaseExplain::decode(&[0xFF]).is_err());
    }
}
