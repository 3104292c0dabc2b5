//! Self-announce-ack payload (spec §6): `u32 s1 | u32 s2 | u8 iface`.
//!
//! Acknowledges a previously observed self-announce, echoing back the
//! sequence window `[s1, s2]` the neighbour advertised and the local
//! interface number the ack was sent on, so the original sender can derive
//! a round-trip score for that link (§4.3).

use crate::errors::{ProtocolError, Result};

/// Length in bytes of an encoded [`SelfAnnounceAck`].
pub const LEN: usize = 9;

/// Self-announce acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfAnnounceAck {
    /// Start of the acknowledged sequence window.
    pub s1: u32,
    /// End of the acknowledged sequence window.
    pub s2: u32,
    /// Local interface number the ack was sent on.
    pub iface: u8,
}

impl SelfAnnounceAck {
    /// Encode into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.s1.to_be_bytes());
        out.extend_from_slice(&self.s2.to_be_bytes());
        out.push(self.iface);
    }

    /// Decode from an exact `LEN`-byte payload slice.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != LEN {
            return Err(ProtocolError::Truncated { expected: LEN, actual: buf.len() });
        }
        let s1 = u32::from_be_bytes(buf[0..4].try_into().expect("slice is 4 bytes"));
        let s2 = u32::from_be_bytes(buf[4..8].try_into().expect("slice is 4 bytes"));
        Ok(Self { s1, s2, iface: buf[8] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let ack = SelfAnnounceAck { s1: 10, s2: 20, iface: 3 };
        let mut buf = Vec::new();
        ack.encode(&mut buf);
        assert_eq!(buf.len(), LEN);
        assert_eq!(SelfAnnounceAck::decode(&buf).unwrap(), ack);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(SelfAnnounceAck::decode(&[0u8; 5]).is_err());
    }
}
