//! The fixed envelope that wraps every ensemble (spec §4.1, §6).
//!
//! `[0x00][ENCAP][sender SID, full][flags][iface?][seq?]`, followed by one
//! ([`Encap::Single`]) or more ([`Encap::Overlay`]) length-prefixed payload
//! records.
//!
//! The sender address is always written in full: it is what seeds this
//! ensemble's [`crate::abbrev::DecodeContext`]/[`crate::abbrev::EncodeContext`]
//! tables, so abbreviating it would be self-referential. (Open question
//! resolved: see `DESIGN.md`.)

use crate::{
    errors::{ProtocolError, Result},
    sid::Sid,
};

const MAGIC: u8 = 0x00;

const FLAG_UNICAST: u8 = 0x01;
const FLAG_INTERFACE: u8 = 0x02;
const FLAG_SEQ: u8 = 0x04;

/// Ensemble encapsulation mode: one payload record filling the remainder of
/// the buffer, or many, each length-prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encap {
    /// Exactly one payload record, consuming the rest of the ensemble.
    Single = 0x01,
    /// Zero or more 16-bit length-prefixed payload records.
    Overlay = 0x02,
}

impl Encap {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Single),
            0x02 => Some(Self::Overlay),
            _ => None,
        }
    }
}

/// Parsed envelope metadata (everything before the payload records).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    /// Encapsulation mode governing how payload records are framed.
    pub encap: Encap,
    /// The SID of the node that emitted this ensemble.
    pub sender: Sid,
    /// Set when every payload record in this ensemble targets a single,
    /// specific destination rather than being broadcast.
    pub unicast: bool,
    /// Local interface number the sender used, if present.
    pub interface_number: Option<u8>,
    /// Sender's self-announcement sequence number, if present.
    pub sequence: Option<u8>,
}

impl Envelope {
    /// Parse the envelope prefix from `buf`. Returns the envelope and the
    /// number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut pos = 0usize;
        let magic = *buf.first().ok_or(ProtocolError::Truncated { expected: 2, actual: 0 })?;
        let encap_byte =
            *buf.get(1).ok_or(ProtocolError::Truncated { expected: 2, actual: buf.len() })?;

        if magic != MAGIC {
            return Err(ProtocolError::BadEnvelopePrefix(magic, encap_byte));
        }
        let encap =
            Encap::from_byte(encap_byte).ok_or(ProtocolError::BadEnvelopePrefix(magic, encap_byte))?;
        pos += 2;

        let sender_end = pos + Sid::LEN;
        let sender_bytes = buf.get(pos..sender_end).ok_or(ProtocolError::Truncated {
            expected: Sid::LEN,
            actual: buf.len().saturating_sub(pos),
        })?;
        let mut sender_arr = [0u8; Sid::LEN];
        sender_arr.copy_from_slice(sender_bytes);
        let sender = Sid::from_bytes(sender_arr);
        pos = sender_end;

        let flags =
            *buf.get(pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
        pos += 1;

        let interface_number = if flags & FLAG_INTERFACE != 0 {
            let b = *buf.get(pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
            pos += 1;
            Some(b)
        } else {
            None
        };

        let sequence = if flags & FLAG_SEQ != 0 {
            let b = *buf.get(pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
            pos += 1;
            Some(b)
        } else {
            None
        };

        Ok((
            Self { encap, sender, unicast: flags & FLAG_UNICAST != 0, interface_number, sequence },
            pos,
        ))
    }

    /// Encode the envelope prefix into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(MAGIC);
        out.push(self.encap as u8);
        out.extend_from_slice(self.sender.as_bytes());

        let mut flags = 0u8;
        if self.unicast {
            flags |= FLAG_UNICAST;
        }
        if self.interface_number.is_some() {
            flags |= FLAG_INTERFACE;
        }
        if self.sequence.is_some() {
            flags |= FLAG_SEQ;
        }
        out.push(flags);

        if let Some(n) = self.interface_number {
            out.push(n);
        }
        if let Some(s) = self.sequence {
            out.push(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(byte: u8) -> Sid {
        Sid::from_bytes([byte; 32])
    }

    #[test]
    fn round_trips_minimal_envelope() {
        let env = Envelope {
            encap: Encap::Single,
            sender: sid(7),
            unicast: false,
            interface_number: None,
            sequence: None,
        };
        let mut buf = Vec::new();
        env.encode(&mut buf);
        let (decoded, consumed) = Envelope::decode(&buf).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn round_trips_full_envelope() {
        let env = Envelope {
            encap: Encap::Overlay,
            sender: sid(9),
            unicast: true,
            interface_number: Some(3),
            sequence: Some(250),
        };
        let mut buf = Vec::new();
        env.encode(&mut buf);
        let (decoded, consumed) = Envelope::decode(&buf).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = [0x01, 0x01];
        assert!(matches!(Envelope::decode(&buf), Err(ProtocolError::BadEnvelopePrefix(..))));
    }

    #[test]
    fn rejects_bad_encap() {
        let buf = [0x00, 0xFF];
        assert!(matches!(Envelope::decode(&buf), Err(ProtocolError::BadEnvelopePrefix(..))));
    }

    #[test]
    fn rejects_truncated_envelope() {
        let buf = [0x00, 0x01, 1, 2, 3];
        assert!(matches!(Envelope::decode(&buf), Err(ProtocolError::Truncated { .. })));
    }
}
