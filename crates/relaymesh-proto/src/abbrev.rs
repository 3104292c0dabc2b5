//! Address abbreviation scheme (spec §4.1).
//!
//! Addresses on the wire are one of:
//! - `FULL`: the raw 32-byte SID.
//! - `ABBREV`: a 6-byte prefix plus a 1-byte index into this packet's table
//!   of already-resolved full SIDs (the same 6-byte prefix width the
//!   node-announce payload uses for its own `SID_prefix`, §6).
//! - `PREVIOUS_SENDER`: sentinel, resolves to the source of the immediately
//!   preceding payload record in this ensemble (or the envelope sender, for
//!   the first record).
//! - `BROADCAST`: sentinel, resolves to [`Sid::BROADCAST`].
//!
//! Both directions share one per-ensemble context: the decoder's
//! [`DecodeContext`] maps abbreviations back to full addresses; the encoder's
//! [`EncodeContext`] decides which form is smallest for a given address.
//! Both are scoped to a single ensemble (spec §4.1: "within the scope of a
//! single received packet").

use crate::{
    errors::{ProtocolError, Result},
    sid::Sid,
};

/// Width in bytes of the abbreviated prefix form.
pub const ABBREV_PREFIX_LEN: usize = 6;

const TAG_FULL: u8 = 0x00;
const TAG_ABBREV: u8 = 0x01;
const TAG_PREVIOUS_SENDER: u8 = 0x02;
const TAG_BROADCAST: u8 = 0x03;

/// Per-ensemble decode-side address table.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    envelope_sender: Sid,
    resolved: Vec<Sid>,
    last_record_source: Option<Sid>,
    /// Number of addresses that failed to resolve since this context was
    /// created (spec §4.1 `invalid_addresses` counter).
    pub invalid_addresses: u32,
}

impl DecodeContext {
    /// Start a new per-ensemble context, seeded with the envelope sender.
    #[must_use]
    pub fn new(envelope_sender: Sid) -> Self {
        Self {
            envelope_sender,
            resolved: vec![envelope_sender],
            last_record_source: None,
            invalid_addresses: 0,
        }
    }

    /// The envelope sender address.
    #[must_use]
    pub fn envelope_sender(&self) -> Sid {
        self.envelope_sender
    }

    /// Record a fully-resolved address so later abbreviations in the same
    /// ensemble can reference it by index.
    pub fn remember(&mut self, sid: Sid) {
        self.resolved.push(sid);
    }

    /// Record the source of the payload record just decoded, so a following
    /// record's `PREVIOUS_SENDER` sentinel can resolve to it.
    pub fn set_last_record_source(&mut self, sid: Sid) {
        self.last_record_source = Some(sid);
    }

    /// Decode one address from `buf`, advancing `pos`. Returns the resolved
    /// SID, or `Err(UnknownAddress)` if an abbreviation can't be resolved
    /// (decoding of the *ensemble* should continue; only the current payload
    /// record is dropped, per spec §4.1/§7).
    pub fn decode_address(&mut self, buf: &[u8], pos: &mut usize) -> Result<Sid> {
        let tag = *buf.get(*pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
        *pos += 1;

        match tag {
            TAG_FULL => {
                let end = *pos + Sid::LEN;
                let bytes = buf.get(*pos..end).ok_or(ProtocolError::Truncated {
                    expected: Sid::LEN,
                    actual: buf.len().saturating_sub(*pos),
                })?;
                *pos = end;
                let mut arr = [0u8; Sid::LEN];
                arr.copy_from_slice(bytes);
                Ok(Sid::from_bytes(arr))
            },
            TAG_ABBREV => {
                let end = *pos + ABBREV_PREFIX_LEN;
                let prefix = buf.get(*pos..end).ok_or(ProtocolError::Truncated {
                    expected: ABBREV_PREFIX_LEN,
                    actual: buf.len().saturating_sub(*pos),
                })?;
                *pos = end;
                let index =
                    *buf.get(*pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
                *pos += 1;

                match self.resolved.get(index as usize) {
                    Some(candidate) if candidate.as_bytes()[..ABBREV_PREFIX_LEN] == *prefix => {
                        Ok(*candidate)
                    },
                    _ => {
                        self.invalid_addresses += 1;
                        Err(ProtocolError::UnknownAddress { tag })
                    },
                }
            },
            TAG_PREVIOUS_SENDER => {
                Ok(self.last_record_source.unwrap_or(self.envelope_sender))
            },
            TAG_BROADCAST => Ok(Sid::BROADCAST),
            other => Err(ProtocolError::BadAddressForm(other)),
        }
    }
}

/// Per-ensemble encode-side address table: mirrors [`DecodeContext`] so the
/// encoder picks whichever form the decoder would reconstruct cheapest.
#[derive(Debug, Clone)]
pub struct EncodeContext {
    envelope_sender: Sid,
    resolved: Vec<Sid>,
    last_record_source: Option<Sid>,
}

impl EncodeContext {
    /// Start a new per-ensemble context for the given envelope sender.
    #[must_use]
    pub fn new(envelope_sender: Sid) -> Self {
        Self { envelope_sender, resolved: vec![envelope_sender], last_record_source: None }
    }

    /// Record the source of the payload record just encoded.
    pub fn set_last_record_source(&mut self, sid: Sid) {
        self.last_record_source = Some(sid);
    }

    /// Encode `sid`, choosing the smallest representation given what this
    /// context has already emitted, and append it to `out`.
    pub fn encode_address(&mut self, sid: Sid, out: &mut Vec<u8>) {
        if sid.is_broadcast() {
            out.push(TAG_BROADCAST);
            return;
        }
        if Some(sid) == self.last_record_source {
            out.push(TAG_PREVIOUS_SENDER);
            return;
        }
        if let Some(index) = self.resolved.iter().position(|s| *s == sid) {
            out.push(TAG_ABBREV);
            out.extend_from_slice(&sid.as_bytes()[..ABBREV_PREFIX_LEN]);
            #[allow(clippy::cast_possible_truncation)]
            out.push(index as u8);
            return;
        }
        out.push(TAG_FULL);
        out.extend_from_slice(sid.as_bytes());
        self.resolved.push(sid);
    }

    /// `true` if `sid` is the envelope sender (caller should prefer
    /// `SENDER_SAME` rather than calling [`Self::encode_address`] at all).
    #[must_use]
    pub fn is_envelope_sender(&self, sid: Sid) -> bool {
        sid == self.envelope_sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(byte: u8) -> Sid {
        Sid::from_bytes([byte; 32])
    }

    #[test]
    fn full_address_round_trips() {
        let mut enc = EncodeContext::new(sid(1));
        let mut buf = Vec::new();
        enc.encode_address(sid(9), &mut buf);

        let mut dec = DecodeContext::new(sid(1));
        let mut pos = 0;
        assert_eq!(dec.decode_address(&buf, &mut pos).unwrap(), sid(9));
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn repeated_address_uses_abbreviation() {
        let mut enc = EncodeContext::new(sid(1));
        let mut buf = Vec::new();
        enc.encode_address(sid(9), &mut buf); // FULL, remembered
        enc.encode_address(sid(9), &mut buf); // now ABBREV

        let mut dec = DecodeContext::new(sid(1));
        let mut pos = 0;
        assert_eq!(dec.decode_address(&buf, &mut pos).unwrap(), sid(9));
        assert_eq!(dec.decode_address(&buf, &mut pos).unwrap(), sid(9));
        assert_eq!(pos, buf.len());
        // second form should be much shorter than the first (full) form
        assert!(buf.len() < 2 * (1 + Sid::LEN));
    }

    #[test]
    fn broadcast_sentinel_round_trips() {
        let mut enc = EncodeContext::new(sid(1));
        let mut buf = Vec::new();
        enc.encode_address(Sid::BROADCAST, &mut buf);
        assert_eq!(buf, vec![TAG_BROADCAST]);

        let mut dec = DecodeContext::new(sid(1));
        let mut pos = 0;
        assert!(dec.decode_address(&buf, &mut pos).unwrap().is_broadcast());
    }

    #[test]
    fn unresolvable_abbreviation_is_reported_but_recoverable() {
        // Craft an ABBREV pointing at an out-of-range index.
        let mut buf = vec![TAG_ABBREV];
        buf.extend_from_slice(&[0xAA; ABBREV_PREFIX_LEN]);
        buf.push(200); // no such index

        let mut dec = DecodeContext::new(sid(1));
        let mut pos = 0;
        let err = dec.decode_address(&buf, &mut pos).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAddress { .. }));
        assert_eq!(dec.invalid_addresses, 1);
    }

    #[test]
    fn previous_sender_defaults_to_envelope_sender() {
        let buf = vec![TAG_PREVIOUS_SENDER];
        let mut dec = DecodeContext::new(sid(1));
        let mut pos = 0;
        assert_eq!(dec.decode_address(&buf, &mut pos).unwrap(), sid(1));
    }
}
