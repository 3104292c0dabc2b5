//! Per-payload header (spec §4.1).
//!
//! `[flags][source?][broadcast-id | dest][nexthop?][ttl/queue?][type?]`.
//! Every field but `flags` is conditional: `SENDER_SAME` elides the source
//! address (it's the envelope sender), `TO_BROADCAST` switches between a
//! broadcast-id and a destination+nexthop pair, `ONE_HOP` elides the
//! nexthop (equal to destination) and the ttl/queue byte (frames destined
//! for a single link hop carry an implicit ttl of 1, queue class 0), and
//! `LEGACY_TYPE` elides the type byte (implicit [`TYPE_DATA`]).

use crate::{
    abbrev::{DecodeContext, EncodeContext},
    errors::{ProtocolError, Result},
    sid::Sid,
};

const FLAG_SENDER_SAME: u8 = 0x01;
const FLAG_TO_BROADCAST: u8 = 0x02;
const FLAG_ONE_HOP: u8 = 0x04;
const FLAG_LEGACY_TYPE: u8 = 0x08;

/// Frame type byte for ordinary application data (the implicit default when
/// `LEGACY_TYPE` is absent).
pub const TYPE_DATA: u8 = 0;

/// Maximum TTL value representable in the 5-bit ttl/queue byte.
pub const MAX_TTL: u8 = 31;
/// Maximum queue-class value representable in the 5-bit ttl/queue byte.
pub const MAX_QUEUE: u8 = 3;

/// Length of a broadcast-id in bytes.
pub const BROADCAST_ID_LEN: usize = 8;

/// Decoded per-payload header, with addresses already resolved to concrete
/// SIDs via the ensemble's abbreviation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Source subscriber.
    pub source: Sid,
    /// Destination subscriber, or `None` for a broadcast.
    pub destination: Option<Sid>,
    /// Resolved next-hop subscriber. Meaningless for broadcasts; equal to
    /// `destination` for one-hop unicasts.
    pub nexthop: Option<Sid>,
    /// Broadcast dedup id, present only for multi-hop broadcasts.
    pub broadcast_id: Option<[u8; BROADCAST_ID_LEN]>,
    /// `true` if this payload is addressed to a single link hop only (never
    /// forwarded further; ttl/queue are implicit).
    pub one_hop: bool,
    /// Hops remaining, 0..=31.
    pub ttl: u8,
    /// Queue class, 0..=3.
    pub queue: u8,
    /// Frame type byte (0 = DATA).
    pub frame_type: u8,
}

impl PayloadHeader {
    fn flags(&self, envelope_sender: Sid) -> u8 {
        let mut flags = 0u8;
        if self.source == envelope_sender {
            flags |= FLAG_SENDER_SAME;
        }
        if self.destination.is_none() {
            flags |= FLAG_TO_BROADCAST;
        }
        if self.one_hop {
            flags |= FLAG_ONE_HOP;
        }
        if self.frame_type != TYPE_DATA {
            flags |= FLAG_LEGACY_TYPE;
        }
        flags
    }

    /// Encode this header, choosing the smallest wire form given what `ctx`
    /// has already emitted for this ensemble.
    pub fn encode(&self, envelope_sender: Sid, ctx: &mut EncodeContext, out: &mut Vec<u8>) {
        debug_assert!(self.ttl <= MAX_TTL, "ttl out of range");
        debug_assert!(self.queue <= MAX_QUEUE, "queue class out of range");

        let flags = self.flags(envelope_sender);
        out.push(flags);

        if flags & FLAG_SENDER_SAME == 0 {
            ctx.encode_address(self.source, out);
        }

        if flags & FLAG_TO_BROADCAST != 0 {
            if flags & FLAG_ONE_HOP == 0 {
                let id = self.broadcast_id.unwrap_or([0u8; BROADCAST_ID_LEN]);
                out.extend_from_slice(&id);
            }
        } else {
            let dest = self.destination.unwrap_or(Sid::BROADCAST);
            ctx.encode_address(dest, out);
            if flags & FLAG_ONE_HOP == 0 {
                let nexthop = self.nexthop.unwrap_or(dest);
                ctx.encode_address(nexthop, out);
            }
        }

        if flags & FLAG_ONE_HOP == 0 {
            out.push((self.queue << 5) | self.ttl);
        }

        if flags & FLAG_LEGACY_TYPE != 0 {
            out.push(self.frame_type);
        }

        ctx.set_last_record_source(self.source);
    }

    /// Decode one header from `buf` starting at `*pos`, advancing `pos`
    /// past it. On [`ProtocolError::UnknownAddress`], the caller should
    /// drop the rest of this payload record but keep decoding the ensemble
    /// (spec §4.1, §7).
    pub fn decode(
        buf: &[u8],
        pos: &mut usize,
        envelope_sender: Sid,
        ctx: &mut DecodeContext,
    ) -> Result<Self> {
        let flags = read_u8(buf, pos)?;

        let source =
            if flags & FLAG_SENDER_SAME != 0 { envelope_sender } else { ctx.decode_address(buf, pos)? };

        let (destination, broadcast_id) = if flags & FLAG_TO_BROADCAST != 0 {
            if flags & FLAG_ONE_HOP == 0 {
                let end = *pos + BROADCAST_ID_LEN;
                let bytes = buf.get(*pos..end).ok_or(ProtocolError::Truncated {
                    expected: BROADCAST_ID_LEN,
                    actual: buf.len().saturating_sub(*pos),
                })?;
                let mut id = [0u8; BROADCAST_ID_LEN];
                id.copy_from_slice(bytes);
                *pos = end;
                (None, Some(id))
            } else {
                (None, None)
            }
        } else {
            let dest = ctx.decode_address(buf, pos)?;
            (Some(dest), None)
        };

        let nexthop = if flags & FLAG_TO_BROADCAST != 0 {
            None
        } else if flags & FLAG_ONE_HOP == 0 {
            Some(ctx.decode_address(buf, pos)?)
        } else {
            destination
        };

        let (ttl, queue) = if flags & FLAG_ONE_HOP == 0 {
            let b = read_u8(buf, pos)?;
            (b & 0x1F, (b >> 5) & 0x03)
        } else {
            (1, 0)
        };

        let frame_type = if flags & FLAG_LEGACY_TYPE != 0 { read_u8(buf, pos)? } else { TYPE_DATA };

        ctx.set_last_record_source(source);

        Ok(Self {
            source,
            destination,
            nexthop,
            broadcast_id,
            one_hop: flags & FLAG_ONE_HOP != 0,
            ttl,
            queue,
            frame_type,
        })
    }
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8> {
    let b = *buf.get(*pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
    *pos += 1;
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    fn round_trip(header: PayloadHeader, envelope_sender: Sid) -> PayloadHeader {
        let mut enc_ctx = EncodeContext::new(envelope_sender);
        let mut buf = Vec::new();
        header.encode(envelope_sender, &mut enc_ctx, &mut buf);

        let mut dec_ctx = DecodeContext::new(envelope_sender);
        let mut pos = 0;
        let decoded = PayloadHeader::decode(&buf, &mut pos, envelope_sender, &mut dec_ctx).unwrap();
        assert_eq!(pos, buf.len());
        decoded
    }

    #[test]
    fn unicast_multi_hop_round_trips() {
        let envelope_sender = sid(1);
        let header = PayloadHeader {
            source: sid(1),
            destination: Some(sid(2)),
            nexthop: Some(sid(3)),
            broadcast_id: None,
            one_hop: false,
            ttl: 5,
            queue: 2,
            frame_type: TYPE_DATA,
        };
        assert_eq!(round_trip(header, envelope_sender), header);
    }

    #[test]
    fn broadcast_multi_hop_round_trips() {
        let envelope_sender = sid(1);
        let header = PayloadHeader {
            source: sid(1),
            destination: None,
            nexthop: None,
            broadcast_id: Some([0xAB; BROADCAST_ID_LEN]),
            one_hop: false,
            ttl: 31,
            queue: 0,
            frame_type: TYPE_DATA,
        };
        assert_eq!(round_trip(header, envelope_sender), header);
    }

    #[test]
    fn one_hop_unicast_omits_ttl_and_nexthop() {
        let envelope_sender = sid(1);
        let header = PayloadHeader {
            source: sid(1),
            destination: Some(sid(4)),
            nexthop: Some(sid(4)),
            broadcast_id: None,
            one_hop: true,
            ttl: 1,
            queue: 0,
            frame_type: TYPE_DATA,
        };
        let decoded = round_trip(header, envelope_sender);
        assert_eq!(decoded, header);
    }

    #[test]
    fn legacy_type_round_trips() {
        let envelope_sender = sid(1);
        let header = PayloadHeader {
            source: sid(1),
            destination: Some(sid(2)),
            nexthop: Some(sid(2)),
            broadcast_id: None,
            one_hop: false,
            ttl: 3,
            queue: 1,
            frame_type: 7,
        };
        assert_eq!(round_trip(header, envelope_sender), header);
    }

    #[test]
    fn sender_different_from_envelope_round_trips() {
        let envelope_sender = sid(1);
        let header = PayloadHeader {
            source: sid(9),
            destination: Some(sid(2)),
            nexthop: Some(sid(2)),
            broadcast_id: None,
            one_hop: false,
            ttl: 10,
            queue: 3,
            frame_type: TYPE_DATA,
        };
        assert_eq!(round_trip(header, envelope_sender), header);
    }

    #[test]
    fn truncated_header_is_malformed_not_panic() {
        let buf = [FLAG_TO_BROADCAST];
        let mut ctx = DecodeContext::new(sid(1));
        let mut pos = 0;
        let err = PayloadHeader::decode(&buf, &mut pos, sid(1), &mut ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }
}
