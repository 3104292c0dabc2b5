//! Node-announce payload (spec §6): a sequence of 8-byte tuples
//! `(SID_prefix[6] | u8 score | u8 gateways_en_route)`, repeated until the
//! payload is exhausted. Each tuple is this sender's report of a route it
//! knows about (spec §4.4).

use crate::errors::{ProtocolError, Result};

/// Width of the SID prefix carried in each tuple. Matches
/// [`crate::abbrev::ABBREV_PREFIX_LEN`] by convention, not by coupling: the
/// two serve different purposes and could diverge.
pub const SID_PREFIX_LEN: usize = 6;

/// Encoded size of one tuple.
pub const ENTRY_LEN: usize = SID_PREFIX_LEN + 2;

/// One reported route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAnnounceEntry {
    /// First 6 bytes of the reported destination's SID.
    pub sid_prefix: [u8; SID_PREFIX_LEN],
    /// Reported path score, 0..=255.
    pub score: u8,
    /// Count of gateway hops between here and the destination.
    pub gateways_en_route: u8,
}

/// A full node-announce payload: every route the sender wants to report in
/// this tick (spec "Supplemented Features": tick piggybacking).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeAnnounce {
    /// Reported routes, in the order the sender packed them.
    pub entries: Vec<NodeAnnounceEntry>,
}

impl NodeAnnounce {
    /// Encode into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            out.extend_from_slice(&entry.sid_prefix);
            out.push(entry.score);
            out.push(entry.gateways_en_route);
        }
    }

    /// Decode from a payload slice whose length must be an exact multiple
    /// of [`ENTRY_LEN`].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() % ENTRY_LEN != 0 {
            return Err(ProtocolError::Truncated { expected: ENTRY_LEN, actual: buf.len() % ENTRY_LEN });
        }
        let entries = buf
            .chunks_exact(ENTRY_LEN)
            .map(|chunk| {
                let mut sid_prefix = [0u8; SID_PREFIX_LEN];
                sid_prefix.copy_from_slice(&chunk[..SID_PREFIX_LEN]);
                NodeAnnounceEntry {
                    sid_prefix,
                    score: chunk[SID_PREFIX_LEN],
                    gateways_en_route: chunk[SID_PREFIX_LEN + 1],
                }
            })
            .collect();
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_several_entries() {
        let announce = NodeAnnounce {
            entries: vec![
                NodeAnnounceEntry { sid_prefix: [1; SID_PREFIX_LEN], score: 200, gateways_en_route: 0 },
                NodeAnnounceEntry { sid_prefix: [2; SID_PREFIX_LEN], score: 50, gateways_en_route: 2 },
            ],
        };
        let mut buf = Vec::new();
        announce.encode(&mut buf);
        assert_eq!(buf.len(), 2 * ENTRY_LEN);
        assert_eq!(NodeAnnounce::decode(&buf).unwrap(), announce);
    }

    #[test]
    fn empty_payload_decodes_to_no_entries() {
        assert_eq!(NodeAnnounce::decode(&[]).unwrap(), NodeAnnounce::default());
    }

    #[test]
    fn rejects_partial_trailing_entry() {
        let buf = vec![0u8; ENTRY_LEN + 3];
        assert!(NodeAnnounce::decode(&buf).is_err());
    }
}
