//! Payload bodies dispatched by the per-payload header's type byte
//! (spec §6, Design Notes).
//!
//! The wire carries a single `u8` type; we dispatch it into a tagged enum
//! rather than threading the byte through every call site. Unknown type
//! bytes are preserved as opaque data rather than rejected, since the
//! ensemble around them is otherwise well-formed.

pub mod nodeannounce;
pub mod please_explain;
pub mod rhizome;
pub mod selfannounce;

use crate::errors::Result;

/// Frame type byte values relevant to the core (spec §6).
pub const TYPE_DATA: u8 = 0;
/// See [`TYPE_DATA`].
pub const TYPE_DATA_VOICE: u8 = 1;
/// See [`TYPE_DATA`].
pub const TYPE_SELFANNOUNCE_ACK: u8 = 2;
/// See [`TYPE_DATA`].
pub const TYPE_NODEANNOUNCE: u8 = 3;
/// See [`TYPE_DATA`].
pub const TYPE_RHIZOME_ADVERT: u8 = 4;
/// See [`TYPE_DATA`].
pub const TYPE_PLEASEEXPLAIN: u8 = 5;

/// A payload body, decoded according to the header's type byte.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    /// Round-trip acknowledgement of a self-announcement.
    SelfAnnounceAck(selfannounce::SelfAnnounceAck),
    /// Route advertisement.
    NodeAnnounce(nodeannounce::NodeAnnounce),
    /// Content-store advertisement.
    RhizomeAdvert(rhizome::RhizomeAdvert),
    /// Ordinary or voice application data; opaque to the core.
    Data(Vec<u8>),
    /// A request to explain a previously rejected payload record.
    PleaseExplain(please_explain::PleaseExplain),
    /// A type byte the core doesn't interpret, kept opaque for forwarding.
    LegacyUnknown(u8, Vec<u8>),
}

impl DecodedPayload {
    /// Decode `buf` (the payload body, not including the header) according
    /// to `frame_type`.
    pub fn decode(frame_type: u8, buf: &[u8]) -> Result<Self> {
        match frame_type {
            TYPE_DATA | TYPE_DATA_VOICE => Ok(Self::Data(buf.to_vec())),
            TYPE_SELFANNOUNCE_ACK => {
                Ok(Self::SelfAnnounceAck(selfannounce::SelfAnnounceAck::decode(buf)?))
            },
            TYPE_NODEANNOUNCE => Ok(Self::NodeAnnounce(nodeannounce::NodeAnnounce::decode(buf)?)),
            TYPE_RHIZOME_ADVERT => Ok(Self::RhizomeAdvert(rhizome::RhizomeAdvert::decode(buf)?)),
            TYPE_PLEASEEXPLAIN => {
                Ok(Self::PleaseExplain(please_explain::PleaseExplain::decode(buf)?))
            },
            other => Ok(Self::LegacyUnknown(other, buf.to_vec())),
        }
    }

    /// Encode the payload body (not including the header) into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Data(bytes) | Self::LegacyUnknown(_, bytes) => out.extend_from_slice(bytes),
            Self::SelfAnnounceAck(ack) => ack.encode(out),
            Self::NodeAnnounce(announce) => announce.encode(out),
            Self::RhizomeAdvert(advert) => advert.encode(out),
            Self::PleaseExplain(pe) => pe.encode(out),
        }
    }

    /// The header type byte this payload would be tagged with on the wire.
    #[must_use]
    pub fn frame_type(&self) -> u8 {
        match self {
            Self::Data(_) => TYPE_DATA,
            Self::SelfAnnounceAck(_) => TYPE_SELFANNOUNCE_ACK,
            Self::NodeAnnounce(_) => TYPE_NODEANNOUNCE,
            Self::RhizomeAdvert(_) => TYPE_RHIZOME_ADVERT,
            Self::PleaseExplain(_) => TYPE_PLEASEEXPLAIN,
            Self::LegacyUnknown(t, _) => *t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_round_trips() {
        let payload = DecodedPayload::Data(vec![1, 2, 3]);
        let mut buf = Vec::new();
        payload.encode(&mut buf);
        assert_eq!(DecodedPayload::decode(TYPE_DATA, &buf).unwrap(), payload);
    }

    #[test]
    fn unknown_type_is_preserved_opaque() {
        let payload = DecodedPayload::LegacyUnknown(200, vec![9, 9]);
        let mut buf = Vec::new();
        payload.encode(&mut buf);
        assert_eq!(DecodedPayload::decode(200, &buf).unwrap(), payload);
    }

    #[test]
    fn frame_type_matches_decoded_variant() {
        let payload = DecodedPayload::NodeAnnounce(nodeannounce::NodeAnnounce::default());
        assert_eq!(payload.frame_type(), TYPE_NODEANNOUNCE);
    }
}
