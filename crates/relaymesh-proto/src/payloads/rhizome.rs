//! Content-store advertisement payload (`RHIZOME_ADVERT`, spec §6).
//!
//! Byte 0 is a version tag in `1..=4`. Versions 3 and 4 carry a 2-byte
//! `http_port` right after the version byte. Versions 1 and 3 then carry
//! zero or more length-prefixed manifest blocks, terminated by a `0xff`
//! byte, followed by zero or more fixed-size [`Bar`] records; versions 2
//! and 4 skip the manifest blocks and start with BARs directly.

use crate::errors::{ProtocolError, Result};

/// Terminator byte for the manifest-block list (versions 1, 3).
const MANIFEST_LIST_END: u8 = 0xff;

/// Encoded size of one [`Bar`].
pub const BAR_LEN: usize = 32;

const MANIFEST_ID_PREFIX_LEN: usize = 15;
const VERSION_LEN: usize = 7;

/// Latitude bias/range used by the geographic bounding box encoding
/// (`(value + bias) * 65535 / range`, clamped to the valid input range
/// before scaling).
pub const LAT_BIAS: f64 = 90.0;
/// See [`LAT_BIAS`].
pub const LAT_RANGE: f64 = 180.0;
/// Longitude bias used by the geographic bounding box encoding.
pub const LONG_BIAS: f64 = 180.0;
/// Longitude range used by the geographic bounding box encoding.
pub const LONG_RANGE: f64 = 360.0;

fn encode_geo(value: f64, bias: f64, range: f64, min: f64, max: f64) -> u16 {
    let clamped = value.clamp(min, max);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = ((clamped + bias) * (65535.0 / range)) as u16;
    scaled
}

fn decode_geo(raw: u16, bias: f64, range: f64) -> f64 {
    f64::from(raw) * (range / 65535.0) - bias
}

/// Bundle Advertisement Record: a 32-byte precis of an advertised content
/// object, carrying just enough to drive flooding decisions without the
/// full manifest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    /// First 15 bytes of the manifest id.
    pub manifest_id_prefix: [u8; MANIFEST_ID_PREFIX_LEN],
    /// `floor(log2(payload_length))`, 0 for an empty payload.
    pub log2_payload_length: u8,
    /// Low-order 56 bits of the manifest version, big-endian.
    pub version_low56: [u8; VERSION_LEN],
    /// Minimum latitude of the advertised bounding box, degrees.
    pub min_lat: f64,
    /// Minimum longitude of the advertised bounding box, degrees.
    pub min_long: f64,
    /// Maximum latitude of the advertised bounding box, degrees.
    pub max_lat: f64,
    /// Maximum longitude of the advertised bounding box, degrees.
    pub max_long: f64,
    /// Remaining hops this bundle advertisement may travel.
    pub ttl: u8,
}

impl Bar {
    /// Encode into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.manifest_id_prefix);
        out.push(self.log2_payload_length);
        out.extend_from_slice(&self.version_low56);
        out.extend_from_slice(&encode_geo(self.min_lat, LAT_BIAS, LAT_RANGE, -90.0, 90.0).to_be_bytes());
        out.extend_from_slice(
            &encode_geo(self.min_long, LONG_BIAS, LONG_RANGE, -180.0, 180.0).to_be_bytes(),
        );
        out.extend_from_slice(&encode_geo(self.max_lat, LAT_BIAS, LAT_RANGE, -90.0, 90.0).to_be_bytes());
        out.extend_from_slice(
            &encode_geo(self.max_long, LONG_BIAS, LONG_RANGE, -180.0, 180.0).to_be_bytes(),
        );
        out.push(self.ttl);
    }

    /// Decode from an exact `BAR_LEN`-byte slice.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != BAR_LEN {
            return Err(ProtocolError::Truncated { expected: BAR_LEN, actual: buf.len() });
        }
        let mut manifest_id_prefix = [0u8; MANIFEST_ID_PREFIX_LEN];
        manifest_id_prefix.copy_from_slice(&buf[0..15]);
        let log2_payload_length = buf[15];
        let mut version_low56 = [0u8; VERSION_LEN];
        version_low56.copy_from_slice(&buf[16..23]);
        let min_lat = decode_geo(u16::from_be_bytes([buf[23], buf[24]]), LAT_BIAS, LAT_RANGE);
        let min_long = decode_geo(u16::from_be_bytes([buf[25], buf[26]]), LONG_BIAS, LONG_RANGE);
        let max_lat = decode_geo(u16::from_be_bytes([buf[27], buf[28]]), LAT_BIAS, LAT_RANGE);
        let max_long = decode_geo(u16::from_be_bytes([buf[29], buf[30]]), LONG_BIAS, LONG_RANGE);
        let ttl = buf[31];
        Ok(Self {
            manifest_id_prefix,
            log2_payload_length,
            version_low56,
            min_lat,
            min_long,
            max_lat,
            max_long,
            ttl,
        })
    }
}

/// Full `RHIZOME_ADVERT` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RhizomeAdvert {
    /// Wire version, 1..=4.
    pub version: u8,
    /// Present for versions 3 and 4.
    pub http_port: Option<u16>,
    /// Opaque manifest blocks, present only for versions 1 and 3.
    pub manifest_blocks: Vec<Vec<u8>>,
    /// Advertised bundles.
    pub bars: Vec<Bar>,
}

impl RhizomeAdvert {
    fn has_http_port(version: u8) -> bool {
        matches!(version, 3 | 4)
    }

    fn has_manifest_blocks(version: u8) -> bool {
        matches!(version, 1 | 3)
    }

    /// Encode into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        if let Some(port) = self.http_port {
            out.extend_from_slice(&port.to_be_bytes());
        }
        if Self::has_manifest_blocks(self.version) {
            for block in &self.manifest_blocks {
                #[allow(clippy::cast_possible_truncation)]
                out.extend_from_slice(&(block.len() as u16).to_be_bytes());
                out.extend_from_slice(block);
            }
            out.push(MANIFEST_LIST_END);
        }
        for bar in &self.bars {
            bar.encode(out);
        }
    }

    /// Decode a whole payload slice.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let version = *buf.first().ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
        if !(1..=4).contains(&version) {
            return Err(ProtocolError::BadAddressForm(version));
        }
        pos += 1;

        let http_port = if Self::has_http_port(version) {
            let end = pos + 2;
            let bytes = buf.get(pos..end).ok_or(ProtocolError::Truncated {
                expected: 2,
                actual: buf.len().saturating_sub(pos),
            })?;
            pos = end;
            Some(u16::from_be_bytes([bytes[0], bytes[1]]))
        } else {
            None
        };

        let mut manifest_blocks = Vec::new();
        if Self::has_manifest_blocks(version) {
            loop {
                let tag = *buf.get(pos).ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
                if tag == MANIFEST_LIST_END {
                    pos += 1;
                    break;
                }
                let len_end = pos + 2;
                let len_bytes = buf.get(pos..len_end).ok_or(ProtocolError::Truncated {
                    expected: 2,
                    actual: buf.len().saturating_sub(pos),
                })?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                pos = len_end;
                let block_end = pos + len;
                let block = buf.get(pos..block_end).ok_or(ProtocolError::LengthExceedsBuffer {
                    declared: len,
                    remaining: buf.len().saturating_sub(pos),
                })?;
                manifest_blocks.push(block.to_vec());
                pos = block_end;
            }
        }

        let remainder = &buf[pos..];
        if remainder.len() % BAR_LEN != 0 {
            return Err(ProtocolError::Truncated {
                expected: BAR_LEN,
                actual: remainder.len() % BAR_LEN,
            });
        }
        let bars =
            remainder.chunks_exact(BAR_LEN).map(Bar::decode).collect::<Result<Vec<_>>>()?;

        Ok(Self { version, http_port, manifest_blocks, bars })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar(ttl: u8) -> Bar {
        Bar {
            manifest_id_prefix: [0xAB; MANIFEST_ID_PREFIX_LEN],
            log2_payload_length: 10,
            version_low56: [0, 0, 0, 0, 0, 1, 0],
            min_lat: -10.0,
            min_long: 20.0,
            max_lat: 5.0,
            max_long: 40.0,
            ttl,
        }
    }

    #[test]
    fn bar_round_trips_within_geo_precision() {
        let bar = sample_bar(7);
        let mut buf = Vec::new();
        bar.encode(&mut buf);
        assert_eq!(buf.len(), BAR_LEN);
        let decoded = Bar::decode(&buf).unwrap();
        assert_eq!(decoded.manifest_id_prefix, bar.manifest_id_prefix);
        assert_eq!(decoded.ttl, bar.ttl);
        assert!((decoded.min_lat - bar.min_lat).abs() < 0.01);
        assert!((decoded.max_long - bar.max_long).abs() < 0.01);
    }

    #[test]
    fn version_2_skips_port_and_manifest_blocks() {
        let advert =
            RhizomeAdvert { version: 2, http_port: None, manifest_blocks: vec![], bars: vec![sample_bar(1)] };
        let mut buf = Vec::new();
        advert.encode(&mut buf);
        assert_eq!(buf.len(), 1 + BAR_LEN);
        assert_eq!(RhizomeAdvert::decode(&buf).unwrap(), advert);
    }

    #[test]
    fn version_3_carries_port_and_manifest_blocks() {
        let advert = RhizomeAdvert {
            version: 3,
            http_port: Some(8080),
            manifest_blocks: vec![b"hello".to_vec(), b"world!".to_vec()],
            bars: vec![sample_bar(2), sample_bar(3)],
        };
        let mut buf = Vec::new();
        advert.encode(&mut buf);
        assert_eq!(RhizomeAdvert::decode(&buf).unwrap(), advert);
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(RhizomeAdvert::decode(&[9]).is_err());
    }

    #[test]
    fn latitude_clamps_to_valid_range() {
        assert_eq!(encode_geo(1000.0, LAT_BIAS, LAT_RANGE, -90.0, 90.0), encode_geo(90.0, LAT_BIAS, LAT_RANGE, -90.0, 90.0));
    }
}
