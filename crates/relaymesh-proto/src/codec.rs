//! Top-level ensemble codec: ties [`Envelope`], [`PayloadHeader`] and
//! [`DecodedPayload`] together (spec §4.1 Contract).
//!
//! `decode` never aborts an ensemble because of one bad payload record: a
//! record whose address can't be resolved, or whose payload body doesn't
//! parse for its declared type, is reported as [`RecordOutcome::Skipped`]
//! and decoding continues with the next record. Only a malformed envelope,
//! a length field that overruns the buffer, or a header byte that can't be
//! read at all aborts the whole ensemble.

use crate::{
    abbrev::{DecodeContext, EncodeContext},
    envelope::{Encap, Envelope},
    errors::{ProtocolError, Result},
    header::PayloadHeader,
    payloads::DecodedPayload,
    sid::Sid,
};

/// Outcome of decoding one payload record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Header and payload both decoded cleanly.
    Ok {
        /// The record's header.
        header: PayloadHeader,
        /// The record's decoded payload body.
        payload: DecodedPayload,
    },
    /// The record was dropped; the ensemble's remaining records (if their
    /// boundaries are still known) are still processed.
    Skipped {
        /// Why this record was dropped.
        reason: ProtocolError,
    },
}

/// A fully decoded ensemble: envelope metadata plus each payload record's
/// outcome, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    /// Parsed envelope metadata.
    pub envelope: Envelope,
    /// Per-record outcomes, in the order they appeared on the wire.
    pub records: Vec<RecordOutcome>,
    /// Count of address abbreviations that failed to resolve while
    /// decoding this ensemble (spec §4.1 `invalid_addresses`).
    pub invalid_addresses: u32,
}

/// Decode a complete ensemble from `buf`.
pub fn decode(buf: &[u8]) -> Result<Ensemble> {
    let (envelope, mut pos) = Envelope::decode(buf)?;
    let mut ctx = DecodeContext::new(envelope.sender);
    let mut records = Vec::new();

    match envelope.encap {
        Encap::Single => {
            let mut record_pos = pos;
            records.push(decode_record(buf, &mut record_pos, envelope.sender, &mut ctx)?);
        },
        Encap::Overlay => {
            while pos < buf.len() {
                let len_end = pos + 2;
                let len_bytes = buf.get(pos..len_end).ok_or(ProtocolError::Truncated {
                    expected: 2,
                    actual: buf.len().saturating_sub(pos),
                })?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                pos = len_end;

                let record_end = pos + len;
                let record_buf = buf.get(pos..record_end).ok_or(ProtocolError::LengthExceedsBuffer {
                    declared: len,
                    remaining: buf.len().saturating_sub(pos),
                })?;
                pos = record_end;

                let mut record_pos = 0usize;
                records.push(decode_record(record_buf, &mut record_pos, envelope.sender, &mut ctx)?);
            }
        },
    }

    Ok(Ensemble { envelope, records, invalid_addresses: ctx.invalid_addresses })
}

fn decode_record(
    buf: &[u8],
    pos: &mut usize,
    envelope_sender: Sid,
    ctx: &mut DecodeContext,
) -> Result<RecordOutcome> {
    let header = match PayloadHeader::decode(buf, pos, envelope_sender, ctx) {
        Ok(header) => header,
        Err(reason @ ProtocolError::UnknownAddress { .. }) => return Ok(RecordOutcome::Skipped { reason }),
        Err(e) => return Err(e),
    };
    let payload_buf = &buf[*pos..];
    match DecodedPayload::decode(header.frame_type, payload_buf) {
        Ok(payload) => Ok(RecordOutcome::Ok { header, payload }),
        Err(reason) => Ok(RecordOutcome::Skipped { reason }),
    }
}

/// Encode a single record's header and payload body.
pub fn encode_header(
    envelope_sender: Sid,
    ctx: &mut EncodeContext,
    header: &PayloadHeader,
    payload: &DecodedPayload,
    out: &mut Vec<u8>,
) {
    header.encode(envelope_sender, ctx, out);
    payload.encode(out);
}

/// Encode a full ensemble. `records.len()` must be exactly 1 when
/// `envelope.encap` is [`Encap::Single`].
pub fn encode(envelope: &Envelope, records: &[(PayloadHeader, DecodedPayload)]) -> Vec<u8> {
    let mut out = Vec::new();
    envelope.encode(&mut out);
    let mut ctx = EncodeContext::new(envelope.sender);

    match envelope.encap {
        Encap::Single => {
            debug_assert_eq!(records.len(), 1, "ENCAP::Single carries exactly one record");
            if let Some((header, payload)) = records.first() {
                encode_header(envelope.sender, &mut ctx, header, payload, &mut out);
            }
        },
        Encap::Overlay => {
            for (header, payload) in records {
                let mut record_buf = Vec::new();
                encode_header(envelope.sender, &mut ctx, header, payload, &mut record_buf);
                #[allow(clippy::cast_possible_truncation)]
                out.extend_from_slice(&(record_buf.len() as u16).to_be_bytes());
                out.extend_from_slice(&record_buf);
            }
        },
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::TYPE_DATA;

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    fn sample_header(source: Sid, destination: Sid) -> PayloadHeader {
        PayloadHeader {
            source,
            destination: Some(destination),
            nexthop: Some(destination),
            broadcast_id: None,
            one_hop: false,
            ttl: 10,
            queue: 1,
            frame_type: TYPE_DATA,
        }
    }

    #[test]
    fn single_ensemble_round_trips() {
        let envelope = Envelope {
            encap: Encap::Single,
            sender: sid(1),
            unicast: true,
            interface_number: None,
            sequence: None,
        };
        let header = sample_header(sid(1), sid(2));
        let payload = DecodedPayload::Data(vec![42, 43]);
        let buf = encode(&envelope, &[(header, payload.clone())]);

        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.envelope, envelope);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0], RecordOutcome::Ok { header, payload });
    }

    #[test]
    fn overlay_ensemble_with_multiple_records_round_trips() {
        let envelope = Envelope {
            encap: Encap::Overlay,
            sender: sid(1),
            unicast: false,
            interface_number: Some(0),
            sequence: Some(5),
        };
        let records = vec![
            (sample_header(sid(1), sid(2)), DecodedPayload::Data(vec![1])),
            (sample_header(sid(1), sid(3)), DecodedPayload::Data(vec![2, 3])),
        ];
        let buf = encode(&envelope, &records);

        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.records.len(), 2);
        for (outcome, (header, payload)) in decoded.records.iter().zip(records.iter()) {
            assert_eq!(*outcome, RecordOutcome::Ok { header: *header, payload: payload.clone() });
        }
    }

    #[test]
    fn unresolvable_address_skips_only_that_record() {
        let envelope = Envelope {
            encap: Encap::Overlay,
            sender: sid(1),
            unicast: false,
            interface_number: None,
            sequence: None,
        };
        let good_header = sample_header(sid(1), sid(2));
        let good_payload = DecodedPayload::Data(vec![7]);

        let mut good_record_buf = Vec::new();
        let mut ctx = EncodeContext::new(envelope.sender);
        encode_header(envelope.sender, &mut ctx, &good_header, &good_payload, &mut good_record_buf);

        // Hand-craft a bad record: flags=0 (not sender-same, not broadcast,
        // not one-hop, not legacy-type), then an ABBREV tag pointing past
        // the resolved table.
        let mut bad_record_buf = vec![0u8];
        bad_record_buf.push(0x01); // TAG_ABBREV
        bad_record_buf.extend_from_slice(&[0xAA; 6]);
        bad_record_buf.push(250); // bogus index

        let mut out = Vec::new();
        envelope.encode(&mut out);
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(bad_record_buf.len() as u16).to_be_bytes());
        out.extend_from_slice(&bad_record_buf);
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(good_record_buf.len() as u16).to_be_bytes());
        out.extend_from_slice(&good_record_buf);

        let decoded = decode(&out).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert!(matches!(decoded.records[0], RecordOutcome::Skipped { .. }));
        assert_eq!(
            decoded.records[1],
            RecordOutcome::Ok { header: good_header, payload: good_payload }
        );
        assert_eq!(decoded.invalid_addresses, 1);
    }

    #[test]
    fn overlay_length_exceeding_buffer_is_malformed() {
        let envelope = Envelope {
            encap: Encap::Overlay,
            sender: sid(1),
            unicast: false,
            interface_number: None,
            sequence: None,
        };
        let mut buf = Vec::new();
        envelope.encode(&mut buf);
        buf.extend_from_slice(&0xFFFFu16.to_be_bytes());
        buf.extend_from_slice(&[1, 2, 3]);

        assert!(matches!(decode(&buf), Err(ProtocolError::LengthExceedsBuffer { .. })));
    }
}
