//! Round-trip and robustness properties for the ensemble codec (spec §8).

use proptest::prelude::*;
use relaymesh_proto::{
    codec,
    envelope::{Encap, Envelope},
    header::PayloadHeader,
    payloads::DecodedPayload,
    sid::Sid,
    RecordOutcome,
};

fn arb_sid() -> impl Strategy<Value = Sid> {
    proptest::array::uniform32(any::<u8>()).prop_map(Sid::from_bytes)
}

fn arb_header(source: Sid) -> impl Strategy<Value = PayloadHeader> {
    (arb_sid(), arb_sid(), any::<bool>(), 0u8..=31, 0u8..=3).prop_map(
        move |(destination, nexthop, one_hop, ttl, queue)| PayloadHeader {
            source,
            destination: Some(destination),
            nexthop: Some(nexthop),
            broadcast_id: None,
            one_hop,
            ttl,
            queue,
            frame_type: relaymesh_proto::payloads::TYPE_DATA,
        },
    )
}

proptest! {
    #[test]
    fn single_ensemble_round_trips_for_any_data_payload(
        sender in arb_sid(),
        header in arb_sid().prop_flat_map(arb_header),
        body in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let envelope = Envelope { encap: Encap::Single, sender, unicast: true, interface_number: None, sequence: None };
        let header = PayloadHeader { source: sender, ..header };
        let payload = DecodedPayload::Data(body);

        let buf = codec::encode(&envelope, &[(header, payload.clone())]);
        let decoded = codec::decode(&buf).unwrap();

        prop_assert_eq!(decoded.envelope, envelope);
        prop_assert_eq!(decoded.records.len(), 1);
        prop_assert_eq!(&decoded.records[0], &RecordOutcome::Ok { header, payload });
    }

    #[test]
    fn overlay_ensemble_preserves_record_order(
        sender in arb_sid(),
        headers in proptest::collection::vec(arb_sid().prop_flat_map(arb_header), 1..6),
        bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 1..6),
    ) {
        let envelope = Envelope { encap: Encap::Overlay, sender, unicast: false, interface_number: Some(1), sequence: Some(9) };
        let n = headers.len().min(bodies.len());
        let records: Vec<_> = headers
            .into_iter()
            .take(n)
            .map(|h| PayloadHeader { source: sender, ..h })
            .zip(bodies.into_iter().take(n).map(DecodedPayload::Data))
            .collect();

        let buf = codec::encode(&envelope, &records);
        let decoded = codec::decode(&buf).unwrap();

        prop_assert_eq!(decoded.records.len(), records.len());
        for (outcome, (header, payload)) in decoded.records.iter().zip(records.iter()) {
            prop_assert_eq!(outcome, &RecordOutcome::Ok { header: *header, payload: payload.clone() });
        }
    }

    #[test]
    fn decode_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = codec::decode(&bytes);
    }
}
