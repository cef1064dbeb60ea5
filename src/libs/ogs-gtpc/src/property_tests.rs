//! Property-Based Tests for GTPv2-C Encoding
//!
//! IE trees and messages survive an encode/decode cycle unchanged, grouped
//! IEs keep their length consistent with their children under mutation, and
//! removing an absent child is a no-op.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::v2::header::Gtp2MessageType;
    use crate::v2::ie::{GroupedIeTable, Gtp2Ie, Gtp2IeType};
    use crate::v2::message::Gtp2Message;
    use crate::v2::types::{decode_bcd, encode_bcd, MAX_U24};

    /// Leaf IE of any type outside the grouped set, types below 250
    fn leaf_ie() -> impl Strategy<Value = Gtp2Ie> {
        let table = GroupedIeTable::default();
        (
            (0u8..250).prop_filter("leaf type", move |t| !table.contains(*t)),
            0u8..16,
            prop::collection::vec(any::<u8>(), 0..32),
        )
            .prop_map(|(ie_type, instance, value)| Gtp2Ie::from_slice(ie_type, instance, &value))
    }

    fn ie_tree() -> impl Strategy<Value = Gtp2Ie> {
        leaf_ie().prop_recursive(3, 32, 4, |inner| {
            (0u8..16, prop::collection::vec(inner, 0..4)).prop_map(|(instance, children)| {
                Gtp2Ie::grouped(Gtp2IeType::BearerContext as u8, instance, children)
            })
        })
    }

    #[derive(Debug, Clone)]
    enum ChildOp {
        Add(Gtp2Ie),
        Remove(u8, u8),
    }

    fn child_op() -> impl Strategy<Value = ChildOp> {
        prop_oneof![
            leaf_ie().prop_map(ChildOp::Add),
            (0u8..250, 0u8..16).prop_map(|(t, i)| ChildOp::Remove(t, i)),
        ]
    }

    fn message_type() -> impl Strategy<Value = Gtp2MessageType> {
        prop::sample::select(vec![
            Gtp2MessageType::EchoRequest,
            Gtp2MessageType::EchoResponse,
            Gtp2MessageType::CreateSessionRequest,
            Gtp2MessageType::CreateSessionResponse,
            Gtp2MessageType::ModifyBearerRequest,
            Gtp2MessageType::ModifyBearerResponse,
            Gtp2MessageType::DeleteSessionRequest,
            Gtp2MessageType::DeleteSessionResponse,
            Gtp2MessageType::CreateBearerRequest,
            Gtp2MessageType::UpdateBearerResponse,
            Gtp2MessageType::DeleteBearerRequest,
            Gtp2MessageType::ReleaseAccessBearersRequest,
            Gtp2MessageType::DownlinkDataNotification,
            Gtp2MessageType::SuspendNotification,
        ])
    }

    fn assert_grouped_consistent(ie: &Gtp2Ie) -> Result<(), TestCaseError> {
        let sum: usize = ie.children().iter().map(Gtp2Ie::encoded_len).sum();
        prop_assert_eq!(ie.length(), sum);
        let mut concatenated = Vec::with_capacity(sum);
        for child in ie.children() {
            concatenated.extend_from_slice(&child.to_bytes().unwrap());
        }
        prop_assert_eq!(ie.value().as_ref(), concatenated.as_slice());
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_ie_round_trip(ie in ie_tree()) {
            let bytes = ie.to_bytes().unwrap();
            let (decoded, consumed) = Gtp2Ie::parse(&bytes).unwrap();
            prop_assert_eq!(consumed, ie.encoded_len());
            prop_assert_eq!(decoded, ie);
        }

        #[test]
        fn prop_ie_stream_round_trip(ies in prop::collection::vec(ie_tree(), 0..6)) {
            let mut bytes = Vec::new();
            for ie in &ies {
                bytes.extend_from_slice(&ie.to_bytes().unwrap());
            }
            prop_assert_eq!(Gtp2Ie::decode_all(&bytes).unwrap(), ies);
        }

        #[test]
        fn prop_grouped_length_invariant(
            initial in prop::collection::vec(leaf_ie(), 0..4),
            ops in prop::collection::vec(child_op(), 0..16),
        ) {
            let mut bc = Gtp2Ie::bearer_context(initial);
            assert_grouped_consistent(&bc)?;
            for op in ops {
                match op {
                    ChildOp::Add(child) => bc.add_child(child).unwrap(),
                    ChildOp::Remove(t, i) => {
                        bc.remove_child(t, i).unwrap();
                    }
                }
                assert_grouped_consistent(&bc)?;
            }
        }

        #[test]
        fn prop_remove_absent_child_is_noop(
            children in prop::collection::vec(leaf_ie(), 0..6),
            instance in 0u8..16,
        ) {
            // leaf_ie never produces type 250
            let mut bc = Gtp2Ie::bearer_context(children);
            let before = bc.clone();
            prop_assert_eq!(bc.remove_child(250, instance).unwrap(), None);
            prop_assert_eq!(bc, before);
        }

        #[test]
        fn prop_message_round_trip(
            mtype in message_type(),
            teid in any::<u32>(),
            seq in any::<u32>(),
            ies in prop::collection::vec(ie_tree(), 0..8),
        ) {
            let msg = Gtp2Message::from_ies(mtype as u8, teid, seq, ies);
            let bytes = msg.marshal().unwrap();
            let parsed = Gtp2Message::parse(&bytes).unwrap();

            prop_assert_eq!(parsed.message_type(), mtype as u8);
            prop_assert_eq!(parsed.sequence(), seq & MAX_U24);
            prop_assert_eq!(parsed.header.teid, mtype.has_teid().then_some(teid));
            prop_assert_eq!(&parsed.body, &msg.body);
            prop_assert_eq!(parsed.marshal().unwrap(), bytes);
        }

        #[test]
        fn prop_bcd_round_trip(digits in "[0-9]{1,16}") {
            let encoded = encode_bcd(&digits).unwrap();
            prop_assert_eq!(encoded.len(), (digits.len() + 1) / 2);
            prop_assert_eq!(decode_bcd(&encoded), digits);
        }
    }
}
