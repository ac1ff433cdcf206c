use proptest::prelude::*;

use seal_types::{StateRef, TimeWindow, Timestamp, TransactionId};

proptest! {
    /// StateRef binary keys sort the same way as StateRef values.
    #[test]
    fn state_ref_key_order_matches_value_order(
        a in prop::array::uniform32(any::<u8>()), ai in any::<u32>(),
        b in prop::array::uniform32(any::<u8>()), bi in any::<u32>(),
    ) {
        let ra = StateRef::new(TransactionId::new(a), ai);
        let rb = StateRef::new(TransactionId::new(b), bi);
        prop_assert_eq!(ra.cmp(&rb), ra.to_key_bytes().cmp(&rb.to_key_bytes()));
    }

    /// StateRef survives a bincode encode/decode.
    #[test]
    fn state_ref_bincode_roundtrip(bytes in prop::array::uniform32(any::<u8>()), index in any::<u32>()) {
        let r = StateRef::new(TransactionId::new(bytes), index);
        let encoded = bincode::serialize(&r).unwrap();
        let decoded: StateRef = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, r);
    }

    /// A bounded window contains exactly the instants in `[from, until)`.
    #[test]
    fn bounded_window_membership(from in 0u64..1_000_000, len in 1u64..1_000_000, t in 0u64..3_000_000) {
        let window = TimeWindow::between(
            Timestamp::from_millis(from),
            Timestamp::from_millis(from + len),
        ).unwrap();
        prop_assert_eq!(window.contains(Timestamp::from_millis(t)), t >= from && t < from + len);
    }
}
