use beacon_core::advertising::{letter_history::uuid_slots, AdIter, Payload, PAYLOAD_LEN};
use beacon_core::{bcd, AdvertisementEncoder, LetterHistoryEncoder, NameServiceEncoder, Snapshot, TenthsF};
use proptest::prelude::*;

fn snapshot_strategy() -> impl Strategy<Value = (i16, u16, u16, Vec<i16>, String)> {
    (
        prop_oneof![Just(TenthsF::FAILED.0), TenthsF::MIN.0..=TenthsF::MAX.0],
        prop_oneof![Just(0u16), Just(9999u16), 500u16..=3600],
        any::<u16>(),
        prop::collection::vec(-400i16..=1800, 0..=6),
        "[ -~]{0,31}",
    )
}

/// Walks the structures and checks the lengths add up to what was returned.
fn structures_len(payload: &Payload) -> usize {
    AdIter::new(payload).map(|ad| ad.data.len() + 2).sum()
}

proptest! {
    #[test]
    fn name_service_fits((reading, mv, counter, trend, name) in snapshot_strategy()) {
        let snapshot = Snapshot {
            reading: TenthsF(reading),
            millivolts: mv,
            counter,
            beacon_id: 0x7E57,
            trend: &trend,
            name: &name,
        };
        let mut buf = [0xAA; PAYLOAD_LEN];
        let len = NameServiceEncoder::default().encode(&snapshot, &mut buf);
        prop_assert!(len <= PAYLOAD_LEN);
        prop_assert_eq!(structures_len(&buf), len);
        // Battery data is never squeezed out by a long name.
        prop_assert_eq!(AdIter::new(&buf).count(), 3);
    }

    #[test]
    fn letter_history_fits((reading, mv, counter, trend, name) in snapshot_strategy()) {
        let snapshot = Snapshot {
            reading: TenthsF(reading),
            millivolts: mv,
            counter,
            beacon_id: 0x7E57,
            trend: &trend,
            name: &name,
        };
        let mut buf = [0xAA; PAYLOAD_LEN];
        let len = LetterHistoryEncoder::default().encode(&snapshot, &mut buf);
        prop_assert!(len <= PAYLOAD_LEN);
        prop_assert_eq!(structures_len(&buf), len);

        let uuid = AdIter::new(&buf).nth(2).unwrap();
        let slots = uuid_slots(uuid.data.try_into().unwrap());
        prop_assert_eq!(slots[0], 0x7E57);
        prop_assert_eq!(bcd::decode(slots[1]), Some(counter % 10_000));
        prop_assert_eq!(bcd::decode_signed(slots[3]), Some(reading));
        for (slot, average) in slots[4..].iter().zip(&trend) {
            prop_assert_eq!(bcd::decode_signed(*slot), Some(*average));
        }
    }
}

#[test]
fn worst_case_name_service_length() {
    // Flags, 21 name bytes, battery service data.
    assert_eq!(3 + (2 + 21) + 5, PAYLOAD_LEN);
}

#[test]
fn negative_history_value_encoding() {
    let slot = bcd::encode_signed(-15);
    assert_eq!(slot, 0xE015);
    assert_eq!(slot >> 12, 0xE);
    assert_eq!(bcd::decode_signed(slot), Some(-15));
}
