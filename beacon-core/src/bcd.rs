//! Four digit packed BCD, one decimal digit per nibble, as shown in the UUID
//! slots.

/// High nibble of a negative value.
pub const NEGATIVE: u16 = 0xE000;

/// Values above 9999 keep their low four digits.
pub const fn encode(value: u16) -> u16 {
    let v = value % 10_000;
    (v / 1000) << 12 | (v / 100 % 10) << 8 | (v / 10 % 10) << 4 | v % 10
}

/// `None` if any nibble isn't a decimal digit.
pub const fn decode(bcd: u16) -> Option<u16> {
    let mut value = 0;
    let mut shift = 16;
    while shift > 0 {
        shift -= 4;
        let digit = (bcd >> shift) & 0xF;
        if digit > 9 {
            return None;
        }
        value = value * 10 + digit;
    }
    Some(value)
}

/// Negative values become `E` followed by three digits of magnitude, so
/// -15 is `0xE015`. Magnitudes above 999 keep their low three digits.
pub const fn encode_signed(value: i16) -> u16 {
    if value < 0 {
        NEGATIVE | encode(value.unsigned_abs() % 1000)
    } else {
        encode(value as u16)
    }
}

pub const fn decode_signed(bcd: u16) -> Option<i16> {
    if bcd & 0xF000 == NEGATIVE {
        match decode(bcd & 0x0FFF) {
            Some(magnitude) => Some(-(magnitude as i16)),
            None => None,
        }
    } else {
        match decode(bcd) {
            Some(value) => Some(value as i16),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn digits_per_nibble() {
        assert_eq!(encode(0), 0);
        assert_eq!(encode(2770), 0x2770);
        assert_eq!(encode(9999), 0x9999);
        assert_eq!(encode(12_345), 0x2345);
    }

    #[test]
    fn negative_gets_e_nibble() {
        assert_eq!(encode_signed(-15), 0xE015);
        assert_eq!(decode_signed(0xE015), Some(-15));
        assert_eq!(encode_signed(-400), 0xE400);
        assert_eq!(encode_signed(545), 0x0545);
    }

    #[test]
    fn rejects_hex_digits() {
        assert_eq!(decode(0x7E57), None);
        assert_eq!(decode_signed(0xE0A0), None);
    }

    proptest! {
        #[test]
        fn round_trip(v in 0u16..=9999) {
            prop_assert_eq!(decode(encode(v)), Some(v));
        }

        #[test]
        fn signed_round_trip(v in -999i16..=9999) {
            prop_assert_eq!(decode_signed(encode_signed(v)), Some(v));
        }
    }
}
