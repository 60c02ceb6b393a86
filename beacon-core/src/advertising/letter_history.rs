use core::fmt::Write;

use super::{AdBuilder, AdvertisementEncoder, Payload, Snapshot};
use super::FLAG_BR_EDR_NOT_SUPPORTED;
use crate::bcd;
use crate::config::TREND_LEN;

/// Flags (3) and the UUID list (18) leave 10, less the name header.
pub const NAME_MAX: usize = 8;

/// Eight 16 bit slots packed into one 128-bit UUID.
///
/// | slot | contents |
/// |------|----------|
/// | 0 | beacon id, raw hex |
/// | 1 | reading counter 0000-9999 |
/// | 2 | battery mV |
/// | 3 | current reading |
/// | 4-7 | averages, newest first, 0 until there is one |
///
/// All but slot 0 are BCD, negatives as `E` + magnitude. Scanners print a
/// UUID most significant byte first, and it's sent little-endian, so slot 0
/// goes in the top 16 bits to read first.
pub fn history_uuid(snapshot: &Snapshot<'_>) -> u128 {
    let mut slots = [0u16; 8];
    slots[0] = snapshot.beacon_id;
    slots[1] = bcd::encode(snapshot.counter % 10_000);
    slots[2] = bcd::encode(snapshot.millivolts);
    slots[3] = bcd::encode_signed(snapshot.reading.0);
    for (slot, &average) in slots[4..].iter_mut().zip(snapshot.trend.iter().take(TREND_LEN)) {
        *slot = bcd::encode_signed(average);
    }
    slots
        .iter()
        .enumerate()
        .fold(0, |uuid, (i, &slot)| uuid | (slot as u128) << (16 * (7 - i)))
}

/// Inverse of [`history_uuid`] for the wire bytes, slot 0 first.
pub fn uuid_slots(bytes: &[u8; 16]) -> [u16; 8] {
    let uuid = u128::from_le_bytes(*bytes);
    core::array::from_fn(|i| (uuid >> (16 * (7 - i))) as u16)
}

/// A single letter (or `T`) with the temperature as the name, `T 54.5`,
/// and the reading history in a 128-bit UUID.
#[derive(Clone, Copy, Debug)]
pub struct LetterHistoryEncoder {
    default_prefix: char,
}

impl LetterHistoryEncoder {
    pub const fn new(default_prefix: char) -> Self {
        Self { default_prefix }
    }

    /// The stored name when it's one of the letters the button selects,
    /// otherwise the default.
    fn prefix(&self, name: &str) -> char {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => c,
            _ => self.default_prefix,
        }
    }
}

impl Default for LetterHistoryEncoder {
    fn default() -> Self {
        Self::new('T')
    }
}

impl AdvertisementEncoder for LetterHistoryEncoder {
    fn encode(&mut self, snapshot: &Snapshot<'_>, buf: &mut Payload) -> usize {
        let mut name = heapless::String::<8>::new();
        let _ = write!(name, "{}{}", self.prefix(snapshot.name), snapshot.reading);

        let mut ad = AdBuilder::new(buf);
        ad.flags(FLAG_BR_EDR_NOT_SUPPORTED);
        ad.complete_name(&name, NAME_MAX);
        ad.uuid_128(history_uuid(snapshot));
        ad.finish()
    }
}
