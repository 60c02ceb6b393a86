use core::fmt::Write;

use super::{AdBuilder, AdvertisementEncoder, Payload, Snapshot};
use super::{BATTERY_SERVICE_UUID, FLAG_BR_EDR_NOT_SUPPORTED};
use crate::battery;

/// What's left after flags (3), battery service data (5) and the name
/// header (2).
pub const NAME_MAX: usize = 21;

/// Free text name with the temperature in front, `T 72.3F Kitchen`, plus the
/// battery percentage as Battery Service data.
#[derive(Clone, Copy, Debug)]
pub struct NameServiceEncoder {
    prefix: &'static str,
}

impl NameServiceEncoder {
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }
}

impl Default for NameServiceEncoder {
    fn default() -> Self {
        Self::new("T")
    }
}

impl AdvertisementEncoder for NameServiceEncoder {
    fn encode(&mut self, snapshot: &Snapshot<'_>, buf: &mut Payload) -> usize {
        // Longest possible text is cut to NAME_MAX anyway.
        let mut name = heapless::String::<64>::new();
        let _ = write!(name, "{}{}F {}", self.prefix, snapshot.reading, snapshot.name);

        let mut ad = AdBuilder::new(buf);
        ad.flags(FLAG_BR_EDR_NOT_SUPPORTED);
        ad.complete_name(&name, NAME_MAX);
        ad.service_data_16(
            BATTERY_SERVICE_UUID,
            &[battery::percent(snapshot.millivolts)],
        );
        ad.finish()
    }
}
