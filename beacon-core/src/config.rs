//! Runtime tunables. Everything board specific is picked by the firmware's
//! cargo features; what's left is here with the values the beacon ships with.

/// Readings averaged into [`crate::HistoryBuffer`].
pub const HISTORY_LEN: usize = 5;
/// Averages kept for the advertisement, newest first.
pub const TREND_LEN: usize = 4;

/// Last page before the bootloader.
pub const NRF52810_NAME_SLOT: u32 = 0x0002_F000;
pub const NRF52840_NAME_SLOT: u32 = 0x000D_F000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeaconConfig {
    pub advertising_interval_ms: u32,
    pub update_interval_ms: u32,
    /// Update cycles the beacon stays connectable for after boot.
    pub connectable_updates: u8,
    /// Index into the stack's TX power table.
    pub tx_power_index: u8,
    /// Readings between trend entries. 15 readings at 20 s is one entry
    /// every five minutes.
    pub trend_every: u16,
    /// Update cycles between battery samples.
    pub battery_every: u8,
    /// Shown raw in the first UUID slot.
    pub beacon_id: u16,
    pub default_name: &'static str,
    pub name_slot: u32,
}

impl BeaconConfig {
    /// Advertising interval in units of 0.625 ms.
    pub const fn interval_units(&self) -> u32 {
        self.advertising_interval_ms * 8 / 5
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            advertising_interval_ms: 3000,
            update_interval_ms: 20_000,
            connectable_updates: 20,
            tx_power_index: 0,
            trend_every: 15,
            battery_every: 60,
            beacon_id: 0x7E57,
            default_name: "NoName",
            name_slot: NRF52810_NAME_SLOT,
        }
    }
}
