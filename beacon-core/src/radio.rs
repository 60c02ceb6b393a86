//! What crosses the boundary to the radio stack.

use crate::flash::{DeviceName, FlashEvent};

/// TX power steps of S112 on the nRF52810, dBm. Index 0 is the 0 dBm
/// default, the rest run low to high.
pub const S112_TX_LEVELS: [i8; 10] = [0, -40, -20, -16, -12, -8, -4, 0, 3, 4];
/// S140 on the nRF52840.
pub const S140_TX_LEVELS: [i8; 15] = [0, -40, -20, -16, -12, -8, -4, 0, 2, 3, 4, 5, 6, 7, 8];

/// Level for `index`, the highest one if out of range.
pub fn tx_level(table: &[i8], index: u8) -> i8 {
    match table.get(index as usize) {
        Some(&level) => level,
        None => table.last().copied().unwrap_or(0),
    }
}

/// Non-zero result code of a stack call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackError(pub u32);

impl StackError {
    /// What gets blinked.
    pub fn code(self) -> u16 {
        self.0 as u16
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingKind {
    ConnectableScannableUndirected,
    NonConnectableNonScannableUndirected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParams {
    pub kind: AdvertisingKind,
    /// Units of 0.625 ms.
    pub interval: u32,
}

pub trait RadioStack {
    /// Set payload and parameters. Only valid while stopped.
    fn configure(&mut self, payload: &[u8], params: &AdvertisingParams) -> Result<(), StackError>;

    fn start(&mut self) -> Result<(), StackError>;

    fn stop(&mut self) -> Result<(), StackError>;

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), StackError>;

    /// Let the stack pick the PHY the central asked about.
    fn reply_phy_auto(&mut self) -> Result<(), StackError>;

    /// Give up on connection parameter negotiation for the link that's gone.
    fn stop_conn_params(&mut self) -> Result<(), StackError>;
}

impl<T: RadioStack> RadioStack for &mut T {
    fn configure(&mut self, payload: &[u8], params: &AdvertisingParams) -> Result<(), StackError> {
        T::configure(self, payload, params)
    }

    fn start(&mut self) -> Result<(), StackError> {
        T::start(self)
    }

    fn stop(&mut self) -> Result<(), StackError> {
        T::stop(self)
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), StackError> {
        T::set_tx_power(self, dbm)
    }

    fn reply_phy_auto(&mut self) -> Result<(), StackError> {
        T::reply_phy_auto(self)
    }

    fn stop_conn_params(&mut self) -> Result<(), StackError> {
        T::stop_conn_params(self)
    }
}

/// Inbound from the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackEvent {
    Connected,
    Disconnected,
    PhyUpdateRequest,
    /// The GAP Device Name characteristic was written.
    DeviceNameWritten(DeviceName),
    Flash(FlashEvent),
    /// Anything else, by event id.
    Unknown(u16),
}
