//! Stopping, refilling and restarting advertising on every update, and
//! following what the stack does on its own.

use crate::advertising::{self, Payload, PAYLOAD_LEN};
use crate::config::BeaconConfig;
use crate::radio::{tx_level, AdvertisingKind, AdvertisingParams, RadioStack};
use crate::status::{StatusLeds, StatusReporter, SystemControl};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingState {
    Stopped,
    Active,
}

pub struct AdvertisingLifecycle<R, L, S> {
    radio: R,
    status: StatusReporter<L, S>,
    state: AdvertisingState,
    /// Connectable at boot so a phone can write the name.
    connectable: bool,
    /// Starts left before going non-connectable, 0 once spent.
    countdown: u8,
    interval: u32,
    tx_levels: &'static [i8],
    tx_index: u8,
    battery_ok: bool,
    payload: Payload,
    len: usize,
}

impl<R, L, S> AdvertisingLifecycle<R, L, S>
where
    R: RadioStack,
    L: StatusLeds,
    S: SystemControl,
{
    pub fn new(
        radio: R,
        status: StatusReporter<L, S>,
        config: &BeaconConfig,
        tx_levels: &'static [i8],
    ) -> Self {
        Self {
            radio,
            status,
            state: AdvertisingState::Stopped,
            connectable: true,
            countdown: config.connectable_updates,
            interval: config.interval_units(),
            tx_levels,
            tx_index: config.tx_power_index,
            battery_ok: true,
            payload: [0; PAYLOAD_LEN],
            len: 0,
        }
    }

    /// Stop, refill the payload with `encode` and start again.
    pub fn update_with(&mut self, encode: impl FnOnce(&mut Payload) -> usize, battery_ok: bool) {
        self.stop();
        self.len = encode(&mut self.payload).min(PAYLOAD_LEN);
        self.battery_ok = battery_ok;
        advertising::dump(&self.payload[..self.len]);
        self.start();
    }

    pub fn start(&mut self) {
        if self.state == AdvertisingState::Active {
            return;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            if self.countdown == 0 {
                info!("connectable window over");
                self.connectable = false;
            }
        }
        let params = AdvertisingParams {
            kind: if self.connectable {
                AdvertisingKind::ConnectableScannableUndirected
            } else {
                AdvertisingKind::NonConnectableNonScannableUndirected
            },
            interval: self.interval,
        };
        // The whole buffer goes out, zero terminated when shorter.
        let result = self.radio.configure(&self.payload, &params);
        self.status.check(result, true);
        let result = self.radio.start();
        self.status.check(result, true);
        self.state = AdvertisingState::Active;
        debug!("advertising {:?}", params.kind);
        self.set_tx_power(self.tx_index);
        if self.battery_ok {
            self.status.ok();
        } else {
            self.status.caution();
        }
    }

    pub fn stop(&mut self) {
        if self.state == AdvertisingState::Stopped {
            return;
        }
        let result = self.radio.stop();
        self.status.check(result, true);
        self.state = AdvertisingState::Stopped;
    }

    /// Index into the TX power table, clamped to its last entry.
    pub fn set_tx_power(&mut self, index: u8) {
        self.tx_index = index;
        let result = self.radio.set_tx_power(tx_level(self.tx_levels, index));
        self.status.check(result, true);
    }

    /// The stack stops advertising by itself when a central connects.
    pub fn connected(&mut self) {
        self.state = AdvertisingState::Stopped;
    }

    pub fn set_connectable(&mut self, connectable: bool) {
        self.connectable = connectable;
    }

    pub fn disconnected(&mut self) {
        self.connectable = false;
        let result = self.radio.stop_conn_params();
        self.status.check(result, true);
    }

    pub fn phy_update_request(&mut self) {
        let result = self.radio.reply_phy_auto();
        self.status.check(result, true);
    }

    pub fn unknown_event(&mut self, id: u16) {
        debug!("unhandled stack event {:#x}", id);
        self.status.caution();
    }

    pub fn state(&self) -> AdvertisingState {
        self.state
    }

    pub fn is_connectable(&self) -> bool {
        self.connectable
    }

    /// Last encoded payload without the zero padding.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn status_mut(&mut self) -> &mut StatusReporter<L, S> {
        &mut self.status
    }
}
