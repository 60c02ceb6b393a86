#![allow(dead_code)]

use std::collections::VecDeque;

use beacon_core::flash::{SLOT_LEN, SLOT_WORDS};
use beacon_core::lifecycle::AdvertisingLifecycle;
use beacon_core::radio::{AdvertisingKind, AdvertisingParams, S112_TX_LEVELS};
use beacon_core::{
    AdvertisementEncoder, Beacon, Blink, BeaconConfig, FlashController, FlashEvent, HistoryBuffer,
    RadioStack, SensorError, StackError, StatusLeds, StatusReporter, SystemControl,
    TemperatureSource, TenthsF, UpdateTimer,
};
use beacon_hal::saadc::{Oversample, Resolution};
use beacon_hal::{AdcError, AdcRead, PoweredBus};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

/// Replays scripted results, then keeps returning the last good one.
pub struct ScriptedSensor {
    script: VecDeque<Result<TenthsF, SensorError>>,
    last: TenthsF,
    history: HistoryBuffer<5>,
}

impl ScriptedSensor {
    pub fn new(script: impl IntoIterator<Item = Result<TenthsF, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: TenthsF(700),
            history: HistoryBuffer::new(),
        }
    }

    pub fn steady(reading: i16) -> Self {
        Self::new([Ok(TenthsF(reading))])
    }
}

impl TemperatureSource for ScriptedSensor {
    fn read(&mut self) -> Result<TenthsF, SensorError> {
        let result = self.script.pop_front().unwrap_or(Ok(self.last));
        if let Ok(reading) = result {
            self.last = reading;
            self.history.insert(reading.0);
        }
        result
    }

    fn average(&self) -> Option<TenthsF> {
        self.history.average().map(TenthsF)
    }

    fn history_len(&self) -> usize {
        5
    }
}

/// Returns the same raw conversion every time.
pub struct FakeAdc {
    pub raw: Result<i16, AdcError>,
    pub reads: u32,
}

impl FakeAdc {
    /// Raw 10 bit value for `millivolts` at the 3.6 V full scale.
    pub fn at(millivolts: u32) -> Self {
        Self {
            raw: Ok((millivolts * 1024).div_ceil(3600) as i16),
            reads: 0,
        }
    }
}

impl AdcRead for FakeAdc {
    type Error = AdcError;

    fn calibrate(&mut self) -> Result<(), AdcError> {
        Ok(())
    }

    fn read(&mut self, _resolution: Resolution, _oversample: Oversample) -> Result<i16, AdcError> {
        self.reads += 1;
        self.raw
    }
}

/// The name page. Requests are accepted at once, completion is reported
/// by [`FakeFlash::complete`].
pub struct FakeFlash {
    pub slot: [u8; SLOT_LEN],
    pending: Option<Option<[u32; SLOT_WORDS]>>,
    pub erases: u32,
    pub writes: u32,
}

impl FakeFlash {
    pub fn erased() -> Self {
        Self {
            slot: [0xFF; SLOT_LEN],
            pending: None,
            erases: 0,
            writes: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn complete(&mut self) -> FlashEvent {
        match self.pending.take() {
            Some(None) => self.slot = [0xFF; SLOT_LEN],
            Some(Some(words)) => self.slot = bytemuck::cast(words),
            None => return FlashEvent::Error,
        }
        FlashEvent::Success
    }
}

impl FlashController for FakeFlash {
    type Error = ();

    fn read(&self, _address: u32, buf: &mut [u8; SLOT_LEN]) {
        *buf = self.slot;
    }

    fn request_erase(&mut self, _page_address: u32) -> Result<(), ()> {
        if self.pending.is_some() {
            return Err(());
        }
        self.erases += 1;
        self.pending = Some(None);
        Ok(())
    }

    fn request_write(&mut self, _address: u32, words: &[u32; SLOT_WORDS]) -> Result<(), ()> {
        if self.pending.is_some() {
            return Err(());
        }
        self.writes += 1;
        self.pending = Some(Some(*words));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Configure(AdvertisingKind),
    Start,
    Stop,
    PhyAuto,
    StopConnParams,
}

#[derive(Default)]
pub struct FakeRadio {
    pub calls: Vec<RadioCall>,
    pub payload: Vec<u8>,
    pub dbm: Option<i8>,
}

impl FakeRadio {
    pub fn configured_kinds(&self) -> Vec<AdvertisingKind> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RadioCall::Configure(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

impl RadioStack for FakeRadio {
    fn configure(&mut self, payload: &[u8], params: &AdvertisingParams) -> Result<(), StackError> {
        self.calls.push(RadioCall::Configure(params.kind));
        self.payload = payload.to_vec();
        Ok(())
    }

    fn start(&mut self) -> Result<(), StackError> {
        self.calls.push(RadioCall::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StackError> {
        self.calls.push(RadioCall::Stop);
        Ok(())
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), StackError> {
        self.dbm = Some(dbm);
        Ok(())
    }

    fn reply_phy_auto(&mut self) -> Result<(), StackError> {
        self.calls.push(RadioCall::PhyAuto);
        Ok(())
    }

    fn stop_conn_params(&mut self) -> Result<(), StackError> {
        self.calls.push(RadioCall::StopConnParams);
        Ok(())
    }
}

#[derive(Default)]
pub struct Board {
    pub alive: u32,
    pub oks: u32,
    pub cautions: u32,
    pub blinks: Vec<Blink>,
    pub resets: u32,
}

impl StatusLeds for Board {
    fn alive(&mut self) {
        self.alive += 1;
    }

    fn ok(&mut self) {
        self.oks += 1;
    }

    fn caution(&mut self) {
        self.cautions += 1;
    }

    fn show(&mut self, blink: Blink) {
        self.blinks.push(blink);
    }
}

impl SystemControl for Board {
    fn delay_ms(&mut self, _ms: u32) {}

    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[derive(Default)]
pub struct FakeTimer {
    pub running: Option<u32>,
    pub starts: u32,
}

impl UpdateTimer for FakeTimer {
    fn start(&mut self, interval_ms: u32) {
        self.running = Some(interval_ms);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.running = None;
    }
}

pub type TestBeacon<'f, S, E> = Beacon<S, FakeAdc, &'f mut FakeFlash, FakeRadio, Board, Board, E>;

pub fn beacon<'f, S, E>(
    config: BeaconConfig,
    sensor: S,
    adc: FakeAdc,
    flash: &'f mut FakeFlash,
    encoder: E,
) -> TestBeacon<'f, S, E>
where
    S: TemperatureSource,
    E: AdvertisementEncoder,
{
    let status = StatusReporter::new(Board::default(), Board::default());
    let advertising = AdvertisingLifecycle::new(FakeRadio::default(), status, &config, &S112_TX_LEVELS);
    Beacon::new(config, sensor, adc, flash, advertising, encoder)
}

/// A TMP117 behind a powered bus: conversions are ready on the first poll
/// and the result register reads `raw`.
pub struct Tmp117Bus {
    pub raw: u16,
    pub powered: bool,
    register: u8,
}

impl Tmp117Bus {
    pub fn new(raw: u16) -> Self {
        Self {
            raw,
            powered: false,
            register: 0,
        }
    }
}

impl PoweredBus for Tmp117Bus {
    fn power_up(&mut self) {
        self.powered = true;
    }

    fn power_down(&mut self) {
        self.powered = false;
    }
}

impl ErrorType for Tmp117Bus {
    type Error = ErrorKind;
}

impl I2c for Tmp117Bus {
    fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        if !self.powered {
            return Err(ErrorKind::Bus);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => self.register = bytes[0],
                Operation::Read(buf) => {
                    let value = match self.register {
                        // configuration, data ready
                        0x01 => 0x2220,
                        0x00 => self.raw,
                        _ => 0,
                    };
                    buf.copy_from_slice(&value.to_be_bytes()[..buf.len()]);
                }
            }
        }
        Ok(())
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
