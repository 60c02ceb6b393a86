//! SAADC in single-shot mode.
//!
//! A read claims one channel for its duration: every other channel is switched
//! off, the requested resolution and oversampling are applied, and the
//! previous ones are put back afterwards. The peripheral is disabled between
//! reads.

use bitbybit::{bitenum, bitfield};

use crate::mmio::Mmio;
use crate::poll::{poll_until, Poll, Spin};

pub const SAADC_BASE: usize = 0x4000_7000;

mod reg {
    pub const TASKS_START: usize = 0x000;
    pub const TASKS_SAMPLE: usize = 0x004;
    pub const TASKS_STOP: usize = 0x008;
    pub const TASKS_CALIBRATEOFFSET: usize = 0x00C;
    pub const EVENTS_STARTED: usize = 0x100;
    pub const EVENTS_END: usize = 0x104;
    pub const EVENTS_DONE: usize = 0x108;
    pub const EVENTS_RESULTDONE: usize = 0x10C;
    pub const EVENTS_CALIBRATEDONE: usize = 0x110;
    pub const EVENTS_STOPPED: usize = 0x114;
    /// CH[0].LIMITH, followed by LIMITL and then the other channels.
    pub const EVENTS_LIMIT: usize = 0x118;
    pub const INTENCLR: usize = 0x308;
    pub const STATUS: usize = 0x400;
    pub const ENABLE: usize = 0x500;
    pub const CH: usize = 0x510;
    pub const CH_STRIDE: usize = 0x10;
    pub const CH_PSELP: usize = 0x0;
    pub const CH_PSELN: usize = 0x4;
    pub const CH_CONFIG: usize = 0x8;
    pub const CH_LIMIT: usize = 0xC;
    pub const RESOLUTION: usize = 0x5F0;
    pub const OVERSAMPLE: usize = 0x5F4;
    pub const SAMPLERATE: usize = 0x5F8;
    pub const RESULT_PTR: usize = 0x62C;
    pub const RESULT_MAXCNT: usize = 0x630;
    pub const RESULT_AMOUNT: usize = 0x634;

    pub const EVENTS: [usize; 6] = [
        EVENTS_STARTED,
        EVENTS_END,
        EVENTS_DONE,
        EVENTS_RESULTDONE,
        EVENTS_CALIBRATEDONE,
        EVENTS_STOPPED,
    ];

    /// LIMITH = 32767, LIMITL = -32768.
    pub const LIMIT_RESET: u32 = 0x7FFF_8000;
}

pub use reg::*;

pub const CHANNELS: u8 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Input {
    NotConnected = 0,
    Ain0 = 1,
    Ain1 = 2,
    Ain2 = 3,
    Ain3 = 4,
    Ain4 = 5,
    Ain5 = 6,
    Ain6 = 7,
    Ain7 = 8,
    Vdd = 9,
    /// nRF52840 only.
    VddhDiv5 = 0x0D,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resistor {
    Bypass = 0,
    PullDown = 1,
    PullUp = 2,
    VddDiv2 = 3,
}

#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    Div6 = 0,
    Div5 = 1,
    Div4 = 2,
    Div3 = 3,
    Div2 = 4,
    Unity = 5,
    Mul2 = 6,
    Mul4 = 7,
}

#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Acquisition {
    Us3 = 0,
    Us5 = 1,
    Us10 = 2,
    Us15 = 3,
    Us20 = 4,
    Us40 = 5,
    Reserved6 = 6,
    Reserved7 = 7,
}

/// CH[n].CONFIG
#[bitfield(u32, default = 0x0002_0000)]
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    #[bits(0..=1, rw)]
    pub resp: Resistor,
    #[bits(4..=5, rw)]
    pub resn: Resistor,
    #[bits(8..=10, rw)]
    pub gain: Gain,
    /// VDD/4 instead of the internal 0.6 V reference.
    #[bit(12, rw)]
    pub vdd_reference: bool,
    #[bits(16..=18, rw)]
    pub acquisition: Acquisition,
    #[bit(20, rw)]
    pub differential: bool,
    #[bit(24, rw)]
    pub burst: bool,
}

impl ChannelConfig {
    /// Single ended against the internal reference at gain 1/6, full scale
    /// 3.6 V. What the battery reader uses on VDD.
    pub const fn battery() -> Self {
        Self::DEFAULT
            .with_gain(Gain::Div6)
            .with_vdd_reference(false)
            .with_acquisition(Acquisition::Us10)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Resolution {
    Bits8 = 0,
    Bits10 = 1,
    Bits12 = 2,
    Bits14 = 3,
}

impl Resolution {
    pub const fn bits(self) -> u32 {
        8 + 2 * self as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Oversample {
    Bypass = 0,
    Over2x = 1,
    Over4x = 2,
    Over8x = 3,
    Over16x = 4,
    Over32x = 5,
    Over64x = 6,
    Over128x = 7,
    Over256x = 8,
}

impl Oversample {
    pub const fn samples(self) -> u32 {
        1 << self as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// A conversion is already running.
    Busy,
    /// The channel has no positive input.
    NotConfigured,
    /// Another channel is claimed.
    InUse,
    Timeout,
}

/// Single-shot reads and offset calibration, whatever the ADC.
pub trait AdcRead {
    type Error;

    fn calibrate(&mut self) -> Result<(), Self::Error>;

    fn read(&mut self, resolution: Resolution, oversample: Oversample) -> Result<i16, Self::Error>;
}

impl<T: AdcRead> AdcRead for &mut T {
    type Error = T::Error;

    fn calibrate(&mut self) -> Result<(), Self::Error> {
        T::calibrate(self)
    }

    fn read(&mut self, resolution: Resolution, oversample: Oversample) -> Result<i16, Self::Error> {
        T::read(self, resolution, oversample)
    }
}

/// One SAADC instance.
pub struct Saadc<R: Mmio> {
    regs: R,
    in_use: u8,
    timeout: Poll,
}

impl<R: Mmio> Saadc<R> {
    pub fn new(regs: R) -> Self {
        let mut saadc = Self {
            regs,
            in_use: 0,
            timeout: Poll::spin(100_000),
        };
        saadc.regs.write(INTENCLR, 0xFFFF_FFFF);
        saadc
    }

    pub fn with_timeout(mut self, timeout: Poll) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind `index` to a configuration. Nothing is written until a read.
    pub fn channel(self, index: u8, positive: Input, config: ChannelConfig) -> AdcChannel<R> {
        AdcChannel {
            saadc: self,
            index: index % CHANNELS,
            positive,
            negative: Input::NotConnected,
            config,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.regs.read(STATUS) & 1 != 0
    }

    pub fn in_use(&self) -> u8 {
        self.in_use
    }

    fn enable(&mut self) {
        self.regs.write(ENABLE, 1);
    }

    fn disable(&mut self) {
        self.regs.write(ENABLE, 0);
    }

    fn clear_events(&mut self) {
        for event in EVENTS {
            self.regs.clear(event);
        }
    }

    fn wait(&mut self, event: usize) -> Result<(), AdcError> {
        let regs = &self.regs;
        poll_until(&mut Spin, self.timeout, || regs.event(event))
            .map(|_| ())
            .map_err(|_| AdcError::Timeout)
    }

    fn ch(index: u8, field: usize) -> usize {
        CH + CH_STRIDE * index as usize + field
    }

    /// Offset calibration. Leaves the peripheral enabled.
    pub fn calibrate(&mut self) -> Result<(), AdcError> {
        if self.is_busy() {
            return Err(AdcError::Busy);
        }
        self.enable();
        self.regs.clear(EVENTS_CALIBRATEDONE);
        self.regs.trigger(TASKS_CALIBRATEOFFSET);
        let result = self.wait(EVENTS_CALIBRATEDONE);
        self.regs.clear(EVENTS_CALIBRATEDONE);
        if result.is_err() {
            warn!("saadc calibration timed out");
        }
        result
    }

    fn claim(&mut self, index: u8, positive: Input, negative: Input, config: ChannelConfig) -> Result<(), AdcError> {
        let bit = 1 << index;
        if self.in_use & !bit != 0 {
            return Err(AdcError::InUse);
        }
        for other in (0..CHANNELS).filter(|&n| n != index) {
            self.regs.write(Self::ch(other, CH_PSELP), Input::NotConnected as u32);
            self.regs.write(Self::ch(other, CH_PSELN), Input::NotConnected as u32);
        }
        self.regs.write(Self::ch(index, CH_CONFIG), config.raw_value());
        self.regs.write(Self::ch(index, CH_PSELN), negative as u32);
        self.regs.write(Self::ch(index, CH_PSELP), positive as u32);
        self.in_use |= bit;
        Ok(())
    }

    fn release(&mut self, index: u8) {
        self.regs.write(Self::ch(index, CH_PSELP), Input::NotConnected as u32);
        self.regs.write(Self::ch(index, CH_PSELN), Input::NotConnected as u32);
        self.in_use &= !(1 << index);
    }

    fn sample(&mut self, resolution: Resolution, oversample: Oversample) -> Result<i16, AdcError> {
        let mut result: i16 = 0;
        self.regs
            .write_ptr(RESULT_PTR, &mut result as *mut i16 as *const u8);
        self.regs.write(RESULT_MAXCNT, 1);

        let saved_resolution = self.regs.read(RESOLUTION);
        let saved_oversample = self.regs.read(OVERSAMPLE);
        self.regs.write(RESOLUTION, resolution as u32);
        self.regs.write(OVERSAMPLE, oversample as u32);
        // task-triggered sampling
        self.regs.write(SAMPLERATE, 0);

        self.clear_events();
        self.enable();
        self.regs.trigger(TASKS_START);
        let mut outcome = self.wait(EVENTS_STARTED);

        if outcome.is_ok() {
            // With oversampling each SAMPLE only feeds the accumulator;
            // RESULTDONE arrives after the last one.
            let regs = &mut self.regs;
            outcome = poll_until(&mut Spin, self.timeout, || {
                if regs.event(EVENTS_RESULTDONE) {
                    return true;
                }
                regs.trigger(TASKS_SAMPLE);
                false
            })
            .map(|samples| trace!("saadc result after {} polls", samples))
            .map_err(|_| AdcError::Timeout);
        }

        self.regs.trigger(TASKS_STOP);
        let _ = self.wait(EVENTS_STOPPED);

        self.regs.write(RESOLUTION, saved_resolution);
        self.regs.write(OVERSAMPLE, saved_oversample);
        self.disable();
        self.clear_events();

        outcome?;
        // SAFETY: EasyDMA wrote `result` behind the compiler's back.
        Ok(unsafe { core::ptr::read_volatile(&result) })
    }
}

/// A channel bound to its configuration, holding the SAADC it samples with.
pub struct AdcChannel<R: Mmio> {
    saadc: Saadc<R>,
    index: u8,
    positive: Input,
    negative: Input,
    config: ChannelConfig,
}

impl<R: Mmio> AdcChannel<R> {
    pub fn with_negative(mut self, negative: Input) -> Self {
        self.negative = negative;
        self.config = self.config.with_differential(negative != Input::NotConnected);
        self
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn saadc(&self) -> &Saadc<R> {
        &self.saadc
    }

    /// Put the channel's registers back to reset values and hand the SAADC
    /// back.
    pub fn deinit(mut self) -> Saadc<R> {
        let index = self.index;
        self.saadc
            .regs
            .write(Saadc::<R>::ch(index, CH_CONFIG), ChannelConfig::DEFAULT.raw_value());
        self.saadc
            .regs
            .write(Saadc::<R>::ch(index, CH_LIMIT), LIMIT_RESET);
        let limit_high = EVENTS_LIMIT + 8 * index as usize;
        self.saadc.regs.clear(limit_high);
        self.saadc.regs.clear(limit_high + 4);
        self.saadc.release(index);
        self.saadc
    }

    /// One conversion at the given resolution and oversampling. On error
    /// nothing is returned, so the caller keeps its previous value.
    pub fn read(&mut self, resolution: Resolution, oversample: Oversample) -> Result<i16, AdcError> {
        if self.saadc.is_busy() {
            return Err(AdcError::Busy);
        }
        if self.positive == Input::NotConnected {
            return Err(AdcError::NotConfigured);
        }
        self.saadc
            .claim(self.index, self.positive, self.negative, self.config)?;
        let value = self.saadc.sample(resolution, oversample);
        self.saadc.release(self.index);
        value
    }

    pub fn calibrate(&mut self) -> Result<(), AdcError> {
        self.saadc.calibrate()
    }
}

impl<R: Mmio> AdcRead for AdcChannel<R> {
    type Error = AdcError;

    fn calibrate(&mut self) -> Result<(), AdcError> {
        AdcChannel::calibrate(self)
    }

    fn read(&mut self, resolution: Resolution, oversample: Oversample) -> Result<i16, AdcError> {
        AdcChannel::read(self, resolution, oversample)
    }
}
