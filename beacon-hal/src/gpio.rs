//! The few GPIO operations the bus and the board glue need: pin configuration
//! and output level. Pins are P0 pin numbers.

use arbitrary_int::*;
use bitbybit::{bitenum, bitfield};

use crate::mmio::Mmio;

pub const P0_BASE: usize = 0x5000_0000;

const OUTSET: usize = 0x508;
const OUTCLR: usize = 0x50C;
const IN: usize = 0x510;
const PIN_CNF: usize = 0x700;

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    Disabled = 0,
    Down = 1,
    Reserved = 2,
    Up = 3,
}

#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drive {
    S0S1 = 0,
    H0S1 = 1,
    S0H1 = 2,
    H0H1 = 3,
    D0S1 = 4,
    D0H1 = 5,
    S0D1 = 6,
    H0D1 = 7,
}

/// PIN_CNF[n]. The reset value leaves the pin an input with the input buffer
/// disconnected.
#[bitfield(u32, default = 0x2)]
#[derive(Debug, PartialEq, Eq)]
pub struct PinCnf {
    #[bit(0, rw)]
    pub output: bool,
    #[bit(1, rw)]
    pub input_disconnected: bool,
    #[bits(2..=3, rw)]
    pub pull: Pull,
    #[bits(8..=10, rw)]
    pub drive: Drive,
    #[bits(16..=17, rw)]
    pub sense: u2,
}

impl PinCnf {
    /// Connected input, standard 0 / disconnected 1, pulled up. What an idle
    /// I2C line looks like.
    pub const fn i2c_idle() -> Self {
        Self::DEFAULT
            .with_input_disconnected(false)
            .with_pull(Pull::Up)
            .with_drive(Drive::S0D1)
    }

    /// Output able to source current for a sensor supply.
    pub const fn power_output() -> Self {
        Self::DEFAULT
            .with_output(true)
            .with_input_disconnected(true)
            .with_drive(Drive::S0H1)
    }

    pub const fn input_pullup() -> Self {
        Self::DEFAULT
            .with_input_disconnected(false)
            .with_pull(Pull::Up)
    }
}

pub struct Port<R: Mmio> {
    regs: R,
}

impl<R: Mmio> Port<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn configure(&mut self, pin: u8, cnf: PinCnf) {
        self.regs.write(PIN_CNF + 4 * pin as usize, cnf.raw_value());
    }

    pub fn config(&self, pin: u8) -> PinCnf {
        PinCnf::new_with_raw_value(self.regs.read(PIN_CNF + 4 * pin as usize))
    }

    /// Back to the reset configuration.
    pub fn reset(&mut self, pin: u8) {
        self.configure(pin, PinCnf::DEFAULT);
    }

    pub fn set_high(&mut self, pin: u8) {
        self.regs.write(OUTSET, 1 << pin);
    }

    pub fn set_low(&mut self, pin: u8) {
        self.regs.write(OUTCLR, 1 << pin);
    }

    pub fn is_high(&self, pin: u8) -> bool {
        self.regs.read(IN) & (1 << pin) != 0
    }

    #[cfg(test)]
    pub(crate) fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }
}
