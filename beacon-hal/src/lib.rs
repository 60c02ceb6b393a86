#![cfg_attr(not(test), no_std)]
//! Register-level drivers for the two nRF52 peripherals the beacon samples
//! with: TWIM for the I2C temperature sensors and SAADC for the battery.
//!
//! Both sit on the [`mmio::Mmio`] trait, so the same code runs against the
//! real register blocks on target and against simulated ones in tests.

mod fmt;

pub mod gpio;
pub mod mmio;
pub mod poll;
pub mod saadc;
pub mod twim;

pub use mmio::{Mmio, VolatileBlock};
pub use poll::{poll_for, poll_until, Poll, Spin, Timeout};
pub use saadc::{AdcChannel, AdcError, AdcRead, Saadc};
pub use twim::{BusMaster, Frequency, PoweredBus, TwimError, TwimPins};
