//! TWIM, the EasyDMA I2C master.
//!
//! Every transaction is one chained hardware sequence set up through SHORTS,
//! then a bounded wait for STOPPED or ERROR. A byte count that does not match
//! the request, or a wait that runs out, means the peripheral is in an unknown
//! state and gets a full disable/re-enable before the error is returned.
//!
//! EasyDMA only reaches data RAM. TX bytes that live anywhere else, such as
//! a command byte the compiler placed in flash, are copied to the stack
//! first.

use core::ops::Range;

use bitbybit::bitfield;
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};

use crate::gpio::{PinCnf, Port};
use crate::mmio::Mmio;
use crate::poll::{poll_until, Poll, Spin};

pub const TWIM0_BASE: usize = 0x4000_3000;
pub const TWIM1_BASE: usize = 0x4000_4000;

mod reg {
    pub const TASKS_STARTRX: usize = 0x000;
    pub const TASKS_STARTTX: usize = 0x008;
    pub const TASKS_STOP: usize = 0x014;
    pub const TASKS_SUSPEND: usize = 0x01C;
    pub const TASKS_RESUME: usize = 0x020;
    pub const EVENTS_STOPPED: usize = 0x104;
    pub const EVENTS_ERROR: usize = 0x124;
    pub const EVENTS_SUSPENDED: usize = 0x148;
    pub const EVENTS_RXSTARTED: usize = 0x14C;
    pub const EVENTS_TXSTARTED: usize = 0x150;
    pub const EVENTS_LASTRX: usize = 0x15C;
    pub const EVENTS_LASTTX: usize = 0x160;
    pub const SHORTS: usize = 0x200;
    pub const INTENCLR: usize = 0x308;
    pub const ERRORSRC: usize = 0x4C4;
    pub const ENABLE: usize = 0x500;
    pub const PSEL_SCL: usize = 0x508;
    pub const PSEL_SDA: usize = 0x50C;
    pub const FREQUENCY: usize = 0x524;
    pub const RXD_PTR: usize = 0x534;
    pub const RXD_MAXCNT: usize = 0x538;
    pub const RXD_AMOUNT: usize = 0x53C;
    pub const TXD_PTR: usize = 0x544;
    pub const TXD_MAXCNT: usize = 0x548;
    pub const TXD_AMOUNT: usize = 0x54C;
    pub const ADDRESS: usize = 0x588;

    pub const EVENTS: [usize; 7] = [
        EVENTS_STOPPED,
        EVENTS_ERROR,
        EVENTS_SUSPENDED,
        EVENTS_RXSTARTED,
        EVENTS_TXSTARTED,
        EVENTS_LASTRX,
        EVENTS_LASTTX,
    ];

    pub const ENABLE_TWIM: u32 = 6;
    pub const PSEL_DISCONNECTED: u32 = 1 << 31;
}

pub use reg::*;

/// Largest transfer MAXCNT can describe on the nRF52810.
pub const MAX_TRANSFER: usize = 255;

/// Data RAM on every nRF52 part.
pub const RAM: Range<usize> = 0x2000_0000..0x3000_0000;

/// Longest TX that gets copied out of flash, and longest run of chained
/// writes in one transaction.
pub const COPY_BUFFER: usize = 16;

/// Whether EasyDMA can reach `len` bytes at `start`.
pub fn in_ram(start: usize, len: usize) -> bool {
    RAM.contains(&start) && start.saturating_add(len) <= RAM.end
}

#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Shorts {
    #[bit(7, rw)]
    pub lasttx_startrx: bool,
    #[bit(8, rw)]
    pub lasttx_suspend: bool,
    #[bit(9, rw)]
    pub lasttx_stop: bool,
    #[bit(10, rw)]
    pub lastrx_starttx: bool,
    #[bit(12, rw)]
    pub lastrx_stop: bool,
}

impl Shorts {
    /// TX, repeated start, RX, STOP.
    pub const WRITE_READ: Self = Self::DEFAULT
        .with_lasttx_startrx(true)
        .with_lastrx_stop(true);
    pub const WRITE: Self = Self::DEFAULT.with_lasttx_stop(true);
    pub const READ: Self = Self::DEFAULT.with_lastrx_stop(true);
}

#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct ErrorSrc {
    #[bit(0, rw)]
    pub overrun: bool,
    #[bit(1, rw)]
    pub address_nack: bool,
    #[bit(2, rw)]
    pub data_nack: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Frequency {
    K100 = 0x0198_0000,
    K250 = 0x0400_0000,
    K400 = 0x0640_0000,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwimError {
    /// Neither STOPPED nor ERROR showed up in time.
    Timeout,
    AddressNack,
    DataNack,
    Overrun,
    /// ERROR with no source, or fewer bytes moved than requested.
    Incomplete,
    /// Transfer longer than MAXCNT allows.
    TooLong,
    /// Transaction attempted while the bus is powered down.
    Disabled,
    /// TX outside RAM and longer than the copy buffer.
    NotInRam,
    /// Operation sequence the hardware can't run without a STOP in between.
    Unchainable,
}

impl i2c::Error for TwimError {
    fn kind(&self) -> ErrorKind {
        match self {
            TwimError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            TwimError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            TwimError::Overrun => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}

/// Switching a sensor's supply together with the bus it hangs off.
pub trait PoweredBus {
    fn power_up(&mut self);
    fn power_down(&mut self);
}

impl<T: PoweredBus> PoweredBus for &mut T {
    fn power_up(&mut self) {
        T::power_up(self)
    }

    fn power_down(&mut self) {
        T::power_down(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwimPins {
    pub scl: u8,
    pub sda: u8,
    /// Sensor supply driven from a GPIO, if the board has one.
    pub power: Option<u8>,
}

enum Finish {
    Stopped,
    Error,
}

/// One TWIM instance and the pins it owns.
pub struct BusMaster<R: Mmio, G: Mmio> {
    regs: R,
    port: Port<G>,
    pins: TwimPins,
    address: u8,
    frequency: Frequency,
    timeout: Poll,
    enabled: bool,
}

impl<R: Mmio, G: Mmio> BusMaster<R, G> {
    /// Clock stretching on the SI7051 can hold a transfer for ~11 ms, so the
    /// default wait is generous.
    pub const DEFAULT_TIMEOUT: Poll = Poll::spin(1_000_000);

    pub fn new(regs: R, port: Port<G>, pins: TwimPins) -> Self {
        Self {
            regs,
            port,
            pins,
            address: 0,
            frequency: Frequency::K400,
            timeout: Self::DEFAULT_TIMEOUT,
            enabled: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Poll) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Put the pins in their idle pulled-up state, connect them, power the
    /// sensor and enable the peripheral.
    pub fn init(&mut self, address: u8, frequency: Frequency) {
        debug!("twim init addr {:#x}", address);
        self.address = address;
        self.frequency = frequency;

        self.regs.write(INTENCLR, 0xFFFF_FFFF);
        self.regs.write(ADDRESS, address as u32);
        self.regs.write(FREQUENCY, frequency as u32);

        self.port.configure(self.pins.scl, PinCnf::i2c_idle());
        self.port.configure(self.pins.sda, PinCnf::i2c_idle());
        self.regs.write(PSEL_SCL, self.pins.scl as u32);
        self.regs.write(PSEL_SDA, self.pins.sda as u32);

        if let Some(power) = self.pins.power {
            self.port.configure(power, PinCnf::power_output());
            self.port.set_high(power);
        }

        self.regs.write(ENABLE, ENABLE_TWIM);
        self.enabled = true;
    }

    /// Disable, cut sensor power and release the pins so nothing back-powers
    /// the sensor through a pull-up.
    pub fn deinit(&mut self) {
        debug!("twim deinit");
        self.regs.write(ENABLE, 0);
        self.enabled = false;

        if let Some(power) = self.pins.power {
            self.port.set_low(power);
            self.port.reset(power);
        }

        self.regs.write(PSEL_SCL, PSEL_DISCONNECTED);
        self.regs.write(PSEL_SDA, PSEL_DISCONNECTED);
        self.port.reset(self.pins.scl);
        self.port.reset(self.pins.sda);
    }

    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), TwimError> {
        self.transfer(address, bytes, &mut [])
    }

    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), TwimError> {
        self.transfer(address, &[], buffer)
    }

    pub fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), TwimError> {
        self.transfer(address, bytes, buffer)
    }

    fn transfer(&mut self, address: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), TwimError> {
        if !self.enabled {
            return Err(TwimError::Disabled);
        }
        if tx.len() > MAX_TRANSFER || rx.len() > MAX_TRANSFER {
            return Err(TwimError::TooLong);
        }
        if tx.is_empty() || in_ram(tx.as_ptr() as usize, tx.len()) {
            return self.transfer_in_ram(address, tx, rx);
        }
        if tx.len() > COPY_BUFFER {
            return Err(TwimError::NotInRam);
        }
        let mut copy = [0; COPY_BUFFER];
        copy[..tx.len()].copy_from_slice(tx);
        self.transfer_in_ram(address, &copy[..tx.len()], rx)
    }

    fn transfer_in_ram(&mut self, address: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), TwimError> {
        let (shorts, start) = match (tx.is_empty(), rx.is_empty()) {
            (false, false) => (Shorts::WRITE_READ, TASKS_STARTTX),
            (false, true) => (Shorts::WRITE, TASKS_STARTTX),
            (true, false) => (Shorts::READ, TASKS_STARTRX),
            (true, true) => return Ok(()),
        };
        trace!(
            "twim addr {:#x} tx {:?} rx len {}",
            address,
            tx,
            rx.len()
        );

        self.regs.write(ADDRESS, address as u32);
        self.clear_events();

        self.regs.write_ptr(TXD_PTR, tx.as_ptr());
        self.regs.write(TXD_MAXCNT, tx.len() as u32);
        self.regs.write_ptr(RXD_PTR, rx.as_mut_ptr());
        self.regs.write(RXD_MAXCNT, rx.len() as u32);

        self.regs.write(SHORTS, shorts.raw_value());
        self.regs.trigger(start);

        match self.wait_finish() {
            Some(Finish::Stopped) => {
                // AMOUNT keeps its old value for a direction that did not run.
                let sent = match tx.len() {
                    0 => 0,
                    _ => self.regs.read(TXD_AMOUNT) as usize,
                };
                let received = match rx.len() {
                    0 => 0,
                    _ => self.regs.read(RXD_AMOUNT) as usize,
                };
                if sent != tx.len() || received != rx.len() {
                    warn!(
                        "twim short transfer, tx {}/{} rx {}/{}",
                        sent,
                        tx.len(),
                        received,
                        rx.len()
                    );
                    self.recover();
                    return Err(TwimError::Incomplete);
                }
                self.regs.clear(EVENTS_STOPPED);
                Ok(())
            }
            Some(Finish::Error) => Err(self.stop_after_error()),
            None => {
                warn!("twim timed out");
                self.recover();
                Err(TwimError::Timeout)
            }
        }
    }

    fn wait_finish(&mut self) -> Option<Finish> {
        let regs = &self.regs;
        let mut finish = None;
        poll_until(&mut Spin, self.timeout, || {
            if regs.event(EVENTS_ERROR) {
                finish = Some(Finish::Error);
            } else if regs.event(EVENTS_STOPPED) {
                finish = Some(Finish::Stopped);
            }
            finish.is_some()
        })
        .ok()?;
        finish
    }

    /// ERROR does not stop the bus by itself. Issue STOP, wait for it, then
    /// report whatever ERRORSRC latched.
    fn stop_after_error(&mut self) -> TwimError {
        self.regs.trigger(TASKS_STOP);
        let regs = &self.regs;
        let drained = poll_until(&mut Spin, self.timeout, || regs.event(EVENTS_STOPPED));

        let source = ErrorSrc::new_with_raw_value(self.regs.read(ERRORSRC));
        // write-one-to-clear
        self.regs.write(ERRORSRC, 0b111);
        self.clear_events();

        let error = if source.address_nack() {
            TwimError::AddressNack
        } else if source.data_nack() {
            TwimError::DataNack
        } else if source.overrun() {
            TwimError::Overrun
        } else {
            TwimError::Incomplete
        };
        debug!("twim error {:?}", error);

        if drained.is_err() || error == TwimError::Incomplete {
            self.recover();
        }
        error
    }

    /// Disable, clear latched errors and shorts, enable again.
    fn recover(&mut self) {
        warn!("twim recovering");
        self.regs.write(ENABLE, 0);
        self.regs.write(ERRORSRC, 0b111);
        self.regs.write(SHORTS, 0);
        self.clear_events();
        self.regs.write(ENABLE, ENABLE_TWIM);
    }

    fn clear_events(&mut self) {
        for event in EVENTS {
            self.regs.clear(event);
        }
    }
}

impl<R: Mmio, G: Mmio> PoweredBus for BusMaster<R, G> {
    fn power_up(&mut self) {
        self.init(self.address, self.frequency);
    }

    fn power_down(&mut self) {
        self.deinit();
    }
}

impl<R: Mmio, G: Mmio> i2c::ErrorType for BusMaster<R, G> {
    type Error = TwimError;
}

impl<R: Mmio, G: Mmio> i2c::I2c for BusMaster<R, G> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match operations {
            [Operation::Write(tx)] => self.transfer(address, tx, &mut []),
            [Operation::Read(rx)] => self.transfer(address, &[], rx),
            [Operation::Write(tx), Operation::Read(rx)] => self.transfer(address, tx, rx),
            // Consecutive writes go out as one TX. What's left has to be at
            // most one read, the only thing TX can chain into.
            _ => {
                let split = operations
                    .iter()
                    .position(|operation| matches!(operation, Operation::Read(_)))
                    .unwrap_or(operations.len());
                let (writes, reads) = operations.split_at_mut(split);

                let mut tx = [0; COPY_BUFFER];
                let mut len = 0;
                for operation in writes.iter() {
                    if let Operation::Write(bytes) = operation {
                        let end = len + bytes.len();
                        if end > COPY_BUFFER {
                            return Err(TwimError::TooLong);
                        }
                        tx[len..end].copy_from_slice(bytes);
                        len = end;
                    }
                }

                match reads {
                    [] => self.transfer(address, &tx[..len], &mut []),
                    [Operation::Read(rx)] => self.transfer(address, &tx[..len], rx),
                    _ => Err(TwimError::Unchainable),
                }
            }
        }
    }
}
