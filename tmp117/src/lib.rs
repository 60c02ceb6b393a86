#![cfg_attr(not(test), no_std)]

mod fmt;

use beacon_hal::poll::{poll_for, Poll};
use embedded_hal::{delay::DelayNs, i2c::I2c};

pub mod i2c;
pub mod types;

use i2c::Tmp117I2c;
pub use types::{Address, Averaging, Config, ConversionMode, DeviceId, Register, Temperature};

/// Power-on until the first register access.
pub const STARTUP_MS: u32 = 2;
/// Soft reset takes as long as power-on.
pub const RESET_MS: u32 = STARTUP_MS;

/// TMP117 driver
pub struct Tmp117<I, D> {
    bus: I,
    timer: D,
    config_retry: Poll,
    ready_poll: Poll,
}

impl<I2C: I2c, D: DelayNs> Tmp117<Tmp117I2c<I2C>, D> {
    /// Creates a new TMP117 driver on I2C. Does not touch the device; power
    /// it and call [`Tmp117::wait_startup`] first.
    pub fn new_i2c(i2c: I2C, address: Address, timer: D) -> Self {
        Self::new(Tmp117I2c::new(i2c, address as u8), timer)
    }

    pub fn i2c_mut(&mut self) -> &mut I2C {
        self.bus.i2c_mut()
    }
}

impl<I: Interface, D: DelayNs> Tmp117<I, D> {
    pub fn new(bus: I, timer: D) -> Self {
        Self {
            bus,
            timer,
            config_retry: Poll::every_ms(10, 1),
            ready_poll: Poll::every_ms(20, 1),
        }
    }

    pub fn release(self) -> (I, D) {
        (self.bus, self.timer)
    }

    pub fn wait_startup(&mut self) {
        self.timer.delay_ms(STARTUP_MS);
    }

    pub fn device_id(&mut self) -> Result<DeviceId, Error<I::Error>> {
        let raw = self.bus.read_register(Register::DeviceId)?;
        Ok(DeviceId::new_with_raw_value(raw))
    }

    /// Check this really is a TMP117.
    pub fn verify(&mut self) -> Result<DeviceId, Error<I::Error>> {
        let id = self.device_id()?;
        if !id.is_tmp117() {
            error!("TMP117 device id check failed, got {:#x}", id.raw_value());
            return Err(Error::WrongDevice(id.raw_value()));
        }
        info!("TMP117 revision {}", id.revision().value());
        Ok(id)
    }

    pub fn config(&mut self) -> Result<Config, Error<I::Error>> {
        Ok(Config::new_with_raw_value(
            self.bus.read_register(Register::Configuration)?,
        ))
    }

    /// Read-modify-write of the configuration register. Returns what was
    /// written.
    pub fn modify_config(
        &mut self,
        f: impl FnOnce(Config) -> Config,
    ) -> Result<Config, Error<I::Error>> {
        let config = f(self.config()?);
        self.bus
            .write_register(Register::Configuration, config.raw_value())?;
        Ok(config)
    }

    pub fn set_mode(
        &mut self,
        mode: ConversionMode,
        averaging: Averaging,
    ) -> Result<Config, Error<I::Error>> {
        self.modify_config(|c| c.with_mode(mode).with_averaging(averaging))
    }

    pub fn shutdown(&mut self) -> Result<(), Error<I::Error>> {
        self.modify_config(|c| c.with_mode(ConversionMode::Shutdown))?;
        Ok(())
    }

    pub fn soft_reset(&mut self) -> Result<(), Error<I::Error>> {
        self.modify_config(|c| c.with_soft_reset(true))?;
        self.timer.delay_ms(RESET_MS);
        Ok(())
    }

    pub fn data_ready(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.config()?.data_ready())
    }

    /// The result register. The reset value means no conversion has
    /// completed and is reported as an error.
    pub fn temperature(&mut self) -> Result<Temperature, Error<I::Error>> {
        let raw = self.bus.read_register(Register::Temperature)? as i16;
        if Temperature(raw) == Temperature::RESET {
            warn!("TMP117 result register still at reset value");
            return Err(Error::InvalidReading);
        }
        Ok(Temperature(raw))
    }

    /// Start a one-shot conversion with `averaging`, wait it out and read
    /// the result.
    pub fn one_shot(&mut self, averaging: Averaging) -> Result<Temperature, Error<I::Error>> {
        let bus = &mut self.bus;
        poll_for(&mut self.timer, self.config_retry, || {
            let config = Config::new_with_raw_value(bus.read_register(Register::Configuration).ok()?)
                .with_mode(ConversionMode::OneShot)
                .with_averaging(averaging);
            bus.write_register(Register::Configuration, config.raw_value())
                .ok()
        })
        .map_err(|_| Error::ConfigTimeout)?;

        self.timer.delay_us(averaging.conversion_us());

        let bus = &mut self.bus;
        let (_, polls) = poll_for(&mut self.timer, self.ready_poll, || {
            let raw = bus.read_register(Register::Configuration).ok()?;
            Config::new_with_raw_value(raw).data_ready().then_some(())
        })
        .map_err(|_| Error::DataReadyTimeout)?;
        debug!("TMP117 data ready after {} polls", polls);

        self.temperature()
    }

    pub fn offset(&mut self) -> Result<Temperature, Error<I::Error>> {
        Ok(Temperature(
            self.bus.read_register(Register::TemperatureOffset)? as i16,
        ))
    }

    pub fn set_offset(&mut self, offset: Temperature) -> Result<(), Error<I::Error>> {
        self.bus
            .write_register(Register::TemperatureOffset, offset.0 as u16)?;
        Ok(())
    }

    pub fn set_limits(
        &mut self,
        low: Temperature,
        high: Temperature,
    ) -> Result<(), Error<I::Error>> {
        self.bus.write_register(Register::LowLimit, low.0 as u16)?;
        self.bus.write_register(Register::HighLimit, high.0 as u16)?;
        Ok(())
    }

    pub fn eeprom_busy(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.config()?.eeprom_busy())
    }

    /// Program one of the three general purpose EEPROM words. The register
    /// write is latched into EEPROM while unlocked, which takes ~7 ms.
    pub fn write_eeprom(&mut self, slot: EepromSlot, value: u16) -> Result<(), Error<I::Error>> {
        self.bus.write_register(Register::EepromUnlock, EEPROM_UNLOCK)?;
        self.bus.write_register(slot.register(), value)?;
        let bus = &mut self.bus;
        let done = poll_for(&mut self.timer, Poll::every_ms(10, 1), || {
            let raw = bus.read_register(Register::Configuration).ok()?;
            (!Config::new_with_raw_value(raw).eeprom_busy()).then_some(())
        });
        self.bus.write_register(Register::EepromUnlock, 0)?;
        done.map(|_| ()).map_err(|_| Error::EepromTimeout)
    }

    pub fn read_eeprom(&mut self, slot: EepromSlot) -> Result<u16, Error<I::Error>> {
        Ok(self.bus.read_register(slot.register())?)
    }
}

const EEPROM_UNLOCK: u16 = 1 << 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromSlot {
    One,
    Two,
    Three,
}

impl EepromSlot {
    fn register(self) -> Register {
        match self {
            EepromSlot::One => Register::Eeprom1,
            EepromSlot::Two => Register::Eeprom2,
            EepromSlot::Three => Register::Eeprom3,
        }
    }
}

pub trait Interface {
    type Error;
    fn write_register(&mut self, register: Register, value: u16) -> Result<(), Self::Error>;
    fn read_register(&mut self, register: Register) -> Result<u16, Self::Error>;
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    InterfaceError(E),
    /// The one-shot configuration never got written.
    ConfigTimeout,
    DataReadyTimeout,
    EepromTimeout,
    /// Result register at its reset value.
    InvalidReading,
    WrongDevice(u16),
}

impl<E> From<E> for Error<E> {
    fn from(t: E) -> Self {
        Error::InterfaceError(t)
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

    use super::*;

    /// Register-level model of the chip.
    struct FakeTmp117 {
        regs: [u16; 16],
        pointer: usize,
        /// What the next one-shot conversion produces.
        pending: i16,
        /// Config reads before DATA_READY shows.
        ready_after: u32,
        config_reads: u32,
        /// Transactions to NACK before behaving.
        nacks: u32,
        eeprom_busy_reads: u32,
        writes: Vec<(u8, u16)>,
    }

    impl FakeTmp117 {
        fn new(pending: i16) -> Self {
            let mut regs = [0; 16];
            regs[0] = Temperature::RESET.0 as u16;
            regs[1] = Config::DEFAULT.raw_value();
            regs[0x0F] = 0x1117;
            Self {
                regs,
                pointer: 0,
                pending,
                ready_after: 0,
                config_reads: 0,
                nacks: 0,
                eeprom_busy_reads: 0,
                writes: Vec::new(),
            }
        }

        fn store(&mut self, register: usize, value: u16) {
            match register {
                1 => {
                    if Config::new_with_raw_value(value).mode() == ConversionMode::OneShot {
                        self.config_reads = 0;
                        self.regs[0] = self.pending as u16;
                    }
                    // status bits are read only
                    self.regs[1] = value & 0x0FFF;
                }
                5 | 6 | 8 => {
                    self.regs[register] = value;
                    self.eeprom_busy_reads = 2;
                }
                _ => self.regs[register] = value,
            }
        }

        fn load(&mut self, register: usize) -> u16 {
            if register != 1 {
                return self.regs[register];
            }
            self.config_reads += 1;
            let mut value = self.regs[1];
            let one_shot = Config::new_with_raw_value(value).mode() == ConversionMode::OneShot;
            if one_shot && self.config_reads > self.ready_after {
                value |= 1 << 13;
            }
            if self.eeprom_busy_reads > 0 {
                self.eeprom_busy_reads -= 1;
                value |= 1 << 12;
            }
            value
        }
    }

    impl ErrorType for FakeTmp117 {
        type Error = ErrorKind;
    }

    impl I2c for FakeTmp117 {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            assert_eq!(address, 0x48);
            if self.nacks > 0 {
                self.nacks -= 1;
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.pointer = bytes[0] as usize;
                        if bytes.len() == 3 {
                            let value = u16::from_be_bytes([bytes[1], bytes[2]]);
                            self.writes.push((bytes[0], value));
                            self.store(self.pointer, value);
                        }
                    }
                    Operation::Read(buf) => {
                        let value = self.load(self.pointer);
                        buf.copy_from_slice(&value.to_be_bytes());
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay {
        us: u64,
    }

    impl DelayNs for Delay {
        fn delay_ns(&mut self, ns: u32) {
            self.us += ns as u64 / 1000;
        }
    }

    fn driver(fake: FakeTmp117) -> Tmp117<Tmp117I2c<FakeTmp117>, Delay> {
        Tmp117::new_i2c(fake, Address::Gnd, Delay::default())
    }

    #[test]
    fn one_shot_waits_conversion_then_polls_ready() {
        let mut fake = FakeTmp117::new(1600);
        fake.ready_after = 3;
        let mut tmp = driver(fake);

        let t = tmp.one_shot(Averaging::None).unwrap();
        assert_eq!(t, Temperature(1600));
        assert_eq!(t.x10f(), 545);

        let (i2c, delay) = tmp.release();
        let fake = i2c.release();
        // 15.5 ms conversion plus three 1 ms ready polls
        assert_eq!(delay.us, 18_500);
        assert_eq!(fake.writes, vec![(1, 0x0E00)]);
    }

    #[test]
    fn averaging_changes_the_wait() {
        let mut tmp = driver(FakeTmp117::new(-640));
        let t = tmp.one_shot(Averaging::Avg8).unwrap();
        assert_eq!(t.x10f(), 230);
        let (_, delay) = tmp.release();
        assert_eq!(delay.us, 125_000);
    }

    #[test]
    fn data_ready_never_comes() {
        let mut fake = FakeTmp117::new(1600);
        fake.ready_after = 100;
        let mut tmp = driver(fake);
        assert_eq!(tmp.one_shot(Averaging::None), Err(Error::DataReadyTimeout));
        let (_, delay) = tmp.release();
        assert_eq!(delay.us, 15_500 + 19_000);
    }

    #[test]
    fn config_write_retried_through_nacks() {
        let mut fake = FakeTmp117::new(1600);
        fake.nacks = 3;
        let mut tmp = driver(fake);
        assert_eq!(tmp.one_shot(Averaging::None), Ok(Temperature(1600)));

        let mut fake = FakeTmp117::new(1600);
        fake.nacks = 50;
        let mut tmp = driver(fake);
        assert_eq!(tmp.one_shot(Averaging::None), Err(Error::ConfigTimeout));
    }

    #[test]
    fn reset_value_is_not_a_reading() {
        let mut tmp = driver(FakeTmp117::new(i16::MIN));
        assert_eq!(tmp.one_shot(Averaging::None), Err(Error::InvalidReading));
    }

    #[test]
    fn bus_errors_are_wrapped() {
        let mut fake = FakeTmp117::new(0);
        fake.nacks = 1;
        let mut tmp = driver(fake);
        assert_eq!(
            tmp.device_id(),
            Err(Error::InterfaceError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address
            )))
        );
    }

    #[test]
    fn verify_checks_device_id() {
        let mut tmp = driver(FakeTmp117::new(0));
        assert!(tmp.verify().unwrap().is_tmp117());

        let mut fake = FakeTmp117::new(0);
        fake.regs[0x0F] = 0x0211;
        let mut tmp = driver(fake);
        assert_eq!(tmp.verify(), Err(Error::WrongDevice(0x0211)));
    }

    #[test]
    fn set_mode_keeps_other_config_bits() {
        let mut tmp = driver(FakeTmp117::new(0));
        let written = tmp
            .set_mode(ConversionMode::Shutdown, Averaging::Avg64)
            .unwrap();
        assert_eq!(written.raw_value(), 0x0660);
        assert_eq!(written.cycle().value(), 4);
    }

    #[test]
    fn offset_round_trips_through_register() {
        let mut tmp = driver(FakeTmp117::new(0));
        tmp.set_offset(Temperature(-64)).unwrap();
        assert_eq!(tmp.offset().unwrap(), Temperature(-64));
    }

    #[test]
    fn eeprom_write_unlocks_waits_and_locks() {
        let mut tmp = driver(FakeTmp117::new(0));
        tmp.write_eeprom(EepromSlot::Two, 0xBEEF).unwrap();
        assert_eq!(tmp.read_eeprom(EepromSlot::Two).unwrap(), 0xBEEF);
        let (i2c, _) = tmp.release();
        assert_eq!(
            i2c.release().writes,
            vec![(4, 0x8000), (6, 0xBEEF), (4, 0)]
        );
    }
}
