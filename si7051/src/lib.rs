#![cfg_attr(not(test), no_std)]

mod fmt;

use beacon_hal::poll::{poll_for, Poll};
use embedded_hal::{delay::DelayNs, i2c::I2c};

pub mod types;

pub use types::{Code, Command, FirmwareRevision, Resolution, UserRegister};

/// The only address the part answers on.
pub const ADDRESS: u8 = 0x40;
/// Time for the supply to settle before the first command. Power-up proper
/// takes up to 80 ms; the first measurement's retries absorb the rest.
pub const STARTUP_MS: u32 = 2;
pub const RESET_MS: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasureMode {
    /// One write-read, the part stretches the clock until done.
    #[default]
    Hold,
    /// Command, then reads that NACK until the result is there.
    NoHold,
}

/// SI7051 driver
pub struct Si7051<I, D> {
    i2c: I,
    timer: D,
    measure_poll: Poll,
}

impl<I: I2c, D: DelayNs> Si7051<I, D> {
    pub fn new(i2c: I, timer: D) -> Self {
        Self {
            i2c,
            timer,
            // 14 bit conversions take 10.8 ms at worst; this is the upper
            // bound across supply and temperature.
            measure_poll: Poll::every_ms(95, 1),
        }
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.timer)
    }

    pub fn i2c_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    pub fn wait_startup(&mut self) {
        self.timer.delay_ms(STARTUP_MS);
    }

    fn command(&mut self, command: Command) -> Result<(), Error<I::Error>> {
        trace!("Si7051::command({:?})", command);
        self.i2c.write(ADDRESS, &[command as u8])?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::Reset)?;
        self.timer.delay_ms(RESET_MS);
        Ok(())
    }

    pub fn user_register(&mut self) -> Result<UserRegister, Error<I::Error>> {
        let mut value = [0];
        self.i2c
            .write_read(ADDRESS, &[Command::ReadUser as u8], &mut value)?;
        Ok(UserRegister::new_with_raw_value(value[0]))
    }

    /// Read-modify-write so the reserved bits keep whatever the part holds.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<I::Error>> {
        let user = self.user_register()?.with_resolution(resolution);
        debug!("Si7051 user register <- {:#x}", user.raw_value());
        self.i2c
            .write(ADDRESS, &[Command::WriteUser as u8, user.raw_value()])?;
        Ok(())
    }

    pub fn resolution(&mut self) -> Result<Resolution, Error<I::Error>> {
        Ok(self.user_register()?.resolution())
    }

    pub fn vdd_low(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.user_register()?.vdd_low())
    }

    pub fn measure(&mut self, mode: MeasureMode) -> Result<Code, Error<I::Error>> {
        match mode {
            MeasureMode::Hold => self.measure_hold(),
            MeasureMode::NoHold => self.measure_no_hold(),
        }
    }

    /// A failed transfer (the bus master giving up on a long stretch, or a
    /// NACK while the part is still powering up) is retried.
    pub fn measure_hold(&mut self) -> Result<Code, Error<I::Error>> {
        let i2c = &mut self.i2c;
        let (code, attempts) = poll_for(&mut self.timer, self.measure_poll, || {
            let mut data = [0; 2];
            i2c.write_read(ADDRESS, &[Command::MeasureHold as u8], &mut data)
                .ok()?;
            Some(Code(u16::from_be_bytes(data)))
        })
        .map_err(|_| Error::Timeout)?;
        trace!("Si7051 hold measurement took {} attempts", attempts);
        Ok(code)
    }

    pub fn start_measurement(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::MeasureNoHold)
    }

    /// `None` while the conversion is still running.
    pub fn poll_measurement(&mut self) -> Option<Code> {
        let mut data = [0; 2];
        self.i2c.read(ADDRESS, &mut data).ok()?;
        Some(Code(u16::from_be_bytes(data)))
    }

    pub fn measure_no_hold(&mut self) -> Result<Code, Error<I::Error>> {
        self.start_measurement()?;
        let i2c = &mut self.i2c;
        let (code, attempts) = poll_for(&mut self.timer, self.measure_poll, || {
            let mut data = [0; 2];
            i2c.read(ADDRESS, &mut data).ok()?;
            Some(Code(u16::from_be_bytes(data)))
        })
        .map_err(|_| Error::Timeout)?;
        trace!("Si7051 no-hold measurement took {} polls", attempts);
        Ok(code)
    }

    /// 64 bit electronic serial number, SNA then SNB, CRC bytes dropped.
    pub fn serial_number(&mut self) -> Result<u64, Error<I::Error>> {
        let mut first = [0; 8];
        self.i2c.write_read(ADDRESS, &types::READ_ID1, &mut first)?;
        let mut second = [0; 6];
        self.i2c.write_read(ADDRESS, &types::READ_ID2, &mut second)?;
        let bytes = [
            first[0], first[2], first[4], first[6], second[0], second[1], second[3], second[4],
        ];
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn firmware_revision(&mut self) -> Result<FirmwareRevision, Error<I::Error>> {
        let mut value = [0];
        self.i2c
            .write_read(ADDRESS, &types::READ_FIRMWARE_REVISION, &mut value)?;
        Ok(FirmwareRevision::from(value[0]))
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    InterfaceError(E),
    /// No result within the worst case conversion time.
    Timeout,
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

    struct FakeSi7051 {
        user: u8,
        code: u16,
        /// Measurement transactions that NACK before the result is there.
        busy_for: u32,
        converting: bool,
        writes: Vec<Vec<u8>>,
        last_command: Vec<u8>,
    }

    impl FakeSi7051 {
        fn new(code: u16) -> Self {
            Self {
                user: 0x3A,
                code,
                busy_for: 0,
                converting: false,
                writes: Vec::new(),
                last_command: Vec::new(),
            }
        }

        fn nack() -> ErrorKind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        }
    }

    impl ErrorType for FakeSi7051 {
        type Error = ErrorKind;
    }

    impl I2c for FakeSi7051 {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            assert_eq!(address, ADDRESS);
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.writes.push(bytes.to_vec());
                        match bytes[0] {
                            0xE6 => self.user = bytes[1],
                            0xF3 => self.converting = true,
                            0xE3 if self.busy_for > 0 => {
                                self.busy_for -= 1;
                                return Err(Self::nack());
                            }
                            _ => {}
                        }
                        self.last_command = bytes.to_vec();
                    }
                    Operation::Read(buf) => match self.last_command.as_slice() {
                        [0xE7] => buf[0] = self.user,
                        [0xE3] | [0xF3] => {
                            if self.last_command == [0xF3] {
                                if !self.converting {
                                    return Err(Self::nack());
                                }
                                if self.busy_for > 0 {
                                    self.busy_for -= 1;
                                    return Err(Self::nack());
                                }
                                self.converting = false;
                            }
                            buf.copy_from_slice(&self.code.to_be_bytes());
                        }
                        [0xFA, 0x0F] => buf.copy_from_slice(&[1, 0xC1, 2, 0xC2, 3, 0xC3, 4, 0xC4]),
                        [0xFC, 0xC9] => buf.copy_from_slice(&[5, 6, 0xC5, 7, 8, 0xC6]),
                        [0x84, 0xB8] => buf[0] = 0x20,
                        _ => return Err(Self::nack()),
                    },
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay {
        ms: u32,
    }

    impl DelayNs for Delay {
        fn delay_ns(&mut self, ns: u32) {
            self.ms += ns / 1_000_000;
        }

        fn delay_us(&mut self, us: u32) {
            self.ms += us / 1000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.ms += ms;
        }
    }

    #[test]
    fn hold_measurement_single_transfer() {
        let mut si = Si7051::new(FakeSi7051::new(26796), Delay::default());
        let code = si.measure(MeasureMode::Hold).unwrap();
        assert_eq!(code.x10f(), 769);
        let (fake, delay) = si.release();
        assert_eq!(fake.writes, vec![vec![0xE3]]);
        assert_eq!(delay.ms, 0);
    }

    #[test]
    fn hold_measurement_retries_each_millisecond() {
        let mut fake = FakeSi7051::new(26796);
        fake.busy_for = 4;
        let mut si = Si7051::new(fake, Delay::default());
        assert_eq!(si.measure_hold(), Ok(Code(26796)));
        assert_eq!(si.release().1.ms, 4);
    }

    #[test]
    fn no_hold_polls_until_ack() {
        let mut fake = FakeSi7051::new(26796);
        fake.busy_for = 10;
        let mut si = Si7051::new(fake, Delay::default());
        assert_eq!(si.measure(MeasureMode::NoHold), Ok(Code(26796)));
        let (fake, delay) = si.release();
        assert_eq!(fake.writes, vec![vec![0xF3]]);
        assert_eq!(delay.ms, 10);
    }

    #[test]
    fn no_hold_gives_up_after_95_ms() {
        let mut fake = FakeSi7051::new(26796);
        fake.busy_for = 200;
        let mut si = Si7051::new(fake, Delay::default());
        assert_eq!(si.measure_no_hold(), Err(Error::Timeout));
        assert_eq!(si.release().1.ms, 94);
    }

    #[test]
    fn poll_before_start_is_not_ready() {
        let mut si = Si7051::new(FakeSi7051::new(26796), Delay::default());
        assert_eq!(si.poll_measurement(), None);
        si.start_measurement().unwrap();
        assert_eq!(si.poll_measurement(), Some(Code(26796)));
    }

    #[test]
    fn set_resolution_is_read_modify_write() {
        let mut fake = FakeSi7051::new(0);
        fake.user = 0x7A;
        let mut si = Si7051::new(fake, Delay::default());
        si.set_resolution(Resolution::Bits11).unwrap();
        assert_eq!(si.resolution(), Ok(Resolution::Bits11));
        assert_eq!(si.vdd_low(), Ok(true));
        let (fake, _) = si.release();
        assert_eq!(fake.user, 0xFB);
        assert_eq!(fake.writes[..2], [vec![0xE7], vec![0xE6, 0xFB]]);
    }

    #[test]
    fn serial_number_skips_crc_bytes() {
        let mut si = Si7051::new(FakeSi7051::new(0), Delay::default());
        assert_eq!(si.serial_number(), Ok(0x0102_0304_0506_0708));
    }

    #[test]
    fn firmware_revision_and_reset() {
        let mut si = Si7051::new(FakeSi7051::new(0), Delay::default());
        assert_eq!(si.firmware_revision(), Ok(FirmwareRevision::V2_0));
        si.reset().unwrap();
        let (fake, delay) = si.release();
        assert_eq!(fake.writes.last(), Some(&vec![0xFE]));
        assert_eq!(delay.ms, RESET_MS);
    }
}
