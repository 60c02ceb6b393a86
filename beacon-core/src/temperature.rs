//! Temperature sources. Each one owns its history and powers its sensor only
//! for the duration of a read.

use core::fmt;
use core::ops::{Deref, DerefMut};

use beacon_hal::PoweredBus;
use embedded_hal::{delay::DelayNs, i2c::I2c};
use si7051::{MeasureMode, Si7051};
use tmp117::{i2c::Tmp117I2c, Address, Averaging, Tmp117};

use crate::history::HistoryBuffer;

/// Tenths of a degree Fahrenheit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TenthsF(pub i16);

impl TenthsF {
    pub const MIN: TenthsF = TenthsF(-400);
    pub const MAX: TenthsF = TenthsF(1800);
    /// Shown in place of a reading that failed. Never stored.
    pub const FAILED: TenthsF = TenthsF(-999);

    pub fn clamped(value: i32) -> Self {
        TenthsF(value.clamp(Self::MIN.0 as i32, Self::MAX.0 as i32) as i16)
    }

    /// From the die sensor's quarter degrees Celsius.
    pub fn from_quarter_celsius(quarters: i32) -> Self {
        Self::clamped(quarters * 10 * 9 / 5 / 4 + 320)
    }
}

/// Fixed width with one decimal: `" 82.5"`, `"101.1"`, `"-05.2"`, `"-00.5"`.
/// Scanners show the name as-is, so the columns must not move.
impl fmt::Display for TenthsF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        if self.0 < 0 {
            write!(f, "-{:02}.{}", magnitude / 10, magnitude % 10)
        } else {
            write!(f, "{:3}.{}", magnitude / 10, magnitude % 10)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// NACK, bus error or a stack call that failed.
    Bus,
    /// Conversion never finished.
    Timeout,
    /// The sensor answered with its reset value.
    InvalidReading,
    WrongDevice,
}

impl<E> From<tmp117::Error<E>> for SensorError {
    fn from(e: tmp117::Error<E>) -> Self {
        match e {
            tmp117::Error::InterfaceError(_) => SensorError::Bus,
            tmp117::Error::ConfigTimeout
            | tmp117::Error::DataReadyTimeout
            | tmp117::Error::EepromTimeout => SensorError::Timeout,
            tmp117::Error::InvalidReading => SensorError::InvalidReading,
            tmp117::Error::WrongDevice(_) => SensorError::WrongDevice,
        }
    }
}

impl<E> From<si7051::Error<E>> for SensorError {
    fn from(e: si7051::Error<E>) -> Self {
        match e {
            si7051::Error::InterfaceError(_) => SensorError::Bus,
            si7051::Error::Timeout => SensorError::Timeout,
        }
    }
}

/// Something that produces a temperature and keeps the recent history of it.
pub trait TemperatureSource {
    /// A fresh reading, clamped and already in the history. Failed reads
    /// leave the history alone.
    fn read(&mut self) -> Result<TenthsF, SensorError>;

    fn average(&self) -> Option<TenthsF>;

    fn history_len(&self) -> usize;
}

impl<T: TemperatureSource> TemperatureSource for &mut T {
    fn read(&mut self) -> Result<TenthsF, SensorError> {
        T::read(self)
    }

    fn average(&self) -> Option<TenthsF> {
        T::average(self)
    }

    fn history_len(&self) -> usize {
        T::history_len(self)
    }
}

fn record<const N: usize>(history: &mut HistoryBuffer<N>, reading: TenthsF) -> TenthsF {
    history.insert(reading.0);
    reading
}

/// Runs `off` on the guarded value when dropped, whichever way the read
/// ends.
struct PowerGuard<'a, T> {
    inner: &'a mut T,
    off: fn(&mut T),
}

impl<'a, T> PowerGuard<'a, T> {
    fn new(inner: &'a mut T, on: fn(&mut T), off: fn(&mut T)) -> Self {
        on(inner);
        Self { inner, off }
    }
}

impl<T> Deref for PowerGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner
    }
}

impl<T> DerefMut for PowerGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner
    }
}

impl<T> Drop for PowerGuard<'_, T> {
    fn drop(&mut self) {
        (self.off)(self.inner);
    }
}

/// The stack owns the die sensor, so reads go through it.
pub trait DieThermometer {
    /// Die temperature in 0.25 °C steps.
    fn quarter_celsius(&mut self) -> Result<i32, SensorError>;
}

impl<T: DieThermometer> DieThermometer for &mut T {
    fn quarter_celsius(&mut self) -> Result<i32, SensorError> {
        T::quarter_celsius(self)
    }
}

pub struct InternalDie<T, const N: usize> {
    die: T,
    history: HistoryBuffer<N>,
}

impl<T: DieThermometer, const N: usize> InternalDie<T, N> {
    pub fn new(die: T) -> Self {
        Self {
            die,
            history: HistoryBuffer::new(),
        }
    }
}

impl<T: DieThermometer, const N: usize> TemperatureSource for InternalDie<T, N> {
    fn read(&mut self) -> Result<TenthsF, SensorError> {
        let quarters = self.die.quarter_celsius()?;
        let reading = TenthsF::from_quarter_celsius(quarters);
        debug!("die raw {} -> {}", quarters, reading.0);
        Ok(record(&mut self.history, reading))
    }

    fn average(&self) -> Option<TenthsF> {
        self.history.average().map(TenthsF)
    }

    fn history_len(&self) -> usize {
        N
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tmp117Settings {
    pub address: Address,
    pub averaging: Averaging,
}

impl Default for Tmp117Settings {
    fn default() -> Self {
        Self {
            address: Address::Gnd,
            averaging: Averaging::None,
        }
    }
}

pub struct Tmp117Source<B, D, const N: usize> {
    sensor: Tmp117<Tmp117I2c<B>, D>,
    settings: Tmp117Settings,
    history: HistoryBuffer<N>,
}

impl<B, D, const N: usize> Tmp117Source<B, D, N>
where
    B: I2c + PoweredBus,
    D: DelayNs,
{
    pub fn new(bus: B, timer: D, settings: Tmp117Settings) -> Self {
        Self {
            sensor: Tmp117::new_i2c(bus, settings.address, timer),
            settings,
            history: HistoryBuffer::new(),
        }
    }

    pub fn release(self) -> (B, D) {
        let (bus, timer) = self.sensor.release();
        (bus.release(), timer)
    }

    /// Power up, one-shot conversion, power down.
    fn convert(&mut self) -> Result<tmp117::Temperature, SensorError> {
        let mut sensor = PowerGuard::new(
            &mut self.sensor,
            |s| s.i2c_mut().power_up(),
            |s| s.i2c_mut().power_down(),
        );
        sensor.wait_startup();
        Ok(sensor.one_shot(self.settings.averaging)?)
    }
}

impl<B, D, const N: usize> TemperatureSource for Tmp117Source<B, D, N>
where
    B: I2c + PoweredBus,
    D: DelayNs,
{
    fn read(&mut self) -> Result<TenthsF, SensorError> {
        let raw = self.convert().inspect_err(|e| warn!("TMP117 read failed: {:?}", e))?;
        let reading = TenthsF::clamped(raw.x10f().into());
        debug!("TMP117 raw {} -> {}", raw.0, reading.0);
        Ok(record(&mut self.history, reading))
    }

    fn average(&self) -> Option<TenthsF> {
        self.history.average().map(TenthsF)
    }

    fn history_len(&self) -> usize {
        N
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Si7051Settings {
    pub mode: MeasureMode,
    /// Written after every power up when set. The part wakes up at 14 bits.
    pub resolution: Option<si7051::Resolution>,
}

pub struct Si7051Source<B, D, const N: usize> {
    sensor: Si7051<B, D>,
    settings: Si7051Settings,
    history: HistoryBuffer<N>,
}

impl<B, D, const N: usize> Si7051Source<B, D, N>
where
    B: I2c + PoweredBus,
    D: DelayNs,
{
    pub fn new(bus: B, timer: D, settings: Si7051Settings) -> Self {
        Self {
            sensor: Si7051::new(bus, timer),
            settings,
            history: HistoryBuffer::new(),
        }
    }

    pub fn release(self) -> (B, D) {
        self.sensor.release()
    }

    fn convert(&mut self) -> Result<si7051::Code, SensorError> {
        let mut sensor = PowerGuard::new(
            &mut self.sensor,
            |s| s.i2c_mut().power_up(),
            |s| s.i2c_mut().power_down(),
        );
        sensor.wait_startup();
        if let Some(resolution) = self.settings.resolution {
            sensor.set_resolution(resolution)?;
        }
        Ok(sensor.measure(self.settings.mode)?)
    }
}

impl<B, D, const N: usize> TemperatureSource for Si7051Source<B, D, N>
where
    B: I2c + PoweredBus,
    D: DelayNs,
{
    fn read(&mut self) -> Result<TenthsF, SensorError> {
        let code = self.convert().inspect_err(|e| warn!("SI7051 read failed: {:?}", e))?;
        let reading = TenthsF::clamped(code.x10f().into());
        debug!("SI7051 raw {} -> {}", code.0, reading.0);
        Ok(record(&mut self.history, reading))
    }

    fn average(&self) -> Option<TenthsF> {
        self.history.average().map(TenthsF)
    }

    fn history_len(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

    use super::*;

    #[test]
    fn fixed_width_text() {
        assert_eq!(TenthsF(825).to_string(), " 82.5");
        assert_eq!(TenthsF(545).to_string(), " 54.5");
        assert_eq!(TenthsF(1011).to_string(), "101.1");
        assert_eq!(TenthsF(5).to_string(), "  0.5");
        assert_eq!(TenthsF(-52).to_string(), "-05.2");
        assert_eq!(TenthsF(-5).to_string(), "-00.5");
        assert_eq!(TenthsF(-400).to_string(), "-40.0");
        assert_eq!(TenthsF::FAILED.to_string(), "-99.9");
    }

    #[test]
    fn clamps_to_range() {
        assert_eq!(TenthsF::clamped(-523), TenthsF::MIN);
        assert_eq!(TenthsF::clamped(2500), TenthsF::MAX);
        assert_eq!(TenthsF::clamped(700), TenthsF(700));
    }

    #[test]
    fn die_quarter_degrees() {
        // 25 °C
        assert_eq!(TenthsF::from_quarter_celsius(100), TenthsF(770));
        // 0 °C
        assert_eq!(TenthsF::from_quarter_celsius(0), TenthsF(320));
        // -40 °C
        assert_eq!(TenthsF::from_quarter_celsius(-160), TenthsF(-400));
    }

    struct FakeDie(Result<i32, SensorError>);

    impl DieThermometer for FakeDie {
        fn quarter_celsius(&mut self) -> Result<i32, SensorError> {
            self.0
        }
    }

    #[test]
    fn die_failure_leaves_history_alone() {
        let mut die = InternalDie::<_, 5>::new(FakeDie(Ok(100)));
        assert_eq!(die.read(), Ok(TenthsF(770)));
        die.die.0 = Err(SensorError::Bus);
        assert_eq!(die.read(), Err(SensorError::Bus));
        assert_eq!(die.average(), Some(TenthsF(770)));
        assert_eq!(die.history_len(), 5);
    }

    /// A powered bus with one register-level TMP117 or SI7051 behind it.
    #[derive(Default)]
    struct FakeBus {
        powered: bool,
        power_ups: u32,
        /// What every read returns, MSB first.
        value: [u8; 2],
        /// Config reads before DATA_READY shows. `u32::MAX` never.
        ready_after: u32,
        fail_writes: bool,
        log: Vec<Vec<u8>>,
    }

    impl PoweredBus for FakeBus {
        fn power_up(&mut self) {
            self.powered = true;
            self.power_ups += 1;
        }

        fn power_down(&mut self) {
            self.powered = false;
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            assert!(self.powered, "bus used while powered down");
            let mut register = None;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if self.fail_writes {
                            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                        }
                        register = Some(bytes[0]);
                        self.log.push(bytes.to_vec());
                    }
                    Operation::Read(buf) => match register {
                        // TMP117 configuration
                        Some(0x01) => {
                            let ready = if self.ready_after == 0 {
                                0x2000u16
                            } else {
                                self.ready_after = self.ready_after.saturating_sub(1);
                                0
                            };
                            buf.copy_from_slice(&(0x0220 | ready).to_be_bytes());
                        }
                        _ => buf.copy_from_slice(&self.value[..buf.len()]),
                    },
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay;

    impl DelayNs for Delay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn tmp117_reading_powers_down_after() {
        let bus = FakeBus {
            value: 0x0640u16.to_be_bytes(),
            ..Default::default()
        };
        let mut source = Tmp117Source::<_, _, 5>::new(bus, Delay, Tmp117Settings::default());
        assert_eq!(source.read(), Ok(TenthsF(545)));
        assert_eq!(source.average(), Some(TenthsF(545)));
        let (bus, _) = source.release();
        assert!(!bus.powered);
        assert_eq!(bus.power_ups, 1);
    }

    #[test]
    fn tmp117_timeout_powers_down_and_skips_history() {
        let bus = FakeBus {
            value: 0x0640u16.to_be_bytes(),
            ready_after: u32::MAX,
            ..Default::default()
        };
        let mut source = Tmp117Source::<_, _, 5>::new(bus, Delay, Tmp117Settings::default());
        assert_eq!(source.read(), Err(SensorError::Timeout));
        assert_eq!(source.average(), None);
        assert!(!source.release().0.powered);
    }

    #[test]
    fn tmp117_reset_value_is_a_failure() {
        let bus = FakeBus {
            value: 0x8000u16.to_be_bytes(),
            ..Default::default()
        };
        let mut source = Tmp117Source::<_, _, 5>::new(bus, Delay, Tmp117Settings::default());
        assert_eq!(source.read(), Err(SensorError::InvalidReading));
        assert!(!source.release().0.powered);
    }

    #[test]
    fn si7051_hold_reading() {
        let bus = FakeBus {
            value: 26796u16.to_be_bytes(),
            ..Default::default()
        };
        let mut source = Si7051Source::<_, _, 5>::new(bus, Delay, Si7051Settings::default());
        assert_eq!(source.read(), Ok(TenthsF(769)));
        let (bus, _) = source.release();
        assert!(!bus.powered);
        assert_eq!(bus.log, vec![vec![0xE3]]);
    }

    #[test]
    fn si7051_bus_failure_powers_down() {
        let bus = FakeBus {
            fail_writes: true,
            ..Default::default()
        };
        let mut source = Si7051Source::<_, _, 5>::new(bus, Delay, Si7051Settings::default());
        assert_eq!(source.read(), Err(SensorError::Timeout));
        assert_eq!(source.average(), None);
        assert!(!source.release().0.powered);
    }

    #[test]
    fn si7051_resolution_written_after_power_up() {
        let bus = FakeBus {
            value: [0x3A, 0x3A],
            ..Default::default()
        };
        let settings = Si7051Settings {
            mode: MeasureMode::Hold,
            resolution: Some(si7051::Resolution::Bits12),
        };
        let mut source = Si7051Source::<_, _, 5>::new(bus, Delay, settings);
        source.read().unwrap();
        let (bus, _) = source.release();
        assert_eq!(bus.log[..3], [vec![0xE7], vec![0xE6, 0x3B], vec![0xE3]]);
    }
}
