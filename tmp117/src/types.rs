use arbitrary_int::*;
use bitbybit::{bitenum, bitfield};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Temperature = 0x00,
    Configuration = 0x01,
    HighLimit = 0x02,
    LowLimit = 0x03,
    EepromUnlock = 0x04,
    Eeprom1 = 0x05,
    Eeprom2 = 0x06,
    TemperatureOffset = 0x07,
    Eeprom3 = 0x08,
    DeviceId = 0x0F,
}

/// ADD0 strap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Address {
    #[default]
    Gnd = 0x48,
    Vplus = 0x49,
    Sda = 0x4A,
    Scl = 0x4B,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionMode {
    Continuous = 0,
    Shutdown = 1,
    /// Reads back as continuous.
    Continuous2 = 2,
    OneShot = 3,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Averaging {
    None = 0,
    Avg8 = 1,
    Avg32 = 2,
    Avg64 = 3,
}

impl Averaging {
    /// How long one averaged conversion takes, each sample being 15.5 ms.
    pub const fn conversion_us(self) -> u32 {
        match self {
            Averaging::None => 15_500,
            Averaging::Avg8 => 125_000,
            Averaging::Avg32 => 500_000,
            Averaging::Avg64 => 1_000_000,
        }
    }
}

/// Configuration register. Reads clear `data_ready` and the alert flags.
#[bitfield(u16, default = 0x0220)]
#[derive(Debug, PartialEq, Eq)]
pub struct Config {
    #[bit(1, rw)]
    pub soft_reset: bool,
    /// ALERT pin reflects data ready instead of the alert flags.
    #[bit(2, rw)]
    pub dr_alert: bool,
    #[bit(3, rw)]
    pub polarity_high: bool,
    #[bit(4, rw)]
    pub therm_mode: bool,
    #[bits(5..=6, rw)]
    pub averaging: Averaging,
    /// Standby time between continuous conversions.
    #[bits(7..=9, rw)]
    pub cycle: u3,
    #[bits(10..=11, rw)]
    pub mode: ConversionMode,
    #[bit(12, r)]
    pub eeprom_busy: bool,
    #[bit(13, r)]
    pub data_ready: bool,
    #[bit(14, r)]
    pub low_alert: bool,
    #[bit(15, r)]
    pub high_alert: bool,
}

#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceId {
    #[bits(0..=11, r)]
    pub did: u12,
    #[bits(12..=15, r)]
    pub revision: u4,
}

impl DeviceId {
    pub const TMP117: u16 = 0x117;

    pub fn is_tmp117(&self) -> bool {
        self.did().value() == Self::TMP117
    }
}

/// Raw temperature, 1/128 °C per LSB.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature(pub i16);

impl Temperature {
    /// What the result register holds after reset, before any conversion.
    pub const RESET: Temperature = Temperature(i16::MIN);

    /// Tenths of a degree Fahrenheit: raw * 9/64 + 32.0 °F.
    pub const fn x10f(self) -> i16 {
        (((self.0 as i32) * 9 >> 6) + 320) as i16
    }

    pub const fn x100f(self) -> i32 {
        (self.0 as i32 * 45 >> 5) + 3200
    }

    pub const fn x1000f(self) -> i32 {
        (self.0 as i32 * 225 >> 4) + 32_000
    }

    pub const fn x10c(self) -> i16 {
        (self.0 as i32 * 5 >> 6) as i16
    }

    pub const fn x100c(self) -> i32 {
        self.0 as i32 * 25 >> 5
    }

    pub const fn x1000c(self) -> i32 {
        self.0 as i32 * 125 >> 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reset_value() {
        let config = Config::DEFAULT;
        assert_eq!(config.averaging(), Averaging::Avg8);
        assert_eq!(config.cycle().value(), 4);
        assert_eq!(config.mode(), ConversionMode::Continuous);
    }

    #[test]
    fn one_shot_with_no_averaging() {
        let config = Config::DEFAULT
            .with_mode(ConversionMode::OneShot)
            .with_averaging(Averaging::None);
        assert_eq!(config.raw_value(), 0x0E00);
    }

    #[test]
    fn status_bits_decode() {
        let config = Config::new_with_raw_value(0x3220);
        assert!(config.data_ready());
        assert!(config.eeprom_busy());
        assert!(!config.high_alert());
    }

    #[test]
    fn fahrenheit_conversions() {
        // 12.5 °C
        let t = Temperature(1600);
        assert_eq!(t.x10f(), 545);
        assert_eq!(t.x100f(), 5450);
        assert_eq!(t.x1000f(), 54_500);
        // 0 °C
        assert_eq!(Temperature(0).x10f(), 320);
        // -40 °C == -40 °F
        assert_eq!(Temperature(-5120).x10f(), -400);
        assert_eq!(Temperature(-5120).x100f(), -4000);
    }

    #[test]
    fn celsius_conversions() {
        let t = Temperature(3200); // 25 °C
        assert_eq!(t.x10c(), 250);
        assert_eq!(t.x100c(), 2500);
        assert_eq!(t.x1000c(), 25_000);
    }

    #[test]
    fn device_id_check() {
        let id = DeviceId::new_with_raw_value(0x1117);
        assert!(id.is_tmp117());
        assert_eq!(id.revision().value(), 1);
        assert!(!DeviceId::new_with_raw_value(0x0116).is_tmp117());
    }
}
