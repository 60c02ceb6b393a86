use arbitrary_int::*;
use bitbybit::bitfield;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Clock stretches until the conversion is done.
    MeasureHold = 0xE3,
    /// NACKs reads until the conversion is done.
    MeasureNoHold = 0xF3,
    Reset = 0xFE,
    WriteUser = 0xE6,
    ReadUser = 0xE7,
}

/// Two byte commands.
pub const READ_ID1: [u8; 2] = [0xFA, 0x0F];
pub const READ_ID2: [u8; 2] = [0xFC, 0xC9];
pub const READ_FIRMWARE_REVISION: [u8; 2] = [0x84, 0xB8];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    #[default]
    Bits14,
    Bits13,
    Bits12,
    Bits11,
}

impl Resolution {
    /// RES1 is bit 7, RES0 bit 0.
    pub const fn mask(self) -> u8 {
        match self {
            Resolution::Bits14 => 0x00,
            Resolution::Bits12 => 0x01,
            Resolution::Bits13 => 0x80,
            Resolution::Bits11 => 0x81,
        }
    }

    /// Worst case conversion time.
    pub const fn conversion_us(self) -> u32 {
        match self {
            Resolution::Bits14 => 10_800,
            Resolution::Bits13 => 6_200,
            Resolution::Bits12 => 3_800,
            Resolution::Bits11 => 2_400,
        }
    }
}

/// User register 1. Bits 1 to 5 are reserved and must be written back as
/// read.
#[bitfield(u8, default = 0x3A)]
#[derive(Debug, PartialEq, Eq)]
pub struct UserRegister {
    #[bit(0, rw)]
    pub res0: bool,
    #[bits(1..=5, r)]
    pub reserved: u5,
    /// VDD has dropped below 1.9 V.
    #[bit(6, r)]
    pub vdd_low: bool,
    #[bit(7, rw)]
    pub res1: bool,
}

impl UserRegister {
    pub const RESOLUTION_MASK: u8 = 0x81;

    pub fn resolution(&self) -> Resolution {
        match (self.res1(), self.res0()) {
            (false, false) => Resolution::Bits14,
            (false, true) => Resolution::Bits12,
            (true, false) => Resolution::Bits13,
            (true, true) => Resolution::Bits11,
        }
    }

    pub fn with_resolution(self, resolution: Resolution) -> Self {
        let raw = (self.raw_value() & !Self::RESOLUTION_MASK) | resolution.mask();
        Self::new_with_raw_value(raw)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareRevision {
    V1_0,
    V2_0,
    Unknown(u8),
}

impl From<u8> for FirmwareRevision {
    fn from(value: u8) -> Self {
        match value {
            0xFF => FirmwareRevision::V1_0,
            0x20 => FirmwareRevision::V2_0,
            other => FirmwareRevision::Unknown(other),
        }
    }
}

/// Raw temperature code, MSB first off the wire. The two low bits are status
/// and read as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Code(pub u16);

impl Code {
    /// °C × 100 = 175.72 × code / 65536 − 46.85
    pub const fn x100c(self) -> i16 {
        ((self.0 as i32 * 17572 >> 16) - 4685) as i16
    }

    pub const fn x10c(self) -> i16 {
        self.x100c() / 10
    }

    pub const fn x100f(self) -> i16 {
        (self.x100c() as i32 * 9 / 5 + 3200) as i16
    }

    pub const fn x10f(self) -> i16 {
        self.x100f() / 10
    }
}
