use beacon_hal::saadc::{Oversample, Resolution};
use beacon_hal::AdcRead;

/// Above this the battery counts as healthy.
pub const HEALTHY_MV: u16 = 2100;
/// Shown when the reading can't be a battery.
pub const OVER_RANGE_MV: u16 = 9999;

const EMPTY_MV: u16 = 2000;
const FULL_MV: u16 = 3000;

/// Raw VDD sample at 10 bits, gain 1/6 against 0.6 V, so full scale is
/// 3600 mV. Readings below 500 mV show as 0, above 3600 mV as 9999.
pub const fn millivolts(raw: i16) -> u16 {
    let mv = raw as i32 * 3600 / 1024;
    if mv < 500 {
        0
    } else if mv > 3600 {
        OVER_RANGE_MV
    } else {
        mv as u16
    }
}

/// 2.00 V is empty and 3.00 V full, so 2.77 V reads 77 %.
pub const fn percent(millivolts: u16) -> u8 {
    let mv = if millivolts < EMPTY_MV {
        EMPTY_MV
    } else if millivolts > FULL_MV {
        FULL_MV
    } else {
        millivolts
    };
    ((mv - EMPTY_MV) / 10) as u8
}

pub const fn is_ok(millivolts: u16) -> bool {
    millivolts > HEALTHY_MV
}

/// Samples VDD every `every` updates and remembers the last good value in
/// between. Each sample is preceded by an offset calibration.
pub struct BatteryMonitor<A> {
    adc: A,
    millivolts: u16,
    every: u8,
    count: u8,
}

impl<A: AdcRead> BatteryMonitor<A> {
    pub fn new(adc: A, every: u8) -> Self {
        Self {
            adc,
            millivolts: 0,
            every: every.max(1),
            count: 0,
        }
    }

    /// Battery voltage in mV, sampling first when due. A failed sample
    /// keeps the previous value and is retried on the next update.
    pub fn update(&mut self) -> u16 {
        if self.count == 0 {
            match self.sample() {
                Ok(mv) => {
                    info!("battery {} mV", mv);
                    self.millivolts = mv;
                }
                Err(()) => {
                    warn!("battery sample failed, keeping {} mV", self.millivolts);
                    return self.millivolts;
                }
            }
        }
        self.count += 1;
        if self.count >= self.every {
            self.count = 0;
        }
        self.millivolts
    }

    fn sample(&mut self) -> Result<u16, ()> {
        self.adc.calibrate().map_err(|_| ())?;
        let raw = self
            .adc
            .read(Resolution::Bits10, Oversample::Over8x)
            .map_err(|_| ())?;
        Ok(millivolts(raw))
    }

    /// Last sampled value without touching the ADC.
    pub fn millivolts(&self) -> u16 {
        self.millivolts
    }

    pub fn is_ok(&self) -> bool {
        is_ok(self.millivolts)
    }

    pub fn release(self) -> A {
        self.adc
    }
}
