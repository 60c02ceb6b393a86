use beacon_core::{Blink, StatusLeds, SystemControl, UpdateTimer};
use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive, Pin};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{block_for, Duration};

/// New interval for the update task, `None` to pause it.
pub static UPDATE_TIMER: Signal<CriticalSectionRawMutex, Option<u32>> = Signal::new();

pub struct Leds {
    red: Output<'static, AnyPin>,
    green: Output<'static, AnyPin>,
    on: Level,
}

impl Leds {
    pub fn new(red: impl Pin, green: impl Pin, on: Level) -> Self {
        let off = match on {
            Level::High => Level::Low,
            Level::Low => Level::High,
        };
        Self {
            red: Output::new(red.degrade(), off, OutputDrive::Standard),
            green: Output::new(green.degrade(), off, OutputDrive::Standard),
            on,
        }
    }

    fn blink(led: &mut Output<'static, AnyPin>, on: Level, times: u8, on_ms: u64, off_ms: u64) {
        for _ in 0..times {
            led.set_level(on);
            block_for(Duration::from_millis(on_ms));
            led.toggle();
            block_for(Duration::from_millis(off_ms));
        }
    }
}

impl StatusLeds for Leds {
    fn alive(&mut self) {
        Self::blink(&mut self.green, self.on, 2, 50, 50);
        block_for(Duration::from_millis(200));
        Self::blink(&mut self.red, self.on, 2, 50, 50);
        block_for(Duration::from_millis(200));
    }

    fn ok(&mut self) {
        Self::blink(&mut self.green, self.on, 1, 5, 5);
    }

    fn caution(&mut self) {
        Self::blink(&mut self.red, self.on, 1, 5, 5);
    }

    fn show(&mut self, blink: Blink) {
        match blink {
            Blink::Count(n) => Self::blink(&mut self.red, self.on, n, 500, 500),
            Blink::Zero => Self::blink(&mut self.green, self.on, 1, 50, 50),
        }
    }
}

pub struct System;

impl SystemControl for System {
    fn delay_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(ms.into()));
    }

    fn reset(&mut self) {
        defmt::error!("resetting");
        cortex_m::peripheral::SCB::sys_reset();
    }
}

/// Hands interval changes to the update task.
pub struct UpdateSignal;

impl UpdateTimer for UpdateSignal {
    fn start(&mut self, interval_ms: u32) {
        UPDATE_TIMER.signal(Some(interval_ms));
    }

    fn stop(&mut self) {
        UPDATE_TIMER.signal(None);
    }
}
