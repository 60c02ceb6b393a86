//! Blink codes and the LED side of error reporting. There's no display and
//! usually no debugger attached, so this is all the user ever sees.

use crate::radio::StackError;

/// One digit of a blink code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Blink {
    /// `n` long blinks on the error LED, 1 to 15.
    Count(u8),
    /// One short blink on the other LED.
    Zero,
}

/// The nibbles of a code, most significant first, leading zeros skipped.
/// `0x0102` blinks 1, short, 2.
#[derive(Clone, Debug)]
pub struct BlinkCode {
    code: u16,
    /// Nibbles left, counted from the bottom.
    remaining: u8,
}

impl BlinkCode {
    pub fn new(code: u16) -> Self {
        let digits = (16 - code.leading_zeros() as u8).div_ceil(4);
        Self {
            code,
            remaining: digits,
        }
    }
}

impl Iterator for BlinkCode {
    type Item = Blink;

    fn next(&mut self) -> Option<Blink> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(match (self.code >> (4 * self.remaining)) & 0xF {
            0 => Blink::Zero,
            n => Blink::Count(n as u8),
        })
    }
}

/// The board's LEDs. Each call blocks until the pattern is shown.
pub trait StatusLeds {
    /// Boot pattern.
    fn alive(&mut self);

    fn ok(&mut self);

    fn caution(&mut self);

    fn show(&mut self, blink: Blink);
}

impl<T: StatusLeds> StatusLeds for &mut T {
    fn alive(&mut self) {
        T::alive(self)
    }

    fn ok(&mut self) {
        T::ok(self)
    }

    fn caution(&mut self) {
        T::caution(self)
    }

    fn show(&mut self, blink: Blink) {
        T::show(self, blink)
    }
}

pub trait SystemControl {
    fn delay_ms(&mut self, ms: u32);

    /// Does not return on hardware.
    fn reset(&mut self);
}

impl<T: SystemControl> SystemControl for &mut T {
    fn delay_ms(&mut self, ms: u32) {
        T::delay_ms(self, ms)
    }

    fn reset(&mut self) {
        T::reset(self)
    }
}

/// Times a code is shown before resetting.
pub const REPEATS: u32 = 3;
pub const DIGIT_GAP_MS: u32 = 500;
pub const REPEAT_GAP_MS: u32 = 3000;

pub struct StatusReporter<L, S> {
    leds: L,
    system: S,
}

impl<L: StatusLeds, S: SystemControl> StatusReporter<L, S> {
    pub fn new(leds: L, system: S) -> Self {
        Self { leds, system }
    }

    /// Blink the code of a failed stack call and reset, unless `reboot` is
    /// false.
    pub fn check(&mut self, result: Result<(), StackError>, reboot: bool) {
        let Err(e) = result else {
            return;
        };
        error!("stack error {}", e.0);
        self.blink_code(e.code());
        if reboot {
            self.system.reset();
        }
    }

    pub fn blink_code(&mut self, code: u16) {
        for _ in 0..REPEATS {
            for blink in BlinkCode::new(code) {
                self.leds.show(blink);
                self.system.delay_ms(DIGIT_GAP_MS);
            }
            self.system.delay_ms(REPEAT_GAP_MS);
        }
    }

    pub fn alive(&mut self) {
        self.leds.alive();
    }

    pub fn ok(&mut self) {
        self.leds.ok();
    }

    pub fn caution(&mut self) {
        self.leds.caution();
    }

    pub fn leds(&self) -> &L {
        &self.leds
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn release(self) -> (L, S) {
        (self.leds, self.system)
    }
}
