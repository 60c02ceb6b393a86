//! Bounded busy-wait loops.
//!
//! Nothing in the beacon blocks on an OS primitive; every wait is a loop with an
//! attempt limit so an interrupt storm can delay it but never hang it.

use embedded_hal::delay::DelayNs;

/// How long to keep polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Poll {
    pub max_attempts: u32,
    /// Delay between attempts. `0` spins without calling the delay.
    pub interval_us: u32,
}

impl Poll {
    pub const fn spin(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            interval_us: 0,
        }
    }

    pub const fn every_ms(max_attempts: u32, interval_ms: u32) -> Self {
        Self {
            max_attempts,
            interval_us: interval_ms * 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    pub attempts: u32,
}

/// Delay that only spins, for waits bounded purely by attempt count.
pub struct Spin;

impl DelayNs for Spin {
    fn delay_ns(&mut self, _ns: u32) {
        core::hint::spin_loop();
    }
}

/// Poll `ready` until it returns `true`. Returns the attempt that succeeded,
/// starting at 1.
pub fn poll_until<D: DelayNs>(
    delay: &mut D,
    poll: Poll,
    mut ready: impl FnMut() -> bool,
) -> Result<u32, Timeout> {
    poll_for(delay, poll, || ready().then_some(())).map(|((), attempt)| attempt)
}

/// Poll `attempt` until it produces a value.
pub fn poll_for<T, D: DelayNs>(
    delay: &mut D,
    poll: Poll,
    mut attempt: impl FnMut() -> Option<T>,
) -> Result<(T, u32), Timeout> {
    for n in 1..=poll.max_attempts {
        if let Some(value) = attempt() {
            return Ok((value, n));
        }
        if poll.interval_us > 0 && n < poll.max_attempts {
            delay.delay_us(poll.interval_us);
        }
    }
    Err(Timeout {
        attempts: poll.max_attempts,
    })
}
