/// The last `N` readings.
///
/// The first insert fills every slot, so the average is defined from the
/// first reading on and doesn't ramp up from zero.
#[derive(Clone, Debug)]
pub struct HistoryBuffer<const N: usize> {
    slots: [i16; N],
    cursor: usize,
    seeded: bool,
}

impl<const N: usize> HistoryBuffer<N> {
    pub const fn new() -> Self {
        assert!(N > 0);
        Self {
            slots: [0; N],
            cursor: 0,
            seeded: false,
        }
    }

    pub fn insert(&mut self, value: i16) {
        if !self.seeded {
            self.slots = [value; N];
            self.seeded = true;
        }
        self.slots[self.cursor] = value;
        self.cursor = (self.cursor + 1) % N;
    }

    /// Truncating mean of the slots, `None` before the first insert.
    pub fn average(&self) -> Option<i16> {
        if !self.seeded {
            return None;
        }
        let sum: i32 = self.slots.iter().map(|&v| i32::from(v)).sum();
        Some((sum / N as i32) as i16)
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for HistoryBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages sampled every so often, newest first. Once full the oldest
/// falls off.
#[derive(Clone, Debug)]
pub struct TrendLog<const N: usize> {
    entries: [i16; N],
    len: usize,
}

impl<const N: usize> TrendLog<N> {
    pub const fn new() -> Self {
        Self {
            entries: [0; N],
            len: 0,
        }
    }

    pub fn push(&mut self, average: i16) {
        if N == 0 {
            return;
        }
        self.entries.copy_within(..N - 1, 1);
        self.entries[0] = average;
        self.len = (self.len + 1).min(N);
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.entries[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for TrendLog<N> {
    fn default() -> Self {
        Self::new()
    }
}
