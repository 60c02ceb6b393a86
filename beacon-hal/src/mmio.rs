//! Register access over byte offsets from a peripheral base address.

/// A block of 32-bit registers.
///
/// Offsets are in bytes, exactly as the reference manual lists them. Tasks
/// are triggered by writing `1`, events are cleared by writing `0`.
pub trait Mmio {
    fn read(&self, offset: usize) -> u32;

    fn write(&mut self, offset: usize, value: u32);

    fn modify(&mut self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    /// Load an EasyDMA pointer register.
    ///
    /// The peripheral only sees 32 bits; simulated blocks override this to
    /// keep the whole pointer.
    fn write_ptr(&mut self, offset: usize, ptr: *const u8) {
        self.write(offset, ptr as usize as u32);
    }

    fn trigger(&mut self, task: usize) {
        self.write(task, 1);
    }

    fn event(&self, event: usize) -> bool {
        self.read(event) != 0
    }

    fn clear(&mut self, event: usize) {
        self.write(event, 0);
    }
}

impl<T: Mmio> Mmio for &mut T {
    fn read(&self, offset: usize) -> u32 {
        T::read(self, offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        T::write(self, offset, value)
    }

    fn write_ptr(&mut self, offset: usize, ptr: *const u8) {
        T::write_ptr(self, offset, ptr)
    }
}

/// Real memory-mapped registers.
pub struct VolatileBlock {
    base: usize,
}

impl VolatileBlock {
    /// # Safety
    ///
    /// `base` must be the address of a peripheral register block and nothing
    /// else may drive that peripheral while this value exists.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl Mmio for VolatileBlock {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new` requires `base` to be a register block.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: `new` requires `base` to be a register block.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
