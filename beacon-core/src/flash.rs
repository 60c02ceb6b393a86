//! The device name, kept in the first 32 bytes of the last page before the
//! bootloader.
//!
//! The RAM copy is what everyone reads. Writing it back is erase, wait for
//! the stack to report the erase done, write, wait again. The stack may
//! refuse either request while the radio is busy; the name then stays dirty
//! and the next [`FlashStore::read_name`] tries again.

use core::fmt::Write;

use heapless::String;

/// Bytes of the page in use.
pub const SLOT_LEN: usize = 32;
/// Longest name, leaving room for the terminator.
pub const NAME_CAPACITY: usize = SLOT_LEN - 1;
pub const PAGE_SIZE: u32 = 4096;

pub type DeviceName = String<NAME_CAPACITY>;

/// Words per slot.
pub const SLOT_WORDS: usize = SLOT_LEN / 4;

/// What the radio stack lets us do with flash. Erase and write only queue
/// the operation; completion comes back through
/// [`FlashStore::on_flash_event`].
pub trait FlashController {
    type Error;

    /// Flash is memory mapped, this can't fail.
    fn read(&self, address: u32, buf: &mut [u8; SLOT_LEN]);

    fn request_erase(&mut self, page_address: u32) -> Result<(), Self::Error>;

    fn request_write(&mut self, address: u32, words: &[u32; SLOT_WORDS]) -> Result<(), Self::Error>;
}

impl<T: FlashController> FlashController for &mut T {
    type Error = T::Error;

    fn read(&self, address: u32, buf: &mut [u8; SLOT_LEN]) {
        T::read(self, address, buf)
    }

    fn request_erase(&mut self, page_address: u32) -> Result<(), Self::Error> {
        T::request_erase(self, page_address)
    }

    fn request_write(&mut self, address: u32, words: &[u32; SLOT_WORDS]) -> Result<(), Self::Error> {
        T::request_write(self, address, words)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashEvent {
    Success,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashState {
    Idle,
    Erasing,
    Writing,
}

/// Holds a string: a 0 somewhere in the slot.
pub fn slot_valid(slot: &[u8; SLOT_LEN]) -> bool {
    slot.contains(&0)
}

pub fn slot_erased(slot: &[u8; SLOT_LEN]) -> bool {
    slot.iter().all(|&b| b == 0xFF)
}

/// The name up to the terminator, zero padded to whole words.
pub fn stage(name: &str) -> [u32; SLOT_WORDS] {
    let mut bytes = [0u8; SLOT_LEN];
    let len = name.len().min(NAME_CAPACITY);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    bytemuck::cast(bytes)
}

/// Longest prefix of `name` that fits and doesn't split a character.
fn truncate(name: &str) -> &str {
    let mut end = name.len().min(NAME_CAPACITY);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

pub struct FlashStore<F> {
    flash: F,
    address: u32,
    name: DeviceName,
    staged: [u32; SLOT_WORDS],
    state: FlashState,
    dirty: bool,
}

impl<F: FlashController> FlashStore<F> {
    /// `address` is the slot, at the start of a page.
    pub fn new(flash: F, address: u32) -> Self {
        Self {
            flash,
            address,
            name: String::new(),
            staged: [0; SLOT_WORDS],
            state: FlashState::Idle,
            dirty: false,
        }
    }

    /// Load the stored name, or `default` if the slot doesn't hold one.
    pub fn init(&mut self, default: &str) {
        let slot = self.slot();
        let stored = if slot_valid(&slot) {
            slot.iter()
                .position(|&b| b == 0)
                .and_then(|end| core::str::from_utf8(&slot[..end]).ok())
                .filter(|name| !name.is_empty())
        } else {
            None
        };
        self.name.clear();
        match stored {
            Some(name) => {
                let _ = self.name.push_str(name);
                info!("stored name: {}", self.name.as_str());
            }
            None => {
                let _ = self.name.push_str(truncate(default));
                info!("no stored name, using {}", self.name.as_str());
            }
        }
        self.dirty = false;
    }

    /// Replace the RAM copy. Flash is only touched on the next
    /// [`FlashStore::read_name`].
    pub fn update_name(&mut self, name: &str) {
        let name = truncate(name);
        if self.name == name {
            return;
        }
        debug!("update name: {}", name);
        self.name.clear();
        let _ = self.name.push_str(name);
        self.dirty = true;
    }

    /// The RAM copy, after trying to persist it if it changed.
    pub fn read_name(&mut self) -> &str {
        if self.dirty && !self.is_busy() {
            self.save_name();
        }
        &self.name
    }

    /// Start persisting the RAM copy: erase first unless the slot already is.
    pub fn save_name(&mut self) {
        if self.is_busy() {
            return;
        }
        if !slot_erased(&self.slot()) {
            self.dump();
            match self.flash.request_erase(self.page_address()) {
                Ok(()) => {
                    debug!("erasing page {:#x}", self.page_address());
                    self.state = FlashState::Erasing;
                }
                Err(_) => warn!("page erase rejected"),
            }
            return;
        }
        self.write();
    }

    fn write(&mut self) {
        self.staged = stage(&self.name);
        match self.flash.request_write(self.address, &self.staged) {
            Ok(()) => {
                debug!("writing name to {:#x}", self.address);
                self.state = FlashState::Writing;
            }
            Err(_) => warn!("flash write rejected"),
        }
    }

    /// Completion of the outstanding erase or write.
    pub fn on_flash_event(&mut self, event: FlashEvent) {
        match (self.state, event) {
            (FlashState::Idle, _) => {
                trace!("flash event {:?} with nothing outstanding", event);
            }
            (FlashState::Erasing, FlashEvent::Success) => {
                self.state = FlashState::Idle;
                if self.dirty {
                    self.write();
                }
            }
            (FlashState::Writing, FlashEvent::Success) => {
                self.state = FlashState::Idle;
                // The name may have changed again while writing.
                self.dirty = self.staged != stage(&self.name);
                self.dump();
            }
            (state, FlashEvent::Error) => {
                warn!("flash operation failed while {:?}", state);
                self.state = FlashState::Idle;
            }
        }
    }

    /// Hex and printable ASCII of the slot, 16 bytes a row.
    pub fn dump(&self) {
        let slot = self.slot();
        for row in slot.chunks(16) {
            let mut line = String::<52>::new();
            for b in row {
                let _ = write!(line, "{:02X}", b);
            }
            let _ = line.push(' ');
            for &b in row {
                let c = if b > b' ' && b < 0x7F { b as char } else { '.' };
                let _ = line.push(c);
            }
            debug!("{}", line.as_str());
        }
    }

    fn slot(&self) -> [u8; SLOT_LEN] {
        let mut slot = [0xFF; SLOT_LEN];
        self.flash.read(self.address, &mut slot);
        slot
    }

    fn page_address(&self) -> u32 {
        self.address & !(PAGE_SIZE - 1)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != FlashState::Idle
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }
}

/// Button driven A to Z selection, stored as a one letter name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LetterSelector {
    letter: u8,
}

impl LetterSelector {
    /// Starts from the stored letter if there is one.
    pub fn new(current: &str) -> Self {
        let letter = match current.as_bytes() {
            [c] if c.is_ascii_uppercase() => *c,
            _ => b'A',
        };
        Self { letter }
    }

    pub fn letter(&self) -> char {
        self.letter as char
    }

    /// Step to the next letter, wrapping after Z.
    pub fn advance(&mut self) -> char {
        self.letter = if self.letter >= b'Z' { b'A' } else { self.letter + 1 };
        self.letter()
    }

    pub fn apply<F: FlashController>(&self, store: &mut FlashStore<F>) {
        let mut buf = [0; 4];
        store.update_name(self.letter().encode_utf8(&mut buf));
    }
}
