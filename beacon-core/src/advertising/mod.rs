//! Legacy advertising payloads: at most 31 bytes of `{length, type, data}`
//! structures, a zero length byte ending the list early.

pub mod letter_history;
pub mod name_service;

pub use letter_history::LetterHistoryEncoder;
pub use name_service::NameServiceEncoder;

use crate::temperature::TenthsF;

pub const PAYLOAD_LEN: usize = 31;

pub type Payload = [u8; PAYLOAD_LEN];

pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const COMPLETE_LIST_128_BIT_UUIDS: u8 = 0x07;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const SERVICE_DATA_16_BIT_UUID: u8 = 0x16;
}

/// LE General Discoverable is off, only BR/EDR Not Supported.
pub const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;
pub const BATTERY_SERVICE_UUID: u16 = 0x180F;

/// Everything an encoder may show for one update cycle.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    /// [`TenthsF::FAILED`] when this cycle's read failed.
    pub reading: TenthsF,
    pub millivolts: u16,
    /// Readings taken, wrapping at 10000.
    pub counter: u16,
    pub beacon_id: u16,
    /// Averages, newest first.
    pub trend: &'a [i16],
    pub name: &'a str,
}

pub trait AdvertisementEncoder {
    /// Fill `buf` and return the number of bytes used, never more than 31.
    fn encode(&mut self, snapshot: &Snapshot<'_>, buf: &mut Payload) -> usize;
}

impl<T: AdvertisementEncoder + ?Sized> AdvertisementEncoder for &mut T {
    fn encode(&mut self, snapshot: &Snapshot<'_>, buf: &mut Payload) -> usize {
        T::encode(self, snapshot, buf)
    }
}

/// Appends AD structures to a payload, refusing any that don't fit.
pub struct AdBuilder<'a> {
    buf: &'a mut Payload,
    len: usize,
}

impl<'a> AdBuilder<'a> {
    pub fn new(buf: &'a mut Payload) -> Self {
        buf.fill(0);
        Self { buf, len: 0 }
    }

    /// Data bytes still available to one more structure.
    pub fn remaining(&self) -> usize {
        PAYLOAD_LEN.saturating_sub(self.len + 2)
    }

    pub fn push(&mut self, ad_type: u8, data: &[u8]) -> bool {
        if data.len() > self.remaining() {
            warn!("AD type {:#x} with {} bytes doesn't fit", ad_type, data.len());
            return false;
        }
        self.buf[self.len] = data.len() as u8 + 1;
        self.buf[self.len + 1] = ad_type;
        self.buf[self.len + 2..self.len + 2 + data.len()].copy_from_slice(data);
        self.len += data.len() + 2;
        true
    }

    pub fn flags(&mut self, flags: u8) -> bool {
        self.push(ad_type::FLAGS, &[flags])
    }

    /// Cut to `max` bytes and to what's left of the payload, never inside a
    /// UTF-8 sequence.
    pub fn complete_name(&mut self, name: &str, max: usize) -> bool {
        let mut len = name.len().min(max).min(self.remaining());
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        self.push(ad_type::COMPLETE_LOCAL_NAME, &name.as_bytes()[..len])
    }

    pub fn service_data_16(&mut self, uuid: u16, data: &[u8]) -> bool {
        let mut field = [0; PAYLOAD_LEN];
        if data.len() + 2 > field.len() {
            return false;
        }
        field[..2].copy_from_slice(&uuid.to_le_bytes());
        field[2..2 + data.len()].copy_from_slice(data);
        self.push(ad_type::SERVICE_DATA_16_BIT_UUID, &field[..2 + data.len()])
    }

    pub fn uuid_128(&mut self, uuid: u128) -> bool {
        self.push(ad_type::COMPLETE_LIST_128_BIT_UUIDS, &uuid.to_le_bytes())
    }

    /// Terminates the list when there's room and returns the length used.
    pub fn finish(self) -> usize {
        if self.len < PAYLOAD_LEN {
            self.buf[self.len] = 0;
        }
        self.len
    }
}

/// One AD structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Walks the structures of a payload up to the terminator. A length running
/// past the end stops the walk.
pub struct AdIter<'a> {
    rest: &'a [u8],
}

impl<'a> AdIter<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { rest: payload }
    }
}

impl<'a> Iterator for AdIter<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, tail) = self.rest.split_first()?;
        let len = len as usize;
        if len == 0 || len > tail.len() {
            self.rest = &[];
            return None;
        }
        let (structure, rest) = tail.split_at(len);
        self.rest = rest;
        Some(AdStructure {
            ad_type: structure[0],
            data: &structure[1..],
        })
    }
}

/// Logs every structure of a payload, names as text.
pub fn dump(payload: &[u8]) {
    debug!("advertising packet");
    for ad in AdIter::new(payload) {
        if ad.ad_type == ad_type::COMPLETE_LOCAL_NAME {
            let name = core::str::from_utf8(ad.data).unwrap_or("?");
            debug!("  len {} type {:#x} {}", ad.data.len() + 1, ad.ad_type, name);
        } else {
            debug!("  len {} type {:#x} {:?}", ad.data.len() + 1, ad.ad_type, ad.data);
        }
    }
}
