use embedded_hal::i2c::I2c;

use crate::types::Register;
use crate::Interface;

/// TMP117 low level I2C driver. Registers are 16 bits, MSB first, selected by
/// a pointer byte.
pub struct Tmp117I2c<I> {
    i2c: I,
    address: u8,
}

impl<I> Tmp117I2c<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn i2c_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Interface for Tmp117I2c<I> {
    type Error = I::Error;

    fn write_register(&mut self, register: Register, value: u16) -> Result<(), I::Error> {
        trace!("Tmp117I2c::write({:?}, {:#x})", register, value);
        let [msb, lsb] = value.to_be_bytes();
        self.i2c.write(self.address, &[register as u8, msb, lsb])
    }

    fn read_register(&mut self, register: Register) -> Result<u16, I::Error> {
        let mut data = [0; 2];
        self.i2c
            .write_read(self.address, &[register as u8], &mut data)?;
        let value = u16::from_be_bytes(data);
        trace!("Tmp117I2c::read({:?}) = {:#x}", register, value);
        Ok(value)
    }
}
