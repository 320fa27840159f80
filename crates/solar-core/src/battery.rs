//! Battery level for the menu.

use embedded_hal::i2c::I2c;

/// Default I2C address of the IP5306 power management chip
pub const IP5306_ADDR: u8 = 0x75;

// Undocumented status register; the top nibble holds the charge level
const REG_READ4: u8 = 0x78;
const BATTERY_75_BIT: u8 = 0b1000_0000;
const BATTERY_50_BIT: u8 = 0b0100_0000;
const BATTERY_25_BIT: u8 = 0b0010_0000;
const BATTERY_0_BIT: u8 = 0b0001_0000;

/// Anything that can report a charge level in percent.
pub trait BatteryGauge {
    type Error: core::fmt::Debug;

    fn level(&mut self) -> Result<u8, Self::Error>;
}

/// IP5306 fuel gauge on a blocking I2C bus.
pub struct Ip5306<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ip5306<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, IP5306_ADDR)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[register], &mut buf)?;
        Ok(buf[0])
    }
}

impl<I2C: I2c> BatteryGauge for Ip5306<I2C> {
    type Error = I2C::Error;

    fn level(&mut self) -> Result<u8, Self::Error> {
        self.read_byte(REG_READ4).map(level_from_register)
    }
}

/// Decode the charge level bits. The lowest set bit wins.
pub fn level_from_register(value: u8) -> u8 {
    if value & BATTERY_0_BIT != 0 {
        0
    } else if value & BATTERY_25_BIT != 0 {
        25
    } else if value & BATTERY_50_BIT != 0 {
        50
    } else if value & BATTERY_75_BIT != 0 {
        75
    } else {
        100
    }
}
