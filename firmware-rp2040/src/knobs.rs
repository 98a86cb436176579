//! The two knob ADCs.
//!
//! Bank 0 shares I2C0 with the EEPROM, bank 1 has I2C1 to itself. The
//! controller wants one ADC type for both banks, so [`KnobAdc`] dispatches.

use core::cell::RefCell;

use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_rp::i2c::{Blocking, I2c};
use embassy_rp::peripherals::{I2C0, I2C1};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use rainpots_core::{AdcError, AnalogSource};

use crate::ads1015::Ads1015;

/// I2C0 bus shared by ADC bank 0 and the EEPROM (both on core 0).
pub type SharedI2c0Bus = Mutex<NoopRawMutex, RefCell<I2c<'static, I2C0, Blocking>>>;

/// One client of [`SharedI2c0Bus`].
pub type SharedI2c0 = I2cDevice<'static, NoopRawMutex, I2c<'static, I2C0, Blocking>>;

pub enum KnobAdc {
    Bank0(Ads1015<SharedI2c0>),
    Bank1(Ads1015<I2c<'static, I2C1, Blocking>>),
}

impl AnalogSource for KnobAdc {
    fn read_single_ended(&mut self, channel: u8) -> Result<i16, AdcError> {
        match self {
            Self::Bank0(adc) => adc.read_single_ended(channel),
            Self::Bank1(adc) => adc.read_single_ended(channel),
        }
    }
}
