//! Blocking single-shot driver for the ADS1015 12-bit ADC.

use embedded_hal::i2c::I2c;
use rainpots_core::{AdcError, AnalogSource};

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// Start a single conversion / conversion finished.
const CONFIG_OS: u16 = 0x8000;
/// Single-ended input mux base (AIN0 vs GND).
const CONFIG_MUX_SINGLE: u16 = 0x4000;
/// PGA gain 2/3 (+/-6.144 V).
const CONFIG_PGA_TWO_THIRDS: u16 = 0x0000;
/// Single-shot mode.
const CONFIG_MODE_SINGLE: u16 = 0x0100;
/// 3300 samples per second.
const CONFIG_DR_3300: u16 = 0x00C0;
/// Comparator disabled, ALERT/RDY high impedance.
const CONFIG_COMP_DISABLE: u16 = 0x0003;

const CHANNELS: u8 = 4;

/// Status polls before a conversion is considered lost.
const MAX_POLLS: u32 = 100;

/// ADS1015 on a blocking I2C bus.
pub struct Ads1015<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Ads1015<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<(), AdcError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[register, hi, lo])
            .map_err(|_| AdcError::Bus)
    }

    fn read_register(&mut self, register: u8) -> Result<u16, AdcError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| AdcError::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<I: I2c> AnalogSource for Ads1015<I> {
    fn read_single_ended(&mut self, channel: u8) -> Result<i16, AdcError> {
        if channel >= CHANNELS {
            return Err(AdcError::InvalidChannel);
        }

        let config = CONFIG_OS
            | CONFIG_MUX_SINGLE
            | (u16::from(channel) << 12)
            | CONFIG_PGA_TWO_THIRDS
            | CONFIG_MODE_SINGLE
            | CONFIG_DR_3300
            | CONFIG_COMP_DISABLE;
        self.write_register(REG_CONFIG, config)?;

        let mut polls = 0;
        while self.read_register(REG_CONFIG)? & CONFIG_OS == 0 {
            polls += 1;
            if polls >= MAX_POLLS {
                return Err(AdcError::Bus);
            }
        }

        // 12-bit result, left aligned.
        let raw = self.read_register(REG_CONVERSION)? as i16;
        Ok(raw >> 4)
    }
}
