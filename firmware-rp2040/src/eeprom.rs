//! 24LC32 (32 Kbit) I2C EEPROM.
//!
//! - 16-bit word address, big-endian.
//! - Page writes never cross a 32-byte page boundary.
//! - After each page the device is polled until it acknowledges again.

use embassy_time::{block_for, Duration};
use embedded_hal::i2c::I2c;
use heapless::Vec;
use rainpots_core::{Storage, StorageError};

pub const EEPROM_CAPACITY: usize = 4096;
pub const EEPROM_PAGE_SIZE: usize = 32;

/// Write cycle polls (1 ms apart); the datasheet maximum is 5 ms.
const WRITE_POLLS: u32 = 10;

pub struct Eeprom24lc32<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Eeprom24lc32<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    fn check_range(address: u16, len: usize) -> Result<(), StorageError> {
        if usize::from(address) + len > EEPROM_CAPACITY {
            Err(StorageError::OutOfRange)
        } else {
            Ok(())
        }
    }

    fn write_page(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        let mut buf: Vec<u8, { 2 + EEPROM_PAGE_SIZE }> = Vec::new();
        buf.extend_from_slice(&address.to_be_bytes())
            .map_err(|_| StorageError::OutOfRange)?;
        buf.extend_from_slice(data)
            .map_err(|_| StorageError::OutOfRange)?;
        self.i2c
            .write(self.address, &buf)
            .map_err(|_| StorageError::Bus)?;
        self.wait_ready(address)
    }

    /// The device NACKs its address while the internal write cycle runs.
    fn wait_ready(&mut self, probe: u16) -> Result<(), StorageError> {
        let mut dummy = [0u8; 1];
        for _ in 0..WRITE_POLLS {
            block_for(Duration::from_millis(1));
            if self
                .i2c
                .write_read(self.address, &probe.to_be_bytes(), &mut dummy)
                .is_ok()
            {
                return Ok(());
            }
        }
        Err(StorageError::Bus)
    }
}

impl<I: I2c> Storage for Eeprom24lc32<I> {
    fn capacity(&self) -> usize {
        EEPROM_CAPACITY
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        Self::check_range(address, buf.len())?;
        self.i2c
            .write_read(self.address, &address.to_be_bytes(), buf)
            .map_err(|_| StorageError::Bus)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        Self::check_range(address, data.len())?;

        let mut address = address;
        let mut rest = data;
        while !rest.is_empty() {
            let page_room = EEPROM_PAGE_SIZE - usize::from(address) % EEPROM_PAGE_SIZE;
            let (chunk, tail) = rest.split_at(page_room.min(rest.len()));
            self.write_page(address, chunk)?;
            address += chunk.len() as u16;
            rest = tail;
        }
        Ok(())
    }
}
