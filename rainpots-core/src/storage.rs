//! Persistent configuration storage.
//!
//! [`Storage`] is the raw byte-addressed medium (an I2C EEPROM on hardware,
//! [`RamStorage`] in tests). [`CalibrationStore`] layers the controller
//! memory map on top of it:
//!
//! | Address | Width | Field                         |
//! |---------|-------|-------------------------------|
//! | 0x00    | 1     | init sentinel (`0x8B`)        |
//! | 0x01    | 1     | increment steps               |
//! | 0x02    | 4     | controller status mask (BE)   |
//! | 0x06    | 1     | increment display zero        |
//! | 0x07    | 1     | radio group display zero      |
//! | 0x20 + 0x10 * index | 16 | controller record      |
//!
//! Within a controller record: mode at 0, value at 1, min at 3, max at 7 and
//! center at 0x0B, all integers big-endian.

use crate::types::{
    ControllerConfig, ControllerMode, ControllerStatus, GlobalSettings, BUTTON_COUNT,
    CONTROLLER_COUNT,
};

/// Error type for storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Bus transaction failed (NACK, arbitration loss, timeout).
    Bus,
    /// Address range past the end of the device.
    OutOfRange,
}

/// Blocking byte-addressed persistent storage.
///
/// Every access may take a few milliseconds (EEPROM write cycle); callers
/// must not assume otherwise.
pub trait Storage {
    /// Device size in bytes.
    fn capacity(&self) -> usize;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `address`.
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError>;

    /// Read a single byte.
    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        let mut buf = [0u8; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }

    /// Write a single byte.
    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StorageError> {
        self.write(address, &[value])
    }

    /// Read a big-endian `u32`.
    fn read_u32(&mut self, address: u16) -> Result<u32, StorageError> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Write a big-endian `u32`.
    fn write_u32(&mut self, address: u16, value: u32) -> Result<(), StorageError> {
        self.write(address, &value.to_be_bytes())
    }

    /// Fill the whole device with `0x00`.
    fn erase(&mut self) -> Result<(), StorageError> {
        let zeros = [0u8; 32];
        let mut address = 0usize;
        while address < self.capacity() {
            let len = zeros.len().min(self.capacity() - address);
            self.write(address as u16, &zeros[..len])?;
            address += len;
        }
        Ok(())
    }
}

impl<T: Storage + ?Sized> Storage for &mut T {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        (**self).write(address, data)
    }
}

/// In-memory [`Storage`], used for host tests and as a stand-in when no
/// EEPROM is fitted.
pub struct RamStorage<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> RamStorage<N> {
    /// Blank storage, every byte `0xFF` like a fresh EEPROM.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: [0xFF; N] }
    }

    /// Raw contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(address: u16, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = address as usize;
        let end = start.checked_add(len).ok_or(StorageError::OutOfRange)?;
        if end > N {
            return Err(StorageError::OutOfRange);
        }
        Ok(start..end)
    }
}

impl<const N: usize> Default for RamStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Storage for RamStorage<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = Self::range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        let range = Self::range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

/// Memory map of the configuration EEPROM.
pub mod layout {
    pub const INITIALIZED: u16 = 0x00;
    pub const INC_STEPS: u16 = 0x01;
    pub const CONTROLLER_STATUS: u16 = 0x02;
    pub const INC_DISPLAY_ZERO: u16 = 0x06;
    pub const RADIO_GROUP_DISPLAY_ZERO: u16 = 0x07;

    pub const CONTROLLER_BASE: u16 = 0x20;
    pub const CONTROLLER_STRIDE: u16 = 0x10;
    pub const OFFSET_MODE: u16 = 0x00;
    pub const OFFSET_VALUE: u16 = 0x01;
    pub const OFFSET_MIN: u16 = 0x03;
    pub const OFFSET_MAX: u16 = 0x07;
    pub const OFFSET_CENTER: u16 = 0x0B;

    /// Sentinel stored at [`INITIALIZED`] once defaults have been written.
    pub const INITIALIZED_TOKEN: u8 = 0x8B;

    /// Start address of the record for controller `index`.
    #[inline]
    #[must_use]
    pub const fn controller_base(index: u8) -> u16 {
        CONTROLLER_BASE + index as u16 * CONTROLLER_STRIDE
    }
}

/// Typed access to controller configuration over a [`Storage`].
///
/// Getters return `Result` so the caller decides how to degrade; the
/// [`Controller`](crate::Controller) falls back to factory defaults.
pub struct CalibrationStore<S> {
    storage: S,
}

impl<S: Storage> CalibrationStore<S> {
    /// Wrap `storage`, formatting it first if the init sentinel is missing
    /// or `force_init` is set.
    pub fn open(storage: S, force_init: bool) -> Result<Self, StorageError> {
        let mut store = Self { storage };
        store.prepare(force_init)?;
        Ok(store)
    }

    /// Format the storage if the init sentinel is missing or `force_init`
    /// is set. Returns whether a format happened.
    pub fn prepare(&mut self, force_init: bool) -> Result<bool, StorageError> {
        if force_init || !self.is_initialized()? {
            self.initialize()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Wrap `storage` without touching it.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Check the init sentinel.
    pub fn is_initialized(&mut self) -> Result<bool, StorageError> {
        Ok(self.storage.read_byte(layout::INITIALIZED)? == layout::INITIALIZED_TOKEN)
    }

    /// Erase the device and write factory defaults.
    ///
    /// The sentinel is written last so an interrupted format is retried on
    /// the next boot.
    pub fn initialize(&mut self) -> Result<(), StorageError> {
        info!("formatting configuration storage");
        self.storage.erase()?;

        for index in 0..CONTROLLER_COUNT as u8 {
            self.write_controller_config(&ControllerConfig::factory_default(index))?;
        }

        let defaults = GlobalSettings::DEFAULT;
        self.write_increment_steps(defaults.increment_steps)?;
        self.write_controller_status(defaults.controller_status)?;
        self.write_increment_display_zero(defaults.increment_display_zero)?;
        self.write_radio_group_display_zero(defaults.radio_group_display_zero)?;
        self.storage
            .write_byte(layout::INITIALIZED, layout::INITIALIZED_TOKEN)
    }

    pub fn read_controller_mode(&mut self, index: u8) -> Result<u8, StorageError> {
        self.storage
            .read_byte(layout::controller_base(index) + layout::OFFSET_MODE)
    }

    pub fn write_controller_mode(
        &mut self,
        index: u8,
        mode: ControllerMode,
    ) -> Result<(), StorageError> {
        self.storage
            .write_byte(layout::controller_base(index) + layout::OFFSET_MODE, mode as u8)
    }

    pub fn read_controller_value(&mut self, index: u8) -> Result<u8, StorageError> {
        self.storage
            .read_byte(layout::controller_base(index) + layout::OFFSET_VALUE)
    }

    pub fn write_controller_value(&mut self, index: u8, value: u8) -> Result<(), StorageError> {
        self.storage
            .write_byte(layout::controller_base(index) + layout::OFFSET_VALUE, value)
    }

    pub fn read_controller_min(&mut self, index: u8) -> Result<u32, StorageError> {
        self.storage
            .read_u32(layout::controller_base(index) + layout::OFFSET_MIN)
    }

    pub fn write_controller_min(&mut self, index: u8, value: u32) -> Result<(), StorageError> {
        debug!("controller {} min <- {}", index, value);
        self.storage
            .write_u32(layout::controller_base(index) + layout::OFFSET_MIN, value)
    }

    pub fn read_controller_max(&mut self, index: u8) -> Result<u32, StorageError> {
        self.storage
            .read_u32(layout::controller_base(index) + layout::OFFSET_MAX)
    }

    pub fn write_controller_max(&mut self, index: u8, value: u32) -> Result<(), StorageError> {
        debug!("controller {} max <- {}", index, value);
        self.storage
            .write_u32(layout::controller_base(index) + layout::OFFSET_MAX, value)
    }

    pub fn read_controller_center(&mut self, index: u8) -> Result<u32, StorageError> {
        self.storage
            .read_u32(layout::controller_base(index) + layout::OFFSET_CENTER)
    }

    pub fn write_controller_center(&mut self, index: u8, value: u32) -> Result<(), StorageError> {
        debug!("controller {} center <- {}", index, value);
        self.storage
            .write_u32(layout::controller_base(index) + layout::OFFSET_CENTER, value)
    }

    /// Read a full controller record.
    ///
    /// An unknown stored mode decodes as the factory default for that index,
    /// and a button never decodes as [`ControllerMode::Knob`].
    pub fn read_controller_config(&mut self, index: u8) -> Result<ControllerConfig, StorageError> {
        let default = ControllerConfig::factory_default(index);
        let stored = self.read_controller_mode(index)?;
        let mut mode = ControllerMode::from_stored(stored).unwrap_or(default.mode);
        if (index as usize) < BUTTON_COUNT && !mode.is_button_mode() {
            warn!("button {} stored as knob, using toggle", index);
            mode = ControllerMode::Toggle;
        }
        Ok(ControllerConfig {
            index,
            mode,
            value: self.read_controller_value(index)?,
            min: self.read_controller_min(index)?,
            max: self.read_controller_max(index)?,
            center: self.read_controller_center(index)?,
        })
    }

    /// Write a full controller record.
    pub fn write_controller_config(&mut self, config: &ControllerConfig) -> Result<(), StorageError> {
        let base = layout::controller_base(config.index);
        let mut record = [0u8; layout::CONTROLLER_STRIDE as usize];
        record[layout::OFFSET_MODE as usize] = config.mode as u8;
        record[layout::OFFSET_VALUE as usize] = config.value;
        record[layout::OFFSET_MIN as usize..][..4].copy_from_slice(&config.min.to_be_bytes());
        record[layout::OFFSET_MAX as usize..][..4].copy_from_slice(&config.max.to_be_bytes());
        record[layout::OFFSET_CENTER as usize..][..4]
            .copy_from_slice(&config.center.to_be_bytes());
        self.storage.write(base, &record)
    }

    /// Stored increment step count, clamped to the supported range.
    pub fn read_increment_steps(&mut self) -> Result<u8, StorageError> {
        let steps = self.storage.read_byte(layout::INC_STEPS)?;
        Ok(GlobalSettings::clamp_increment_steps(steps))
    }

    pub fn write_increment_steps(&mut self, steps: u8) -> Result<(), StorageError> {
        self.storage.write_byte(layout::INC_STEPS, steps)
    }

    pub fn read_controller_status(&mut self) -> Result<ControllerStatus, StorageError> {
        Ok(ControllerStatus(
            self.storage.read_u32(layout::CONTROLLER_STATUS)?,
        ))
    }

    pub fn write_controller_status(&mut self, status: ControllerStatus) -> Result<(), StorageError> {
        self.storage
            .write_u32(layout::CONTROLLER_STATUS, status.raw())
    }

    pub fn read_increment_display_zero(&mut self) -> Result<bool, StorageError> {
        Ok(self.storage.read_byte(layout::INC_DISPLAY_ZERO)? != 0)
    }

    pub fn write_increment_display_zero(&mut self, display_zero: bool) -> Result<(), StorageError> {
        self.storage
            .write_byte(layout::INC_DISPLAY_ZERO, display_zero as u8)
    }

    pub fn read_radio_group_display_zero(&mut self) -> Result<bool, StorageError> {
        Ok(self.storage.read_byte(layout::RADIO_GROUP_DISPLAY_ZERO)? != 0)
    }

    pub fn write_radio_group_display_zero(
        &mut self,
        display_zero: bool,
    ) -> Result<(), StorageError> {
        self.storage
            .write_byte(layout::RADIO_GROUP_DISPLAY_ZERO, display_zero as u8)
    }

    /// Load all global settings, substituting the default for any field
    /// that cannot be read.
    pub fn load_settings(&mut self) -> GlobalSettings {
        let defaults = GlobalSettings::DEFAULT;
        GlobalSettings {
            increment_steps: self
                .read_increment_steps()
                .unwrap_or(defaults.increment_steps),
            controller_status: self
                .read_controller_status()
                .unwrap_or(defaults.controller_status),
            increment_display_zero: self
                .read_increment_display_zero()
                .unwrap_or(defaults.increment_display_zero),
            radio_group_display_zero: self
                .read_radio_group_display_zero()
                .unwrap_or(defaults.radio_group_display_zero),
        }
    }

    /// Borrow the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Release the underlying storage.
    pub fn into_inner(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ram = RamStorage<4096>;

    #[test]
    fn test_open_formats_blank_storage() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        assert!(store.is_initialized().unwrap());
        assert_eq!(store.storage().as_bytes()[0], 0x8B);
        assert_eq!(store.load_settings(), GlobalSettings::DEFAULT);

        let inc = store.read_controller_config(1).unwrap();
        assert_eq!(inc.mode, ControllerMode::Increment);
        let knob = store.read_controller_config(13).unwrap();
        assert_eq!(knob.mode, ControllerMode::Knob);
        assert_eq!((knob.min, knob.max, knob.center), (5, 990, 0));
    }

    #[test]
    fn test_open_keeps_initialized_storage() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        store.write_controller_min(7, 42).unwrap();

        let mut reopened = CalibrationStore::open(store.into_inner(), false).unwrap();
        assert_eq!(reopened.read_controller_min(7).unwrap(), 42);
    }

    #[test]
    fn test_force_init_restores_defaults() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        store.write_increment_steps(2).unwrap();

        let mut reopened = CalibrationStore::open(store.into_inner(), true).unwrap();
        assert_eq!(reopened.read_increment_steps().unwrap(), 5);
    }

    #[test]
    fn test_prepare_reports_format() {
        let mut store = CalibrationStore::new(Ram::new());
        assert!(!store.is_initialized().unwrap());
        assert!(store.prepare(false).unwrap());
        assert!(!store.prepare(false).unwrap());
        assert!(store.prepare(true).unwrap());
    }

    #[test]
    fn test_record_layout() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        store.write_controller_max(6, 0x0102_0304).unwrap();
        store.write_controller_center(6, 300).unwrap();
        store
            .write_controller_mode(3, ControllerMode::RadioGroup)
            .unwrap();

        let bytes = store.storage().as_bytes();
        // controller 6 record starts at 0x20 + 6 * 0x10 = 0x80
        assert_eq!(&bytes[0x87..0x8B], &[1, 2, 3, 4]);
        assert_eq!(&bytes[0x8B..0x8F], &[0, 0, 0x01, 0x2C]);
        assert_eq!(bytes[0x50], 4);
    }

    #[test]
    fn test_status_is_big_endian() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        store
            .write_controller_status(ControllerStatus(0x0000_2A81))
            .unwrap();
        assert_eq!(&store.storage().as_bytes()[2..6], &[0, 0, 0x2A, 0x81]);
        assert_eq!(
            store.read_controller_status().unwrap(),
            ControllerStatus(0x2A81)
        );
    }

    #[test]
    fn test_corrupt_button_mode_falls_back() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        store.write_controller_mode(0, ControllerMode::Knob).unwrap();
        assert_eq!(
            store.read_controller_config(0).unwrap().mode,
            ControllerMode::Toggle
        );
    }

    #[test]
    fn test_increment_steps_clamped_on_read() {
        let mut store = CalibrationStore::open(Ram::new(), false).unwrap();
        store.write_increment_steps(0x40).unwrap();
        assert_eq!(store.read_increment_steps().unwrap(), 5);
        store.write_increment_steps(0).unwrap();
        assert_eq!(store.read_increment_steps().unwrap(), 1);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut ram = RamStorage::<16>::new();
        assert_eq!(ram.write(14, &[0; 4]), Err(StorageError::OutOfRange));
        assert_eq!(ram.read_byte(16), Err(StorageError::OutOfRange));
        assert!(CalibrationStore::open(ram, false).is_err());
    }
}
