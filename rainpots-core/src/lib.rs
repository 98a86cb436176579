//! Platform-agnostic control logic for RainPots boards.
//!
//! A RainPots board reads six buttons and eight potentiometers and reports
//! them upstream as 4-byte control packets. This crate holds everything
//! between the raw samples and the outbound events, with no chip
//! dependencies so it can be tested on the host.
//!
//! # Overview
//!
//! - [`types`]: Data model ([`ControllerMode`], [`GlobalSettings`], [`ControlEvent`])
//! - [`storage`]: Persistent configuration ([`Storage`], [`CalibrationStore`])
//! - [`filter`]: Knob conditioning ([`AnalogChannel`], [`PotBank`])
//! - [`leds`]: LED output trait and feedback patterns ([`LedDriver`])
//! - [`timer`]: Button debouncing ([`ButtonDebouncer`]) and long-press tracking ([`LongPressTimer`])
//! - [`controller`]: The board state machine ([`Controller`])
//!
//! # Example
//!
//! ```rust
//! use rainpots_core::{remap_centered, AnalogChannel};
//!
//! // A calibrated center of 300 gives a dead band around the middle
//! assert_eq!(remap_centered(300, 300), 255);
//!
//! let mut knob = AnalogChannel::new();
//! for _ in 0..1000 {
//!     knob.process(990);
//! }
//! assert_eq!(knob.value(), 511);
//! assert!(knob.is_locked());
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded use)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod fmt;

pub mod controller;
pub mod filter;
pub mod leds;
pub mod storage;
pub mod timer;
pub mod types;

// Re-export main types at crate root
pub use controller::{Controller, OUTBOX_CAPACITY};
pub use filter::{remap_centered, AdcError, AnalogChannel, AnalogSource, CalibrationPoint, PotBank};
pub use leds::{indicator_states, LedDriver, INDICATOR_COUNT};
pub use storage::{CalibrationStore, RamStorage, Storage, StorageError};
pub use timer::{ButtonDebouncer, LongPressTimer, DEBOUNCE_MS, LONG_PRESS_INTERVAL_MS};
pub use types::{
    ControlEvent, ControllerConfig, ControllerMode, ControllerStatus, GlobalSettings, UiMode,
    BUTTON_COUNT, CONTROLLER_COUNT,
};
