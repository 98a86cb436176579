//! RainPots board firmware for RP2040.
//!
//! This crate wires the platform-agnostic [`rainpots_core::Controller`] to
//! the board peripherals and runs the UART ring that connects every board
//! to the host.
//!
//! # Architecture
//!
//! Two Embassy executors, one per core:
//!
//! - **Core 0**
//!   - **Control task**: samples the buttons and knobs, polls long presses,
//!     executes remote commands and pushes [`ControlEvent`]s into
//!     [`EVENTS`].
//!   - **USB tasks**: run the device stack and the CDC command link
//!     ([`usb_link`]).
//!   - **Upstream reader**: forwards every byte from the host side to the
//!     next board and picks out commands addressed to this board.
//! - **Core 1**
//!   - **Relay task**: turns queued events into packets and forwards
//!     complete packets arriving from the next board, both towards the
//!     host.
//!
//! Commands from either link reach the control task through [`COMMANDS`].
//! USB commands are acknowledged through [`USB_COMMAND_DONE`] once
//! executed.
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`force-config-init`**: Rewrite factory defaults to the EEPROM at every boot

#![no_std]

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use rainpots_core::ControlEvent;
use rainpots_proto::CommandFrame;

pub mod ads1015;
pub mod board;
pub mod eeprom;
pub mod knobs;
pub mod shift;
pub mod startup;
pub mod usb_link;

pub use ads1015::Ads1015;
pub use board::{COMMAND_QUEUE_DEPTH, EVENT_QUEUE_DEPTH};
pub use eeprom::Eeprom24lc32;
pub use knobs::{KnobAdc, SharedI2c0, SharedI2c0Bus};
pub use shift::{BoardLeds, ButtonShiftIn, LedShiftOut};
pub use usb_link::{configure_usb_cdc, LinkError, UsbCommandLink};

/// Where a remote command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum CommandSource {
    /// Local USB link; expects an `ACK_END` after execution.
    Usb,
    /// Upstream ring, addressed to this board.
    Ring,
}

/// A command waiting for the control task.
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct RemoteCommand {
    pub source: CommandSource,
    pub frame: CommandFrame,
}

/// Control events on their way to the relay task (core 0 to core 1).
pub static EVENTS: Channel<CriticalSectionRawMutex, ControlEvent, EVENT_QUEUE_DEPTH> =
    Channel::new();

/// Remote commands on their way to the control task.
pub static COMMANDS: Channel<CriticalSectionRawMutex, RemoteCommand, COMMAND_QUEUE_DEPTH> =
    Channel::new();

/// Raised by the control task after executing a USB command.
pub static USB_COMMAND_DONE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
