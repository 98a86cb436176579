//! Wire formats for the RainPots board ring.
//!
//! Boards are chained over UART towards a single host. This crate holds
//! every byte-level format that crosses a board boundary:
//!
//! - **Control packets** ([`packet`]): 4-byte controller updates sent
//!   upstream, see [`format_packet`] and [`DataFormatter`].
//! - **Remote commands** ([`command`]): header + code + fixed payload frames
//!   that reconfigure a board, assembled by [`CommandAssembler`].
//! - **Relay** ([`relay`]): [`PacketCollector`] re-frames packets coming from
//!   the downstream neighbour before forwarding them.
//!
//! # Example
//!
//! ```
//! use rainpots_proto::{format_packet, Addressing, AssemblerEvent, CommandAssembler, CommandCode};
//!
//! assert_eq!(format_packet(0, 4, 511), [0xB0, 4, 0x7F, 0x03]);
//!
//! let mut assembler = CommandAssembler::new(Addressing::Board(2));
//! assembler.push_byte(0xF2);
//! if let AssemblerEvent::Complete(frame) = assembler.push_byte(0xE0) {
//!     assert_eq!(frame.code(), Some(CommandCode::CalibrationMin));
//! }
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod command;
pub mod packet;
pub mod relay;

pub use command::{
    command_header, frame_len, is_command_header, Addressing, AssemblerEvent, CommandAssembler,
    CommandCode, CommandFrame, ACK_END, ACK_START, BUTTON_VALUE_UNCHANGED,
    CONTROLLER_MODE_PAYLOAD_LEN, CONTROLLER_STATUS_PAYLOAD_LEN, MAX_COMMAND_LEN,
    SET_BUTTON_VALUES_PAYLOAD_LEN,
};
pub use packet::{format_packet, is_packet_status, DataFormatter, PACKET_LEN, STATUS_CC, VALUE_MAX};
pub use relay::PacketCollector;
