//! Outbound control packets.
//!
//! Every controller change leaves the board as a fixed 4-byte,
//! MIDI control-change-like packet:
//!
//! ```text
//! [0xB0 | board, controller, value & 0x7F, (value >> 7) & 0x7F]
//! ```
//!
//! Values are 9 bits wide (0-511), so the high group only ever uses its
//! lower two bits.

/// High nibble of the packet status byte.
pub const STATUS_CC: u8 = 0xB0;

/// Mask selecting the high nibble of a status byte.
pub const STATUS_MASK: u8 = 0xF0;

/// Largest value a packet can carry.
pub const VALUE_MAX: u16 = 511;

/// Length of an encoded control packet.
pub const PACKET_LEN: usize = 4;

const SEVEN_BITS: u16 = 0x7F;

/// Encode a controller value into a control packet.
///
/// Values above [`VALUE_MAX`] are clipped, the board index is truncated to
/// its low nibble. This function cannot fail.
#[inline]
#[must_use]
pub fn format_packet(board: u8, controller: u8, value: u16) -> [u8; PACKET_LEN] {
    let value = value.min(VALUE_MAX);
    [
        STATUS_CC | (board & 0x0F),
        controller,
        (value & SEVEN_BITS) as u8,
        ((value >> 7) & SEVEN_BITS) as u8,
    ]
}

/// Check whether a byte starts a control packet.
#[inline]
#[must_use]
pub const fn is_packet_status(byte: u8) -> bool {
    byte & STATUS_MASK == STATUS_CC
}

/// Packet encoder bound to a single board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataFormatter {
    board: u8,
}

impl DataFormatter {
    /// Create a formatter for the given board index (0-15).
    #[must_use]
    pub const fn new(board: u8) -> Self {
        Self { board: board & 0x0F }
    }

    /// Board index stamped into every packet.
    #[inline]
    #[must_use]
    pub const fn board(&self) -> u8 {
        self.board
    }

    /// Encode one controller value.
    #[inline]
    #[must_use]
    pub fn format(&self, controller: u8, value: u16) -> [u8; PACKET_LEN] {
        format_packet(self.board, controller, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_full_scale() {
        assert_eq!(format_packet(0, 4, 511), [0xB0, 4, 0x7F, 0x03]);
        assert_eq!(format_packet(3, 4, 511), [0xB3, 4, 0x7F, 0x03]);
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(format_packet(2, 4, 0), [0xB2, 4, 0, 0]);
    }

    #[test]
    fn test_format_splits_seven_bit_groups() {
        // 300 = 0b1_0010_1100 -> low 0x2C, high 0x02
        assert_eq!(format_packet(0, 9, 300), [0xB0, 9, 0x2C, 0x02]);
        assert_eq!(format_packet(0, 9, 128), [0xB0, 9, 0x00, 0x01]);
    }

    #[test]
    fn test_format_clips_value() {
        assert_eq!(format_packet(0, 1, 600), format_packet(0, 1, 511));
        assert_eq!(format_packet(0, 1, u16::MAX), [0xB0, 1, 0x7F, 0x03]);
    }

    #[test]
    fn test_formatter_masks_board_index() {
        let formatter = DataFormatter::new(0x1A);
        assert_eq!(formatter.board(), 0x0A);
        assert_eq!(formatter.format(7, 1), [0xBA, 7, 1, 0]);
    }

    #[test]
    fn test_data_bytes_never_look_like_status() {
        for value in [0u16, 127, 128, 255, 384, 511] {
            let packet = format_packet(5, 13, value);
            assert!(is_packet_status(packet[0]));
            assert!(!is_packet_status(packet[1]));
            assert!(!is_packet_status(packet[2]));
            assert!(!is_packet_status(packet[3]));
        }
    }
}
