//! Remote command framing.
//!
//! A command is announced by a header byte (`0xF0 | board`) followed by a
//! command code and a fixed-length payload. The total frame length (code
//! plus payload, header excluded) is determined by the code:
//!
//! | Code | Command              | Frame length |
//! |------|----------------------|--------------|
//! | 0xE0 | `CALIBRATION_MIN`    | 1            |
//! | 0xE1 | `CALIBRATION_CENTER` | 1            |
//! | 0xE2 | `CALIBRATION_MAX`    | 1            |
//! | 0xE3 | `CONTROLLER_MODE`    | 9            |
//! | 0xE4 | `CONTROLLER_STATUS`  | 15           |
//! | 0xE5 | `SET_BUTTON_VALUES`  | 7            |
//! | else | unknown              | 1            |
//!
//! Frames are never rejected: an unknown code still yields a one-byte frame
//! so the assembler re-synchronises on the next header.

/// High nibble of a command header byte.
pub const COMMAND_HEADER: u8 = 0xF0;

/// Largest frame the assembler will buffer.
pub const MAX_COMMAND_LEN: usize = 24;

/// Payload byte in `SET_BUTTON_VALUES` meaning "leave this button alone".
pub const BUTTON_VALUE_UNCHANGED: u8 = 0x0F;

/// Sent on the local link when a command header is recognised (ASCII SOH).
pub const ACK_START: u8 = 0x01;

/// Sent on the local link once a command has been executed (ASCII EOT).
pub const ACK_END: u8 = 0x04;

/// Payload length of `CONTROLLER_MODE`.
pub const CONTROLLER_MODE_PAYLOAD_LEN: usize = 8;

/// Payload length of `CONTROLLER_STATUS`.
pub const CONTROLLER_STATUS_PAYLOAD_LEN: usize = 14;

/// Payload length of `SET_BUTTON_VALUES`.
pub const SET_BUTTON_VALUES_PAYLOAD_LEN: usize = 6;

/// Known remote command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandCode {
    CalibrationMin = 0xE0,
    CalibrationCenter = 0xE1,
    CalibrationMax = 0xE2,
    ControllerMode = 0xE3,
    ControllerStatus = 0xE4,
    SetButtonValues = 0xE5,
}

impl CommandCode {
    /// Decode a command code byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xE0 => Some(Self::CalibrationMin),
            0xE1 => Some(Self::CalibrationCenter),
            0xE2 => Some(Self::CalibrationMax),
            0xE3 => Some(Self::ControllerMode),
            0xE4 => Some(Self::ControllerStatus),
            0xE5 => Some(Self::SetButtonValues),
            _ => None,
        }
    }

    /// Number of payload bytes following the code.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::ControllerMode => CONTROLLER_MODE_PAYLOAD_LEN,
            Self::ControllerStatus => CONTROLLER_STATUS_PAYLOAD_LEN,
            Self::SetButtonValues => SET_BUTTON_VALUES_PAYLOAD_LEN,
            Self::CalibrationMin | Self::CalibrationCenter | Self::CalibrationMax => 0,
        }
    }
}

/// Frame length (code byte plus payload) for a raw code byte.
#[inline]
#[must_use]
pub const fn frame_len(code: u8) -> usize {
    match CommandCode::from_byte(code) {
        Some(code) => code.payload_len() + 1,
        None => 1,
    }
}

/// Check whether a byte is a command header for any board.
#[inline]
#[must_use]
pub const fn is_command_header(byte: u8) -> bool {
    byte >> 4 == COMMAND_HEADER >> 4
}

/// Header byte addressing a specific board.
#[inline]
#[must_use]
pub const fn command_header(board: u8) -> u8 {
    COMMAND_HEADER | (board & 0x0F)
}

/// A complete command frame: code byte followed by its payload.
///
/// Bytes past the frame length read as zero, matching a zero-initialised
/// receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandFrame {
    bytes: [u8; MAX_COMMAND_LEN],
    len: usize,
}

impl CommandFrame {
    /// Build a frame from raw bytes (code first). Excess bytes are dropped.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        let len = data.len().min(MAX_COMMAND_LEN);
        let mut bytes = [0u8; MAX_COMMAND_LEN];
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bytes, len }
    }

    /// Raw command code byte.
    #[inline]
    #[must_use]
    pub fn code_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// Decoded command code, `None` for unknown codes.
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<CommandCode> {
        CommandCode::from_byte(self.code_byte())
    }

    /// Payload byte `index` (0-based, after the code). Zero when absent.
    #[inline]
    #[must_use]
    pub fn payload_byte(&self, index: usize) -> u8 {
        self.bytes.get(index + 1).copied().unwrap_or(0)
    }

    /// Payload bytes actually received.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        if self.len == 0 {
            &[]
        } else {
            &self.bytes[1..self.len]
        }
    }

    /// All received bytes, code first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Which headers the assembler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Addressing {
    /// Only `0xF0 | board` starts a frame (shared upstream ring).
    Board(u8),
    /// Any `0xF?` byte starts a frame (point-to-point local link).
    AnyBoard,
}

impl Addressing {
    fn accepts(self, byte: u8) -> bool {
        match self {
            Self::Board(board) => byte == command_header(board),
            Self::AnyBoard => is_command_header(byte),
        }
    }
}

/// Result of feeding one byte to a [`CommandAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblerEvent {
    /// Byte was not part of a frame for this board.
    Ignored,
    /// Header recognised, collection started.
    Started,
    /// Byte stored, frame still incomplete.
    Collecting,
    /// Frame complete.
    Complete(CommandFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssemblerState {
    WaitingForHeader,
    ReadingCode,
    ReadingPayload { expected_len: usize },
}

/// Byte-at-a-time remote command assembler.
pub struct CommandAssembler {
    addressing: Addressing,
    buffer: [u8; MAX_COMMAND_LEN],
    pos: usize,
    state: AssemblerState,
}

impl CommandAssembler {
    /// Create an assembler with the given header filter.
    #[must_use]
    pub const fn new(addressing: Addressing) -> Self {
        Self {
            addressing,
            buffer: [0u8; MAX_COMMAND_LEN],
            pos: 0,
            state: AssemblerState::WaitingForHeader,
        }
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.buffer = [0u8; MAX_COMMAND_LEN];
        self.pos = 0;
        self.state = AssemblerState::WaitingForHeader;
    }

    /// Whether a frame is currently being collected.
    #[inline]
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.state != AssemblerState::WaitingForHeader
    }

    /// Feed a byte to the assembler.
    pub fn push_byte(&mut self, byte: u8) -> AssemblerEvent {
        match self.state {
            AssemblerState::WaitingForHeader => {
                if self.addressing.accepts(byte) {
                    self.reset();
                    self.state = AssemblerState::ReadingCode;
                    AssemblerEvent::Started
                } else {
                    AssemblerEvent::Ignored
                }
            }
            AssemblerState::ReadingCode => {
                self.buffer[0] = byte;
                self.pos = 1;
                self.finish_or_continue(frame_len(byte))
            }
            AssemblerState::ReadingPayload { expected_len } => {
                self.buffer[self.pos] = byte;
                self.pos += 1;
                self.finish_or_continue(expected_len)
            }
        }
    }

    fn finish_or_continue(&mut self, expected_len: usize) -> AssemblerEvent {
        if self.pos >= expected_len {
            let frame = CommandFrame::from_bytes(&self.buffer[..self.pos]);
            self.reset();
            AssemblerEvent::Complete(frame)
        } else {
            self.state = AssemblerState::ReadingPayload { expected_len };
            AssemblerEvent::Collecting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut CommandAssembler, bytes: &[u8]) -> Option<CommandFrame> {
        let mut out = None;
        for &b in bytes {
            if let AssemblerEvent::Complete(frame) = assembler.push_byte(b) {
                out = Some(frame);
            }
        }
        out
    }

    #[test]
    fn test_frame_lengths() {
        assert_eq!(frame_len(0xE0), 1);
        assert_eq!(frame_len(0xE1), 1);
        assert_eq!(frame_len(0xE2), 1);
        assert_eq!(frame_len(0xE3), 9);
        assert_eq!(frame_len(0xE4), 15);
        assert_eq!(frame_len(0xE5), 7);
        assert_eq!(frame_len(0x42), 1);
    }

    #[test]
    fn test_addressed_header_filter() {
        let mut assembler = CommandAssembler::new(Addressing::Board(3));
        assert_eq!(assembler.push_byte(0xF2), AssemblerEvent::Ignored);
        assert_eq!(assembler.push_byte(0xB3), AssemblerEvent::Ignored);
        assert_eq!(assembler.push_byte(0xF3), AssemblerEvent::Started);
        assert!(assembler.is_collecting());
    }

    #[test]
    fn test_any_board_header_filter() {
        let mut assembler = CommandAssembler::new(Addressing::AnyBoard);
        assert_eq!(assembler.push_byte(0xE0), AssemblerEvent::Ignored);
        assert_eq!(assembler.push_byte(0xFA), AssemblerEvent::Started);
    }

    #[test]
    fn test_calibration_command_completes_on_code() {
        let mut assembler = CommandAssembler::new(Addressing::Board(0));
        assembler.push_byte(0xF0);
        match assembler.push_byte(0xE1) {
            AssemblerEvent::Complete(frame) => {
                assert_eq!(frame.code(), Some(CommandCode::CalibrationCenter));
                assert!(frame.payload().is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!assembler.is_collecting());
    }

    #[test]
    fn test_set_button_values_frame() {
        let mut assembler = CommandAssembler::new(Addressing::Board(1));
        let frame = feed(&mut assembler, &[0xF1, 0xE5, 1, 0x0F, 2, 0, 0, 1]).unwrap();
        assert_eq!(frame.code(), Some(CommandCode::SetButtonValues));
        assert_eq!(frame.payload(), &[1, 0x0F, 2, 0, 0, 1]);
        assert_eq!(frame.as_bytes().len(), 7);
    }

    #[test]
    fn test_header_bytes_inside_payload_are_data() {
        let mut assembler = CommandAssembler::new(Addressing::AnyBoard);
        let mut bytes = [0u8; 16];
        bytes[0] = 0xF0;
        bytes[1] = 0xE4;
        bytes[2] = 0xF0;
        let frame = feed(&mut assembler, &bytes).unwrap();
        assert_eq!(frame.payload_byte(0), 0xF0);
        assert_eq!(frame.payload().len(), CONTROLLER_STATUS_PAYLOAD_LEN);
    }

    #[test]
    fn test_unknown_code_yields_single_byte_frame() {
        let mut assembler = CommandAssembler::new(Addressing::Board(0));
        let frame = feed(&mut assembler, &[0xF0, 0x10]).unwrap();
        assert_eq!(frame.code(), None);
        assert_eq!(frame.code_byte(), 0x10);
        // Next byte is not a header and must be ignored
        assert_eq!(assembler.push_byte(0x01), AssemblerEvent::Ignored);
    }

    #[test]
    fn test_missing_payload_bytes_read_as_zero() {
        let frame = CommandFrame::from_bytes(&[0xE3, 1]);
        assert_eq!(frame.payload_byte(0), 1);
        assert_eq!(frame.payload_byte(7), 0);
        assert_eq!(frame.payload_byte(100), 0);
    }
}
