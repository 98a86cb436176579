//! USB CDC command link.
//!
//! A configuration tool on the host talks to the board over a virtual
//! serial port. Any `0xF?` header starts a command (the tool does not know
//! the board id); the board answers `ACK_START` as soon as the header is
//! seen and `ACK_END` once the command has been executed.

use defmt::trace;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::Builder;
use rainpots_proto::{Addressing, AssemblerEvent, CommandAssembler, CommandFrame, ACK_END, ACK_START};

/// Full-speed bulk packet size.
pub const USB_PACKET_SIZE: u16 = 64;

/// Error type for the USB link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LinkError {
    /// Host closed the port or the cable was pulled.
    Disconnected,
    /// Packet did not fit the buffer.
    Overflow,
}

impl From<EndpointError> for LinkError {
    fn from(e: EndpointError) -> Self {
        match e {
            EndpointError::BufferOverflow => Self::Overflow,
            EndpointError::Disabled => Self::Disconnected,
        }
    }
}

/// Add a CDC-ACM interface to the USB device.
pub fn configure_usb_cdc<'d>(
    builder: &mut Builder<'d, Driver<'d, USB>>,
    state: &'d mut State<'d>,
) -> CdcAcmClass<'d, Driver<'d, USB>> {
    CdcAcmClass::new(builder, state, USB_PACKET_SIZE)
}

/// Command framing over a CDC-ACM class.
pub struct UsbCommandLink<'d> {
    class: CdcAcmClass<'d, Driver<'d, USB>>,
    assembler: CommandAssembler,
    packet: [u8; USB_PACKET_SIZE as usize],
    len: usize,
    pos: usize,
}

impl<'d> UsbCommandLink<'d> {
    pub fn new(class: CdcAcmClass<'d, Driver<'d, USB>>) -> Self {
        Self {
            class,
            assembler: CommandAssembler::new(Addressing::AnyBoard),
            packet: [0; USB_PACKET_SIZE as usize],
            len: 0,
            pos: 0,
        }
    }

    /// Wait until the host opens the port. Drops any half-received frame.
    pub async fn wait_connected(&mut self) {
        self.class.wait_connection().await;
        self.assembler.reset();
        self.len = 0;
        self.pos = 0;
    }

    /// Read until a complete command has been received.
    pub async fn next_command(&mut self) -> Result<CommandFrame, LinkError> {
        loop {
            if self.pos == self.len {
                self.len = self.class.read_packet(&mut self.packet).await?;
                self.pos = 0;
                continue;
            }

            let byte = self.packet[self.pos];
            self.pos += 1;
            match self.assembler.push_byte(byte) {
                AssemblerEvent::Started => self.class.write_packet(&[ACK_START]).await?,
                AssemblerEvent::Complete(frame) => {
                    trace!("usb command {=u8:#x}", frame.code_byte());
                    return Ok(frame);
                }
                AssemblerEvent::Ignored => trace!("usb: stray byte {=u8:#x}", byte),
                AssemblerEvent::Collecting => {}
            }
        }
    }

    /// Report that the last command has been executed.
    pub async fn acknowledge(&mut self) -> Result<(), LinkError> {
        self.class.write_packet(&[ACK_END]).await?;
        Ok(())
    }
}
