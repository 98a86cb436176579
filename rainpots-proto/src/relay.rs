//! Re-assembly of control packets arriving from the downstream board.
//!
//! Boards are daisy-chained: each one forwards its neighbour's packets
//! towards the host. Only whole packets are forwarded so that local
//! packets can be interleaved between them safely.

use crate::packet::{is_packet_status, PACKET_LEN};

/// Collects 4-byte control packets from a raw byte stream.
///
/// A status byte (`0xB?`) always starts a new packet, discarding any
/// partial one. Data bytes outside a packet are dropped.
pub struct PacketCollector {
    packet: [u8; PACKET_LEN],
    pos: usize,
    collecting: bool,
}

impl PacketCollector {
    /// Create an idle collector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            packet: [0u8; PACKET_LEN],
            pos: 0,
            collecting: false,
        }
    }

    /// Feed a byte, returning a packet once its last byte arrives.
    pub fn push_byte(&mut self, byte: u8) -> Option<[u8; PACKET_LEN]> {
        if is_packet_status(byte) {
            self.packet = [byte, 0, 0, 0];
            self.pos = 1;
            self.collecting = true;
            return None;
        }

        if !self.collecting {
            return None;
        }

        self.packet[self.pos] = byte;
        self.pos += 1;
        if self.pos == PACKET_LEN {
            self.collecting = false;
            self.pos = 0;
            return Some(self.packet);
        }
        None
    }

    /// Whether a partial packet is pending.
    #[inline]
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }
}

impl Default for PacketCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::format_packet;

    #[test]
    fn test_collects_whole_packet() {
        let mut collector = PacketCollector::new();
        let packet = format_packet(2, 11, 300);
        assert_eq!(collector.push_byte(packet[0]), None);
        assert_eq!(collector.push_byte(packet[1]), None);
        assert_eq!(collector.push_byte(packet[2]), None);
        assert_eq!(collector.push_byte(packet[3]), Some(packet));
        assert!(!collector.is_collecting());
    }

    #[test]
    fn test_drops_stray_data_bytes() {
        let mut collector = PacketCollector::new();
        assert_eq!(collector.push_byte(0x12), None);
        assert_eq!(collector.push_byte(0x7F), None);
        assert!(!collector.is_collecting());
    }

    #[test]
    fn test_new_status_restarts_partial_packet() {
        let mut collector = PacketCollector::new();
        collector.push_byte(0xB1);
        collector.push_byte(3);
        let packet = format_packet(4, 6, 17);
        let mut out = None;
        for b in packet {
            out = collector.push_byte(b);
        }
        assert_eq!(out, Some(packet));
    }

    #[test]
    fn test_back_to_back_packets() {
        let mut collector = PacketCollector::new();
        let first = format_packet(1, 0, 511);
        let second = format_packet(1, 1, 0);
        let mut seen = 0;
        for b in first.iter().chain(second.iter()) {
            if collector.push_byte(*b).is_some() {
                seen += 1;
            }
        }
        assert_eq!(seen, 2);
    }
}
