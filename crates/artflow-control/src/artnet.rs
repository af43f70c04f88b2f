//! Art-Net ArtDmx framing (Art-Net 4)
//!
//! Only the OpDmx packet is produced; discovery and polling are not part
//! of ArtFlow.

/// Default Art-Net UDP port
pub const ARTNET_PORT: u16 = 6454;

/// Packet ID
pub const HEADER: &[u8; 8] = b"Art-Net\0";

/// OpDmx opcode (sent little-endian)
pub const OP_DMX: u16 = 0x5000;

/// Protocol revision (sent big-endian)
pub const PROTOCOL_VERSION: u16 = 14;

/// Bytes before the DMX data
pub const HEADER_LEN: usize = 18;

/// Largest DMX payload
pub const MAX_DATA_LEN: usize = 512;

/// Port-Address is 15 bits wide
const PORT_ADDRESS_MASK: u16 = 0x7FFF;

/// ArtDmx sequence counter.
///
/// Runs 1..=255 and wraps back to 1; 0 would tell receivers to ignore
/// sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence(u8);

impl Sequence {
    pub fn new() -> Self {
        Self(1)
    }

    /// Current value
    pub fn value(self) -> u8 {
        self.0
    }

    /// Move to the next value
    pub fn advance(&mut self) {
        self.0 = if self.0 == u8::MAX { 1 } else { self.0 + 1 };
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an ArtDmx packet.
///
/// The payload is truncated to 512 bytes and zero-padded to an even length
/// of at least 2, as the protocol requires.
pub fn build_artdmx_packet(sequence: u8, universe: u16, data: &[u8]) -> Vec<u8> {
    let data = &data[..data.len().min(MAX_DATA_LEN)];
    let len = (data.len() + data.len() % 2).max(2);

    let mut packet = vec![0u8; HEADER_LEN + len];

    // Header: "Art-Net\0"
    packet[0..8].copy_from_slice(HEADER);

    // OpCode: OpDmx (0x5000)
    packet[8..10].copy_from_slice(&OP_DMX.to_le_bytes());

    // Protocol version (14)
    packet[10..12].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());

    packet[12] = sequence;

    // Physical (0)
    packet[13] = 0;

    // Universe (Port-Address)
    packet[14..16].copy_from_slice(&(universe & PORT_ADDRESS_MASK).to_le_bytes());

    // Length (big-endian)
    packet[16..18].copy_from_slice(&(len as u16).to_be_bytes());

    packet[HEADER_LEN..HEADER_LEN + data.len()].copy_from_slice(data);

    packet
}

/// A decoded ArtDmx packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    pub sequence: u8,
    pub physical: u8,
    pub universe: u16,
    pub data: Vec<u8>,
}

impl ArtDmx {
    /// Decode an ArtDmx packet, `None` if it is not one
    pub fn parse(packet: &[u8]) -> Option<Self> {
        if packet.len() < HEADER_LEN || &packet[0..8] != HEADER {
            return None;
        }
        if u16::from_le_bytes([packet[8], packet[9]]) != OP_DMX {
            return None;
        }
        let len = u16::from_be_bytes([packet[16], packet[17]]) as usize;
        let data = packet.get(HEADER_LEN..HEADER_LEN + len)?;
        Some(Self {
            sequence: packet[12],
            physical: packet[13],
            universe: u16::from_le_bytes([packet[14], packet[15]]),
            data: data.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artnet_packet_structure() {
        let channels = [0u8; 512];
        let packet = build_artdmx_packet(1, 0, &channels);

        // Check header
        assert_eq!(&packet[0..8], b"Art-Net\0");

        // Check OpCode (little-endian)
        assert_eq!(packet[8], 0x00);
        assert_eq!(packet[9], 0x50);

        // Check protocol version (big-endian)
        assert_eq!(packet[10], 0);
        assert_eq!(packet[11], 14);

        // Check length (big-endian)
        assert_eq!(packet[16], 0x02);
        assert_eq!(packet[17], 0x00);

        assert_eq!(packet.len(), 18 + 512);
    }

    #[test]
    fn test_short_payload_is_padded_even() {
        let packet = build_artdmx_packet(9, 3, &[1, 2, 3]);
        assert_eq!(packet.len(), 18 + 4);
        assert_eq!(&packet[16..18], &[0, 4]);
        assert_eq!(&packet[18..], &[1, 2, 3, 0]);

        let packet = build_artdmx_packet(9, 3, &[]);
        assert_eq!(packet.len(), 18 + 2);
    }

    #[test]
    fn test_universe_field() {
        let packet = build_artdmx_packet(1, 0x0123, &[0, 0]);
        assert_eq!(&packet[14..16], &[0x23, 0x01]);

        let packet = build_artdmx_packet(1, 0xFFFF, &[0, 0]);
        assert_eq!(&packet[14..16], &[0xFF, 0x7F]);
    }

    #[test]
    fn test_sequence_skips_zero() {
        let mut seq = Sequence::new();
        assert_eq!(seq.value(), 1);
        for _ in 0..254 {
            seq.advance();
        }
        assert_eq!(seq.value(), 255);
        seq.advance();
        assert_eq!(seq.value(), 1);
    }

    #[test]
    fn test_parse_artdmx() {
        let packet = build_artdmx_packet(42, 7, &[10, 20]);
        let dmx = ArtDmx::parse(&packet).unwrap();
        assert_eq!(dmx.sequence, 42);
        assert_eq!(dmx.universe, 7);
        assert_eq!(dmx.data, vec![10, 20]);

        assert!(ArtDmx::parse(b"Art-Net").is_none());
        let mut wrong_op = packet.clone();
        wrong_op[9] = 0x20;
        assert!(ArtDmx::parse(&wrong_op).is_none());
    }
}
