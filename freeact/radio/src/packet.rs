//! Mesh packet format.
//!
//! Every frame on air is 16 bytes, little-endian:
//!
//! | offset | size | field      |
//! |--------|------|------------|
//! | 0      | 1    | source id  |
//! | 1      | 1    | destination id |
//! | 2      | 1    | flags      |
//! | 3      | 1    | max hops   |
//! | 4      | 2    | message id |
//! | 6      | 6    | payload    |
//! | 12     | 2    | CRC-16 of bytes 0..12 |
//! | 14     | 2    | padding    |

use core::fmt;

/// Payload bytes carried by one packet
pub const PAYLOAD_LEN: usize = 6;
/// Largest hop budget a packet may carry
pub const MAX_HOPS: u8 = 5;
/// Destination id addressing every node
pub const BROADCAST_ID: u8 = 255;
/// Size of an encoded packet
pub const PACKET_LEN: usize = 16;

const CRC_OFFSET: usize = 12;

/// Packet option bits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub requires_ack: bool,
    pub broadcasting: bool,
    pub needs_forwarding: bool,
    pub connected_nodes_info: bool,
}

impl Flags {
    const REQUIRES_ACK: u8 = 1 << 0;
    const BROADCASTING: u8 = 1 << 1;
    const NEEDS_FORWARDING: u8 = 1 << 2;
    const CONNECTED_NODES_INFO: u8 = 1 << 3;

    pub const fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.requires_ack {
            bits |= Self::REQUIRES_ACK;
        }
        if self.broadcasting {
            bits |= Self::BROADCASTING;
        }
        if self.needs_forwarding {
            bits |= Self::NEEDS_FORWARDING;
        }
        if self.connected_nodes_info {
            bits |= Self::CONNECTED_NODES_INFO;
        }
        bits
    }

    /// Decode flag bits; undefined bits are ignored
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            requires_ack: bits & Self::REQUIRES_ACK != 0,
            broadcasting: bits & Self::BROADCASTING != 0,
            needs_forwarding: bits & Self::NEEDS_FORWARDING != 0,
            connected_nodes_info: bits & Self::CONNECTED_NODES_INFO != 0,
        }
    }
}

/// Errors building or decoding a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Hop budget above [`MAX_HOPS`]
    InvalidHops(u8),
    /// Source and destination are the same node
    Loopback(u8),
    /// Frame shorter than [`PACKET_LEN`]
    TooShort(usize),
    /// CRC field does not match the frame contents
    CrcMismatch { expected: u16, found: u16 },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::InvalidHops(hops) => {
                write!(f, "Hop count {} exceeds maximum {}", hops, MAX_HOPS)
            }
            PacketError::Loopback(id) => write!(f, "Source and destination are both {}", id),
            PacketError::TooShort(len) => write!(f, "Frame too short ({} bytes)", len),
            PacketError::CrcMismatch { expected, found } => {
                write!(f, "CRC mismatch: expected {:#06x}, found {:#06x}", expected, found)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

#[cfg(feature = "defmt")]
impl defmt::Format for PacketError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PacketError::InvalidHops(hops) => defmt::write!(fmt, "InvalidHops({})", hops),
            PacketError::Loopback(id) => defmt::write!(fmt, "Loopback({})", id),
            PacketError::TooShort(len) => defmt::write!(fmt, "TooShort({})", len),
            PacketError::CrcMismatch { expected, found } => {
                defmt::write!(fmt, "CrcMismatch({=u16:#x} != {=u16:#x})", found, expected)
            }
        }
    }
}

/// CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no final XOR
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// One mesh packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub src_id: u8,
    pub dest_id: u8,
    pub flags: Flags,
    pub max_hops: u8,
    pub msg_id: u16,
    pub payload: [u8; PAYLOAD_LEN],
    crc: u16,
}

impl Packet {
    /// Build a packet and compute its CRC
    pub fn build(
        src_id: u8,
        dest_id: u8,
        flags: Flags,
        max_hops: u8,
        msg_id: u16,
        payload: [u8; PAYLOAD_LEN],
    ) -> Result<Self, PacketError> {
        if max_hops > MAX_HOPS {
            return Err(PacketError::InvalidHops(max_hops));
        }
        if src_id == dest_id {
            return Err(PacketError::Loopback(src_id));
        }

        let mut packet = Self {
            src_id,
            dest_id,
            flags,
            max_hops,
            msg_id,
            payload,
            crc: 0,
        };
        packet.crc = crc16(&packet.encode()[..CRC_OFFSET]);
        Ok(packet)
    }

    /// CRC over the header and payload
    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn is_broadcast(&self) -> bool {
        self.dest_id == BROADCAST_ID
    }

    /// Wire image of the packet
    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut frame = [0u8; PACKET_LEN];
        frame[0] = self.src_id;
        frame[1] = self.dest_id;
        frame[2] = self.flags.to_bits();
        frame[3] = self.max_hops;
        frame[4..6].copy_from_slice(&self.msg_id.to_le_bytes());
        frame[6..CRC_OFFSET].copy_from_slice(&self.payload);
        frame[CRC_OFFSET..CRC_OFFSET + 2].copy_from_slice(&self.crc.to_le_bytes());
        frame
    }

    /// Parse a received frame. Bytes past [`PACKET_LEN`] are ignored.
    pub fn decode(frame: &[u8]) -> Result<Self, PacketError> {
        if frame.len() < PACKET_LEN {
            return Err(PacketError::TooShort(frame.len()));
        }

        let found = u16::from_le_bytes([frame[CRC_OFFSET], frame[CRC_OFFSET + 1]]);
        let expected = crc16(&frame[..CRC_OFFSET]);
        if found != expected {
            return Err(PacketError::CrcMismatch { expected, found });
        }

        let max_hops = frame[3];
        if max_hops > MAX_HOPS {
            return Err(PacketError::InvalidHops(max_hops));
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&frame[6..CRC_OFFSET]);
        Ok(Self {
            src_id: frame[0],
            dest_id: frame[1],
            flags: Flags::from_bits(frame[2]),
            max_hops,
            msg_id: u16::from_le_bytes([frame[4], frame[5]]),
            payload,
            crc: found,
        })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Packet {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Packet {{ {} -> {}, msg {}, hops {} }}",
            self.src_id,
            self.dest_id,
            self.msg_id,
            self.max_hops
        );
    }
}
