//! CCSDS Space Packet primary header.
//!
//! References:
//! * CCSDS Space Packet Protocol 133.0-B-2
//!     - https://public.ccsds.org/Pubs/133x0b2e1.pdf
use std::fmt::Display;

use serde::Serialize;

use crate::bits::unpack;
use crate::{Error, Result};

pub type Apid = u16;

/// Packet is a part of a packet group, but not first and not last
pub const SEQ_CONTINUATION: u8 = 0;
/// Packet is the first packet in a packet group
pub const SEQ_FIRST: u8 = 1;
/// Packet is the last packet in a packet group
pub const SEQ_LAST: u8 = 2;
/// Packet is not part of a packet group, i.e., standalone.
pub const SEQ_UNSEGMENTED: u8 = 3;

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketType {
    Telemetry,
    Telecommand,
}

impl From<bool> for PacketType {
    fn from(bit: bool) -> Self {
        if bit {
            PacketType::Telecommand
        } else {
            PacketType::Telemetry
        }
    }
}

impl Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketType::Telemetry => write!(f, "Telemetry"),
            PacketType::Telecommand => write!(f, "Telecommand"),
        }
    }
}

/// Packet Identification field of the primary header.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketIdentifier {
    pub version: u8,
    pub packet_type: PacketType,
    pub secondary_header_flag: bool,
    pub apid: Apid,
    /// Top 7 bits of the APID.
    pub process_id: u8,
    /// Bottom 4 bits of the APID.
    pub packet_category: u8,
}

impl PacketIdentifier {
    pub const LEN: usize = 2;
    const WIDTHS: [u8; 4] = [3, 1, 1, 11];

    /// Decode the 16-bit Packet ID from the start of `buf`.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if `buf` has fewer than 2 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let [version, packet_type, secondary_header_flag, apid] =
            unpack(buf, Self::WIDTHS, "packet identifier")?;
        let apid = apid as Apid;

        Ok(PacketIdentifier {
            version: version as u8,
            packet_type: PacketType::from(packet_type == 1),
            secondary_header_flag: secondary_header_flag == 1,
            apid,
            process_id: (apid >> 4 & 0x7f) as u8,
            packet_category: (apid & 0xf) as u8,
        })
    }
}

/// Packet Sequence Control field of the primary header.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequenceControl {
    /// Defines a packets grouping. See the `SEQ_*` values.
    pub segmentation_flag: u8,
    pub sequence_count: u16,
}

impl SequenceControl {
    pub const LEN: usize = 2;
    pub const SEQ_MAX: u16 = 16383;
    const WIDTHS: [u8; 2] = [2, 14];

    /// Decode the 16-bit Packet Sequence Control from the start of `buf`.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if `buf` has fewer than 2 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let [segmentation_flag, sequence_count] =
            unpack(buf, Self::WIDTHS, "sequence control")?;

        Ok(SequenceControl {
            segmentation_flag: segmentation_flag as u8,
            sequence_count: sequence_count as u16,
        })
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.segmentation_flag == SEQ_FIRST
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.segmentation_flag == SEQ_LAST
    }

    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.segmentation_flag == SEQ_CONTINUATION
    }

    #[must_use]
    pub fn is_unsegmented(&self) -> bool {
        self.segmentation_flag == SEQ_UNSEGMENTED
    }
}

/// CCSDS Source Packet Header
///
/// The 48-bit primary header common to all CCSDS space packets.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SourcePacketHeader {
    pub packet_identifier: PacketIdentifier,
    pub sequence_control: SequenceControl,
    /// Number of octets in the packet data field. The header stores this value minus 1.
    pub packet_length: usize,
}

impl SourcePacketHeader {
    /// Size of a ``SourcePacketHeader``
    pub const LEN: usize = 6;

    /// Decode from bytes.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if there are not enough bytes to construct the header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(Error::BufferTooShort {
                field: "source packet header",
                required_bits: Self::LEN * 8,
                available_bits: buf.len() * 8,
            });
        }
        let packet_identifier = PacketIdentifier::decode(&buf[0..2])?;
        let sequence_control = SequenceControl::decode(&buf[2..4])?;
        let len_minus1 = u16::from_be_bytes([buf[4], buf[5]]);

        Ok(SourcePacketHeader {
            packet_identifier,
            sequence_control,
            packet_length: usize::from(len_minus1) + 1,
        })
    }

    /// The length field as stored in the header.
    #[must_use]
    pub fn len_minus1(&self) -> u16 {
        (self.packet_length - 1) as u16
    }
}
