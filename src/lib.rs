#![doc = include_str!("../README.md")]

mod error;

pub mod bits;
pub mod decoder;
pub mod missions;
pub mod pus;
pub mod record;
pub mod spacepacket;
pub mod time;

pub use decoder::{CcsdsPacket, LengthCheck, PacketDecoder};
pub use error::{Error, Result};
pub use missions::{Mission, MissionId, MissionRegistry};
pub use pus::{DataFieldHeader, Scet};
pub use record::Record;
pub use spacepacket::{PacketIdentifier, PacketType, SequenceControl, SourcePacketHeader};
pub use time::{parse_t0, TimeResolver};
