use crate::pus::DataFieldHeader;
use crate::spacepacket::SourcePacketHeader;
use crate::time::CorrelationError;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Fewer bits were available than a field layout requires.
    #[error("not enough data for {field}: need {required_bits} bits, got {available_bits}")]
    BufferTooShort {
        field: &'static str,
        required_bits: usize,
        available_bits: usize,
    },

    /// SCET could not be resolved to UTC. The data field header is carried with its
    /// `utc_time` unset, along with the source packet header when available.
    #[error("failed to convert SCET {} to UTC: {source}", .data_field_header.scet)]
    TimeConversion {
        data_field_header: Box<DataFieldHeader>,
        header: Option<Box<SourcePacketHeader>>,
        #[source]
        source: CorrelationError,
    },

    #[error("unknown mission: {0}")]
    UnknownMission(String),

    /// The declared packet length disagrees with the number of bytes after the primary
    /// header.
    #[error("packet length mismatch: header declares {declared} bytes, buffer holds {actual}")]
    Consistency { declared: usize, actual: usize },

    #[error("invalid reference epoch: {0}")]
    Epoch(#[from] chrono::ParseError),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid leap second table: {0}")]
    LeapSecondTable(String),

    #[error("not a record: {0}")]
    NotARecord(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
