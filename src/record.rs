//! Field-ordered mappings of decoded entities for downstream renderers.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::decoder::CcsdsPacket;
use crate::pus::{DataFieldHeader, Scet};
use crate::spacepacket::{PacketIdentifier, SequenceControl, SourcePacketHeader};
use crate::{Error, Result};

/// Decoded entity that can be rendered as an ordered field name to value mapping.
///
/// Fields appear in declaration order. Nested entities become nested mappings.
pub trait Record: Serialize {
    /// # Errors
    /// [Error::NotARecord] if the entity does not serialize to a mapping.
    fn to_record(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::NotARecord(std::any::type_name::<Self>())),
        }
    }
}

impl Record for PacketIdentifier {}
impl Record for SequenceControl {}
impl Record for SourcePacketHeader {}
impl Record for Scet {}
impl Record for DataFieldHeader {}
impl Record for CcsdsPacket {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_in_order() {
        let ph = SourcePacketHeader::decode(&[0xd, 0x59, 0xd2, 0xab, 0xa, 0x8f]).unwrap();
        let record = ph.to_record().unwrap();

        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["packet_identifier", "sequence_control", "packet_length"]
        );

        let id = record["packet_identifier"].as_object().unwrap();
        let keys: Vec<&str> = id.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "version",
                "packet_type",
                "secondary_header_flag",
                "apid",
                "process_id",
                "packet_category"
            ]
        );
        assert_eq!(id["packet_type"], "Telemetry");
        assert_eq!(id["apid"], 1369);
        assert_eq!(record["packet_length"], 2704);
    }
}
