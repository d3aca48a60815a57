use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::missions::{Mission, MissionId, MissionRegistry};
use crate::pus::DataFieldHeader;
use crate::spacepacket::{Apid, PacketType, SourcePacketHeader};
use crate::time::{sentinel_epoch, ClockCorrelation};
use crate::{Error, Result};

/// How to treat a declared packet length that disagrees with the buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthCheck {
    /// Log a warning and decode anyway.
    #[default]
    Lenient,
    /// Fail with [Error::Consistency].
    Strict,
}

/// A decoded CCSDS space packet with a PUS data field header.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CcsdsPacket {
    pub mission: Mission,
    /// Clock identifier the mission resolved to, if any.
    pub mission_id: Option<MissionId>,
    pub source_packet_header: SourcePacketHeader,
    pub data_field_header: DataFieldHeader,
    /// User data following the data field header, not interpreted.
    #[serde(with = "hex")]
    pub payload: Vec<u8>,
}

impl CcsdsPacket {
    #[must_use]
    pub fn apid(&self) -> Apid {
        self.source_packet_header.packet_identifier.apid
    }

    #[must_use]
    pub fn service_type(&self) -> u8 {
        self.data_field_header.service_type
    }

    #[must_use]
    pub fn service_subtype(&self) -> u8 {
        self.data_field_header.service_subtype
    }

    /// The resolved UTC time, or `None` if it is not parseable.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.data_field_header.utc_time.as_deref()?)
            .ok()
            .map(Into::into)
    }
}

impl Display for CcsdsPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source_packet_header.packet_identifier.packet_type {
            PacketType::Telemetry => "TM",
            PacketType::Telecommand => "TC",
        };
        write!(
            f,
            "{} - APID: {} - {kind}({},{}) - Data: {}",
            self.mission,
            self.apid(),
            self.service_type(),
            self.service_subtype(),
            hex::encode(&self.payload)
        )
    }
}

/// Decodes CCSDS space packets carrying a PUS data field header.
///
/// # Example
/// ```
/// use ccsds_pus::{parse_t0, PacketDecoder};
///
/// let decoder = PacketDecoder::builder().build();
/// let t0 = parse_t0("2020-01-01T00:00:00.000000Z").unwrap();
/// let packet = decoder
///     .decode_hex("09a1c0050009 10031900000001f40000 deadbeef", "juice", Some(t0))
///     .unwrap();
///
/// assert_eq!(packet.apid(), 417);
/// assert_eq!(
///     packet.data_field_header.utc_time.as_deref(),
///     Some("2020-01-01T00:08:20.000000Z")
/// );
/// ```
#[derive(TypedBuilder)]
pub struct PacketDecoder {
    /// Mission name lookup. Defaults to the built-in missions.
    #[builder(default)]
    registry: MissionRegistry,
    /// Clock correlation service used when no reference epoch is given.
    #[builder(default, setter(strip_option))]
    clock: Option<Arc<dyn ClockCorrelation>>,
    #[builder(default)]
    length_check: LengthCheck,
}

impl PacketDecoder {
    /// Minimum number of bytes for a packet: primary plus data field header.
    pub const MIN_LEN: usize = SourcePacketHeader::LEN + DataFieldHeader::LEN;

    /// Decode a single packet.
    ///
    /// `t0` selects the linear offset time strategy. An unknown mission name is not an error;
    /// it is logged and `t0` is forced to the Unix epoch.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if `buf` is shorter than [PacketDecoder::MIN_LEN],
    /// [Error::Consistency] for a length mismatch when using [LengthCheck::Strict], or
    /// [Error::TimeConversion] if the SCET cannot be resolved.
    pub fn decode<M>(
        &self,
        buf: &[u8],
        mission: M,
        t0: Option<DateTime<Utc>>,
    ) -> Result<CcsdsPacket>
    where
        M: Into<Mission>,
    {
        let mission = mission.into();
        if buf.len() < Self::MIN_LEN {
            return Err(Error::BufferTooShort {
                field: "packet",
                required_bits: Self::MIN_LEN * 8,
                available_bits: buf.len() * 8,
            });
        }

        let (mission_id, t0) = match self.registry.resolve(&mission) {
            Ok(id) => (Some(id), t0),
            Err(Error::UnknownMission(name)) => {
                warn!(mission = %name, "unknown mission, converting time from 1970-01-01T00:00:00Z");
                (None, Some(sentinel_epoch()))
            }
            Err(err) => return Err(err),
        };

        let (head, data) = buf.split_at(SourcePacketHeader::LEN);
        let header = SourcePacketHeader::decode(head)?;
        self.check_length(&header, data.len())?;

        let (dfh, payload) = data.split_at(DataFieldHeader::LEN);
        let data_field_header =
            DataFieldHeader::decode(dfh, mission_id, t0, self.clock.as_deref()).map_err(
                |err| match err {
                    Error::TimeConversion {
                        data_field_header,
                        source,
                        ..
                    } => Error::TimeConversion {
                        data_field_header,
                        header: Some(Box::new(header)),
                        source,
                    },
                    err => err,
                },
            )?;

        debug!(
            apid = header.packet_identifier.apid,
            service = data_field_header.service_type,
            subservice = data_field_header.service_subtype,
            payload_len = payload.len(),
            "decoded packet"
        );

        Ok(CcsdsPacket {
            mission,
            mission_id,
            source_packet_header: header,
            data_field_header,
            payload: payload.to_vec(),
        })
    }

    /// Decode a packet given as hex text. Whitespace is ignored.
    ///
    /// # Errors
    /// [Error::Hex] for invalid hex, otherwise as [PacketDecoder::decode].
    pub fn decode_hex<M>(
        &self,
        text: &str,
        mission: M,
        t0: Option<DateTime<Utc>>,
    ) -> Result<CcsdsPacket>
    where
        M: Into<Mission>,
    {
        let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let buf = hex::decode(text)?;
        self.decode(&buf, mission, t0)
    }

    /// Decode many packets in parallel. Results are in the same order as `bufs` and a failure
    /// only affects its own packet.
    pub fn decode_all<B>(
        &self,
        bufs: &[B],
        mission: &Mission,
        t0: Option<DateTime<Utc>>,
    ) -> Vec<Result<CcsdsPacket>>
    where
        B: AsRef<[u8]> + Sync,
    {
        bufs.par_iter()
            .map(|buf| self.decode(buf.as_ref(), mission.clone(), t0))
            .collect()
    }

    fn check_length(&self, header: &SourcePacketHeader, actual: usize) -> Result<()> {
        if header.packet_length == actual {
            return Ok(());
        }
        match self.length_check {
            LengthCheck::Lenient => {
                warn!(
                    apid = header.packet_identifier.apid,
                    declared = header.packet_length,
                    actual,
                    "packet length does not match data"
                );
                Ok(())
            }
            LengthCheck::Strict => Err(Error::Consistency {
                declared: header.packet_length,
                actual,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{CorrelationError, SENTINEL_UTC};
    use crate::parse_t0;

    #[rustfmt::skip]
    const PACKET: [u8; 20] = [
        // packet id: version 0, TM, secondary header, apid 417
        0x09, 0xa1,
        // unsegmented, count 5
        0xc0, 0x05,
        // length - 1
        0x00, 0x09,
        // pus version 1, service 3, subservice 25, destination 0
        0x10, 0x03, 0x19, 0x00,
        // synchronized, coarse 500
        0x00, 0x00, 0x01, 0xf4,
        // fine 0
        0x00, 0x00,
        // payload
        0xde, 0xad, 0xbe, 0xef,
    ];

    struct OffsetClock;

    impl ClockCorrelation for OffsetClock {
        fn correlate(
            &self,
            mission_id: MissionId,
            sclk: &str,
        ) -> std::result::Result<f64, CorrelationError> {
            match mission_id {
                -121 => Ok(sclk.split('.').next().unwrap().parse::<f64>().unwrap()),
                id => Err(CorrelationError::UnknownMission(id)),
            }
        }

        fn to_calendar(
            &self,
            et: f64,
            _precision: usize,
        ) -> std::result::Result<String, CorrelationError> {
            Ok(format!("ET{et:.5}"))
        }
    }

    #[test]
    fn decode_packet() {
        let decoder = PacketDecoder::builder().build();
        let t0 = parse_t0("2020-01-01T00:00:00.000000Z").unwrap();
        let packet = decoder.decode(&PACKET, "juice", Some(t0)).unwrap();

        assert_eq!(packet.mission_id, Some(-29));
        assert_eq!(packet.source_packet_header.packet_length, 10);
        assert_eq!(packet.source_packet_header.sequence_control.sequence_count, 5);
        assert!(packet.source_packet_header.sequence_control.is_unsegmented());
        assert_eq!(packet.apid(), 417);
        assert_eq!(packet.source_packet_header.packet_identifier.process_id, 26);
        assert_eq!(packet.source_packet_header.packet_identifier.packet_category, 1);
        assert_eq!(packet.service_type(), 3);
        assert_eq!(packet.service_subtype(), 25);
        assert_eq!(
            packet.data_field_header.utc_time.as_deref(),
            Some("2020-01-01T00:08:20.000000Z")
        );
        assert_eq!(packet.payload, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            packet.timestamp().unwrap(),
            parse_t0("2020-01-01T00:08:20.000000Z").unwrap()
        );
    }

    #[test]
    fn unknown_mission_uses_sentinel_epoch() {
        let decoder = PacketDecoder::builder().build();
        let packet = decoder.decode(&PACKET, "rosetta", None).unwrap();

        assert_eq!(packet.mission_id, None);
        assert_eq!(
            packet.data_field_header.utc_time.as_deref(),
            Some("1970-01-01T00:08:20.000000Z")
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_mission_logs_warning() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let decoder = PacketDecoder::builder().build();

        tracing::subscriber::with_default(subscriber, || {
            decoder.decode(&PACKET, "rosetta", None).unwrap();
        });

        let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = out
            .lines()
            .find(|l| l.contains("unknown mission"))
            .expect("no unknown mission warning");
        assert!(line.contains("WARN"), "{line}");
        assert!(line.contains("rosetta"), "{line}");
    }

    #[test]
    fn unknown_mission_overrides_t0() {
        let decoder = PacketDecoder::builder().build();
        let t0 = parse_t0("2020-01-01T00:00:00.000000Z").unwrap();
        let packet = decoder.decode(&PACKET, "rosetta", Some(t0)).unwrap();

        assert_eq!(
            packet.data_field_header.utc_time.as_deref(),
            Some("1970-01-01T00:08:20.000000Z")
        );
    }

    #[test]
    fn unsynchronized_packet() {
        let decoder = PacketDecoder::builder().build();
        let mut dat = PACKET;
        dat[10] |= 0x80;
        let packet = decoder.decode(&dat, "juice", None).unwrap();

        assert!(!packet.data_field_header.time_synchronized);
        assert_eq!(
            packet.data_field_header.utc_time.as_deref(),
            Some(SENTINEL_UTC)
        );
        assert_eq!(packet.data_field_header.scet.coarse_time, 500);
    }

    #[test]
    fn ephemeris_strategy() {
        let decoder = PacketDecoder::builder().clock(Arc::new(OffsetClock)).build();
        let packet = decoder.decode(&PACKET, -121, None).unwrap();

        assert_eq!(packet.mission_id, Some(-121));
        assert_eq!(
            packet.data_field_header.utc_time.as_deref(),
            Some("ET500.00000Z")
        );
    }

    #[test]
    fn time_conversion_failure_keeps_header() {
        let decoder = PacketDecoder::builder().clock(Arc::new(OffsetClock)).build();

        match decoder.decode(&PACKET, "juice", None) {
            Err(Error::TimeConversion {
                data_field_header,
                header: Some(header),
                source: CorrelationError::UnknownMission(-29),
            }) => {
                assert_eq!(data_field_header.scet.coarse_time, 500);
                assert_eq!(data_field_header.service_type, 3);
                assert_eq!(data_field_header.service_subtype, 25);
                assert!(data_field_header.utc_time.is_none());
                assert_eq!(header.packet_identifier.apid, 417);
                assert_eq!(header.packet_length, 10);
            }
            other => panic!("expected TimeConversion, got {other:?}"),
        }
    }

    #[test]
    fn short_buffers() {
        let decoder = PacketDecoder::builder().build();
        for len in 0..PacketDecoder::MIN_LEN {
            match decoder.decode(&PACKET[..len], "juice", None) {
                Err(Error::BufferTooShort {
                    required_bits,
                    available_bits,
                    ..
                }) => {
                    assert_eq!(required_bits, 128);
                    assert_eq!(available_bits, len * 8);
                }
                other => panic!("len={len}: expected BufferTooShort, got {other:?}"),
            }
        }
    }

    #[test]
    fn strict_length_check() {
        let decoder = PacketDecoder::builder()
            .length_check(LengthCheck::Strict)
            .build();
        let t0 = Some(sentinel_epoch());

        assert!(matches!(
            decoder.decode(&PACKET, "juice", t0),
            Err(Error::Consistency {
                declared: 10,
                actual: 14
            })
        ));

        let mut dat = PACKET;
        dat[5] = 13;
        assert!(decoder.decode(&dat, "juice", t0).is_ok());
    }

    #[test]
    fn display() {
        let decoder = PacketDecoder::builder().build();
        let packet = decoder.decode(&PACKET, "bepicolombo", Some(sentinel_epoch())).unwrap();

        assert_eq!(
            packet.to_string(),
            "Bepicolombo - APID: 417 - TM(3,25) - Data: deadbeef"
        );
    }

    #[test]
    fn decode_hex_input() {
        let decoder = PacketDecoder::builder().build();
        let text = hex::encode(PACKET);
        let packet = decoder.decode_hex(&text, "juice", Some(sentinel_epoch())).unwrap();
        assert_eq!(packet.apid(), 417);

        assert!(matches!(
            decoder.decode_hex("zz", "juice", None),
            Err(Error::Hex(_))
        ));
    }

    #[test]
    fn decode_all_preserves_order() {
        let decoder = PacketDecoder::builder().build();
        let mut second = PACKET.to_vec();
        second[1] = 0xa2;
        let bufs = vec![PACKET.to_vec(), vec![0u8; 3], second];

        let zults = decoder.decode_all(&bufs, &Mission::from("juice"), Some(sentinel_epoch()));

        assert_eq!(zults.len(), 3);
        assert_eq!(zults[0].as_ref().unwrap().apid(), 417);
        assert!(matches!(zults[1], Err(Error::BufferTooShort { .. })));
        assert_eq!(zults[2].as_ref().unwrap().apid(), 418);
    }
}
