//! Packet Utilization Standard (PUS) Data Field Header.
use std::fmt::Display;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::trace;

use crate::bits::unpack;
use crate::missions::MissionId;
use crate::time::{ClockCorrelation, TimeResolver, SENTINEL_UTC};
use crate::{Error, Result};

/// Spacecraft Elapsed Time as carried in the data field header.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Scet {
    /// Whole seconds, 31 bits.
    pub coarse_time: u32,
    /// Sub-second fraction in units of 2^-16 seconds.
    pub fine_time: u16,
}

impl Scet {
    pub const FINE_TICKS_PER_SECOND: u32 = 1 << 16;

    /// Elapsed time rounded to the nearest microsecond, ties to even.
    #[must_use]
    pub fn elapsed(&self) -> TimeDelta {
        // fine * 1e6 / 2^16 == fine * 15625 / 1024
        let num = u64::from(self.fine_time) * 15_625;
        let mut micros = num / 1024;
        let rem = num % 1024;
        if rem > 512 || (rem == 512 && micros % 2 == 1) {
            micros += 1;
        }
        TimeDelta::seconds(i64::from(self.coarse_time)) + TimeDelta::microseconds(micros as i64)
    }
}

impl Display for Scet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.coarse_time, self.fine_time)
    }
}

/// PUS telemetry Data Field Header (80 bits).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DataFieldHeader {
    pub pus_version: u8,
    pub service_type: u8,
    pub service_subtype: u8,
    pub destination_id: u8,
    /// True when the onboard clock was correlated when the packet was generated (bit value 0).
    pub time_synchronized: bool,
    pub scet: Scet,
    /// ISO-8601 UTC time with a trailing `Z`. `None` only in the header carried by
    /// [Error::TimeConversion].
    pub utc_time: Option<String>,
}

impl DataFieldHeader {
    pub const LEN: usize = 10;
    // spare, version, spare, type, subtype, destination, sync, coarse, fine
    const WIDTHS: [u8; 9] = [1, 3, 4, 8, 8, 8, 1, 31, 16];

    /// Decode the header from the first 10 bytes of `buf`, resolving the SCET to UTC.
    ///
    /// Unsynchronized packets get [SENTINEL_UTC] without consulting any resolver. Otherwise
    /// `t0` selects the linear offset strategy and its absence selects the ephemeris strategy
    /// using `mission_id` and `clock`.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if `buf` has fewer than 10 bytes, or [Error::TimeConversion]
    /// if the ephemeris strategy cannot resolve the SCET.
    pub fn decode(
        buf: &[u8],
        mission_id: Option<MissionId>,
        t0: Option<DateTime<Utc>>,
        clock: Option<&dyn ClockCorrelation>,
    ) -> Result<Self> {
        let [_, pus_version, _, service_type, service_subtype, destination_id, sync, coarse_time, fine_time] =
            unpack(buf, Self::WIDTHS, "data field header")?;

        let scet = Scet {
            coarse_time: coarse_time as u32,
            fine_time: fine_time as u16,
        };
        let mut dfh = DataFieldHeader {
            pus_version: pus_version as u8,
            service_type: service_type as u8,
            service_subtype: service_subtype as u8,
            destination_id: destination_id as u8,
            time_synchronized: sync == 0,
            scet,
            utc_time: None,
        };

        if dfh.time_synchronized {
            let resolver = TimeResolver::select(mission_id, t0, clock);
            trace!(%scet, strategy = resolver.name(), "resolving scet");
            match resolver.resolve(&scet) {
                Ok(utc) => dfh.utc_time = Some(utc),
                Err(source) => {
                    return Err(Error::TimeConversion {
                        data_field_header: Box::new(dfh),
                        header: None,
                        source,
                    })
                }
            }
        } else {
            trace!(%scet, "time not synchronized, using sentinel");
            dfh.utc_time = Some(SENTINEL_UTC.to_string());
        }

        Ok(dfh)
    }
}
