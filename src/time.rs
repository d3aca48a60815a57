//! SCET to UTC resolution.
//!
//! Two strategies are available, chosen per packet by [TimeResolver::select]:
//!
//! * **Linear offset**: a caller supplied reference epoch `t0` plus the elapsed SCET. Fully
//!   deterministic.
//! * **Ephemeris**: onboard clock correlation through a [ClockCorrelation] service, e.g., an
//!   [SclkKernel]. This is the only strategy that may fail or block.
mod ephemeris;
mod leapsecs;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::missions::MissionId;
use crate::pus::Scet;

pub use ephemeris::{ClockCorrelation, ClockModel, CorrelationError, Partition, SclkKernel};
pub use leapsecs::LeapSeconds;

/// UTC reported for packets without a synchronized onboard clock.
pub const SENTINEL_UTC: &str = "1970-01-01T00:00:00.00000Z";

/// Number of sub-second digits requested from an ephemeris service.
pub const EPHEMERIS_PRECISION: usize = 5;

const EPOCH_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const LINEAR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Reference epoch used when no usable mission is available.
#[must_use]
pub fn sentinel_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Parse a reference epoch such as `2024-01-01T00:00:00.000000Z`.
///
/// # Errors
/// [crate::Error::Epoch] if `s` does not match the expected format.
pub fn parse_t0(s: &str) -> crate::Result<DateTime<Utc>> {
    Ok(NaiveDateTime::parse_from_str(s.trim(), EPOCH_FORMAT)?.and_utc())
}

/// Strategy for converting a [Scet] to UTC text.
#[derive(Clone, Copy)]
pub enum TimeResolver<'a> {
    /// Correlate through an external clock service.
    Ephemeris {
        mission_id: Option<MissionId>,
        clock: Option<&'a dyn ClockCorrelation>,
    },
    /// Add the elapsed SCET to a reference epoch.
    LinearOffset { t0: DateTime<Utc> },
}

impl<'a> TimeResolver<'a> {
    /// A reference epoch always wins; without one the ephemeris service is used.
    #[must_use]
    pub fn select(
        mission_id: Option<MissionId>,
        t0: Option<DateTime<Utc>>,
        clock: Option<&'a dyn ClockCorrelation>,
    ) -> Self {
        match t0 {
            Some(t0) => TimeResolver::LinearOffset { t0 },
            None => TimeResolver::Ephemeris { mission_id, clock },
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TimeResolver::Ephemeris { .. } => "ephemeris",
            TimeResolver::LinearOffset { .. } => "linear-offset",
        }
    }

    /// Convert `scet` to an ISO-8601 UTC string ending in `Z`.
    ///
    /// Linear offsets are rendered with microseconds, ephemeris times with
    /// [EPHEMERIS_PRECISION] digits.
    ///
    /// # Errors
    /// Any [CorrelationError] from the ephemeris service, or if it is missing.
    pub fn resolve(&self, scet: &Scet) -> Result<String, CorrelationError> {
        match *self {
            TimeResolver::LinearOffset { t0 } => {
                let utc = t0
                    .checked_add_signed(scet.elapsed())
                    .ok_or(CorrelationError::Overflow)?;
                Ok(utc.format(LINEAR_FORMAT).to_string())
            }
            TimeResolver::Ephemeris { mission_id, clock } => {
                let mission_id = mission_id.ok_or(CorrelationError::NoMission)?;
                let clock = clock.ok_or(CorrelationError::NoService)?;
                let et = clock.correlate(mission_id, &scet.to_string())?;
                let calendar = clock.to_calendar(et, EPHEMERIS_PRECISION)?;
                Ok(calendar + "Z")
            }
        }
    }
}

impl std::fmt::Debug for TimeResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeResolver::Ephemeris { mission_id, clock } => f
                .debug_struct("Ephemeris")
                .field("mission_id", mission_id)
                .field("clock", &clock.is_some())
                .finish(),
            TimeResolver::LinearOffset { t0 } => {
                f.debug_struct("LinearOffset").field("t0", t0).finish()
            }
        }
    }
}
