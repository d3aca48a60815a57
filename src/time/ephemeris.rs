use std::{collections::HashMap, fs::File, path::Path};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::leapsecs::LeapSeconds;
use crate::missions::MissionId;

/// Seconds from the Unix epoch to J2000 (2000-01-01T12:00:00)
const J2000_UNIX_SECS: f64 = 946_728_000.0;
/// TT - TAI in seconds
const TT_TAI_SECS: f64 = 32.184;
const MAX_PRECISION: usize = 9;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum CorrelationError {
    #[error("no clock correlation for mission {0}")]
    UnknownMission(MissionId),
    #[error("no mission identifier available for clock correlation")]
    NoMission,
    #[error("no clock correlation service configured")]
    NoService,
    #[error("invalid spacecraft clock string: {0}")]
    InvalidSclk(String),
    #[error("spacecraft clock {sclk} is outside the kernel coverage for mission {mission_id}")]
    OutOfRange { mission_id: MissionId, sclk: String },
    #[error("time is outside the leap second table")]
    LeapSecondRange,
    #[error("time overflow")]
    Overflow,
}

/// External onboard-clock correlation service.
///
/// Implementations may be slow (file or network backed). They are shared across threads
/// during batch decoding.
pub trait ClockCorrelation: Send + Sync {
    /// Convert a spacecraft clock string of the form `coarse.fine` for `mission_id` into
    /// ephemeris time, i.e., TDB seconds past J2000.
    fn correlate(&self, mission_id: MissionId, sclk: &str) -> Result<f64, CorrelationError>;

    /// Render ephemeris time `et` as ISO calendar UTC (`YYYY-MM-DDTHH:MM:SS.fff`) with
    /// `precision` fractional digits and no zone suffix.
    fn to_calendar(&self, et: f64, precision: usize) -> Result<String, CorrelationError>;
}

/// Linear segment of a spacecraft clock correlation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Partition {
    /// First spacecraft clock second covered, inclusive.
    pub sclk_start: f64,
    /// Last spacecraft clock second covered, exclusive.
    pub sclk_end: f64,
    /// Ephemeris time at `sclk_start`.
    pub et_start: f64,
    /// Ephemeris seconds per spacecraft clock second.
    #[serde(default = "default_rate")]
    pub rate: f64,
}

fn default_rate() -> f64 {
    1.0
}

fn default_fine_ticks() -> u32 {
    1 << 16
}

/// Clock correlation data for one spacecraft clock.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClockModel {
    pub id: MissionId,
    /// Fine clock ticks per coarse second.
    #[serde(default = "default_fine_ticks")]
    pub fine_ticks_per_second: u32,
    pub partitions: Vec<Partition>,
}

impl ClockModel {
    fn et(&self, sclk_secs: f64) -> Option<f64> {
        self.partitions
            .iter()
            .find(|p| sclk_secs >= p.sclk_start && sclk_secs < p.sclk_end)
            .map(|p| p.et_start + (sclk_secs - p.sclk_start) * p.rate)
    }
}

#[derive(Deserialize)]
struct KernelFile {
    clocks: Vec<ClockModel>,
}

/// Table driven [ClockCorrelation] service.
///
/// Holds piecewise linear spacecraft clock models keyed by mission clock id and a leap second
/// table to go from ephemeris time to UTC. TDB is treated as TT; the periodic TDB-TT term
/// (< 2ms) is ignored.
///
/// # Example
/// ```
/// use ccsds_pus::time::{ClockCorrelation, ClockModel, LeapSeconds, Partition, SclkKernel};
///
/// let mut kernel = SclkKernel::new(LeapSeconds::default());
/// kernel.insert(ClockModel {
///     id: -121,
///     fine_ticks_per_second: 65536,
///     partitions: vec![Partition { sclk_start: 0.0, sclk_end: 1e9, et_start: 0.0, rate: 1.0 }],
/// });
///
/// let et = kernel.correlate(-121, "0.0").unwrap();
/// assert_eq!(kernel.to_calendar(et, 3).unwrap(), "2000-01-01T11:58:55.816");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SclkKernel {
    clocks: HashMap<MissionId, ClockModel>,
    leapsecs: LeapSeconds,
}

impl SclkKernel {
    pub fn new(leapsecs: LeapSeconds) -> Self {
        Self {
            clocks: HashMap::default(),
            leapsecs,
        }
    }

    /// Load clock models from JSON of the form `{"clocks": [ClockModel, ...]}`.
    ///
    /// # Errors
    /// If `content` is not a valid kernel document.
    pub fn from_json(content: &str, leapsecs: LeapSeconds) -> crate::Result<Self> {
        let file: KernelFile = serde_json::from_str(content)?;
        Ok(Self::from_clocks(file.clocks, leapsecs))
    }

    /// Load clock models from a JSON file. See [SclkKernel::from_json].
    ///
    /// # Errors
    /// If the file cannot be read or is not a valid kernel document.
    pub fn with_file<P: AsRef<Path>>(path: P, leapsecs: LeapSeconds) -> crate::Result<Self> {
        let file: KernelFile = serde_json::from_reader(File::open(path)?)?;
        Ok(Self::from_clocks(file.clocks, leapsecs))
    }

    fn from_clocks(clocks: Vec<ClockModel>, leapsecs: LeapSeconds) -> Self {
        let mut kernel = Self::new(leapsecs);
        for clock in clocks {
            kernel.insert(clock);
        }
        kernel
    }

    /// Add or replace the clock model for `clock.id`.
    pub fn insert(&mut self, clock: ClockModel) {
        debug!(id = clock.id, partitions = clock.partitions.len(), "loaded clock model");
        self.clocks.insert(clock.id, clock);
    }

    fn parse_sclk(sclk: &str, fine_ticks: u32) -> Result<f64, CorrelationError> {
        let invalid = || CorrelationError::InvalidSclk(sclk.to_string());
        let (coarse, fine) = sclk.split_once('.').ok_or_else(invalid)?;
        let coarse: u64 = coarse.trim().parse().map_err(|_| invalid())?;
        let fine: u64 = fine.trim().parse().map_err(|_| invalid())?;
        if fine >= u64::from(fine_ticks) {
            return Err(invalid());
        }
        Ok(coarse as f64 + fine as f64 / f64::from(fine_ticks))
    }
}

impl ClockCorrelation for SclkKernel {
    fn correlate(&self, mission_id: MissionId, sclk: &str) -> Result<f64, CorrelationError> {
        let clock = self
            .clocks
            .get(&mission_id)
            .ok_or(CorrelationError::UnknownMission(mission_id))?;
        let sclk_secs = Self::parse_sclk(sclk, clock.fine_ticks_per_second)?;
        clock.et(sclk_secs).ok_or_else(|| CorrelationError::OutOfRange {
            mission_id,
            sclk: sclk.to_string(),
        })
    }

    fn to_calendar(&self, et: f64, precision: usize) -> Result<String, CorrelationError> {
        let precision = precision.min(MAX_PRECISION);
        let tai = J2000_UNIX_SECS + et - TT_TAI_SECS;
        let leaps = self.leapsecs.leaps_tai(tai)?;
        // During an inserted leap second UTC is held on the preceding second and
        // rendered as :60.
        let in_leap = self.leapsecs.in_leap_second(tai);
        let utc = if in_leap {
            tai - f64::from(leaps) - 1.0
        } else {
            tai - f64::from(leaps)
        };

        let scale = 10i64.pow(precision as u32);
        let ticks = (utc * scale as f64).round();
        if !ticks.is_finite() || ticks.abs() >= i64::MAX as f64 {
            return Err(CorrelationError::Overflow);
        }
        let ticks = ticks as i64;
        let secs = ticks.div_euclid(scale);
        let frac = ticks.rem_euclid(scale);

        let dt = DateTime::from_timestamp(secs, 0).ok_or(CorrelationError::Overflow)?;
        // Rounding may carry out of the leap second into the next day.
        let whole = if in_leap && secs == utc.floor() as i64 {
            format!("{}60", dt.format("%Y-%m-%dT%H:%M:"))
        } else {
            dt.format("%Y-%m-%dT%H:%M:%S").to_string()
        };
        if precision == 0 {
            Ok(whole.to_string())
        } else {
            Ok(format!("{whole}.{frac:0precision$}"))
        }
    }
}
