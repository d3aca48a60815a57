use std::{fs, path::Path};

use chrono::{DateTime, FixedOffset, Utc};

use super::CorrelationError;

const IERS_LEAP_SECONDS: &str = include_str!("leap_seconds.dat");

/// TAI - UTC table in the IERS `Leap_Second.dat` format.
///
/// See <https://hpiers.obspm.fr/iers/bul/bulc/Leap_Second.dat>.
#[derive(Clone, Debug)]
pub struct LeapSeconds {
    expiration: Option<DateTime<Utc>>,
    leaps: Vec<i32>,
    /// UTC unix seconds at which each entry in `leaps` takes effect
    utc: Vec<i64>,
    /// Same as `utc`, on the TAI scale
    tai: Vec<i64>,
}

impl Default for LeapSeconds {
    fn default() -> Self {
        Self::from_iers_str(IERS_LEAP_SECONDS).expect("built-in leap second table is not valid")
    }
}

impl LeapSeconds {
    /// Parse IERS `Leap_Second.dat` content.
    ///
    /// # Errors
    /// If a record cannot be parsed or consecutive records are not exactly 1s apart.
    pub fn from_iers_str(content: &str) -> crate::Result<Self> {
        let mut table = LeapSeconds {
            expiration: None,
            leaps: Vec::new(),
            utc: Vec::new(),
            tai: Vec::new(),
        };

        for (lineno, line) in content.lines().enumerate().map(|(i, z)| (i + 1, z)) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if table.expiration.is_none() {
                    table.expiration = Self::parse_expiration(line);
                }
                continue;
            }

            let (timestamp, leaps) = Self::parse_record(line)
                .map_err(|err| invalid(format!("invalid record at line={lineno}: {err}")))?;
            if let Some(prev) = table.leaps.last() {
                if leaps - prev != 1 {
                    return Err(invalid(format!(
                        "records more that 1s apart at line={lineno}"
                    )));
                }
            }
            table.leaps.push(leaps);
            table.utc.push(timestamp);
            table.tai.push(timestamp + i64::from(leaps));
        }

        if table.leaps.is_empty() {
            return Err(invalid("no leap second records".to_string()));
        }
        Ok(table)
    }

    /// Read an IERS `Leap_Second.dat` file.
    ///
    /// # Errors
    /// If the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Self::from_iers_str(&fs::read_to_string(path)?)
    }

    /// Expiration date declared by the table, if any.
    #[must_use]
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    fn parse_expiration(line: &str) -> Option<DateTime<Utc>> {
        let (_, date) = line.split_once("File expires on ")?;
        let timestr = format!("{} 00:00:00 +0000", date.trim());
        DateTime::parse_from_str(&timestr, "%d %B %Y %H:%M:%S %z")
            .ok()
            .map(Into::into)
    }

    /// Parse out UTC timestamp from date and TAI-UTC seconds.
    fn parse_record(line: &str) -> std::result::Result<(i64, i32), String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return Err("not enough components".to_string());
        }

        let timestr = format!("{}-{:0>2}-{:0>2}T00:00:00Z", parts[3], parts[2], parts[1]);
        let dt: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(&timestr)
            .map_err(|_| "failed to parse date string".to_string())?;
        let leaps = parts[4]
            .parse::<i32>()
            .map_err(|_| format!("failed to parse leap secs {}", parts[4]))?;

        Ok((dt.timestamp(), leaps))
    }

    fn find_leaps(times: &[i64], time: f64) -> Result<usize, CorrelationError> {
        times
            .iter()
            .rposition(|t| time >= *t as f64)
            .ok_or(CorrelationError::LeapSecondRange)
    }

    /// TAI - UTC in seconds at the UTC unix time `utc`.
    ///
    /// # Errors
    /// [CorrelationError::LeapSecondRange] for times before the first record.
    pub fn leaps_utc(&self, utc: f64) -> Result<i32, CorrelationError> {
        Ok(self.leaps[Self::find_leaps(&self.utc, utc)?])
    }

    /// TAI - UTC in seconds at `tai`, given as seconds since 1970-01-01 on the TAI scale.
    ///
    /// # Errors
    /// [CorrelationError::LeapSecondRange] for times before the first record.
    pub fn leaps_tai(&self, tai: f64) -> Result<i32, CorrelationError> {
        Ok(self.leaps[Self::find_leaps(&self.tai, tai)?])
    }

    /// True when `tai` falls inside an inserted leap second, where UTC reads `23:59:60`.
    #[must_use]
    pub fn in_leap_second(&self, tai: f64) -> bool {
        (1..self.tai.len()).any(|i| {
            let inserted = f64::from(self.leaps[i] - self.leaps[i - 1]);
            let end = self.tai[i] as f64;
            inserted > 0.0 && tai >= end - inserted && tai < end
        })
    }
}

fn invalid(msg: String) -> crate::Error {
    crate::Error::LeapSecondTable(msg)
}
