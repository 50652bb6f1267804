//! Timestamp normalization and interval arithmetic.
//!
//! Raw feed timestamps such as `"Jan 05, 10:15 AM"` carry no year. A
//! [`TimestampFormat`] appends its assumed year before parsing, so the year is
//! an explicit configuration value rather than something inferred from data.
//!
//! Grid rounding is measured from the Unix epoch and breaks ties half to
//! even: a timestamp exactly between two boundaries rounds to the boundary
//! whose multiple of the interval is even.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::PrepError;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Fixed spacing of the canonical grid, in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    seconds: i64,
}

impl Interval {
    pub fn from_secs(seconds: i64) -> Result<Self, PrepError> {
        if seconds <= 0 {
            return Err(PrepError::InvalidParameter(format!(
                "interval must be positive, got {}s",
                seconds
            )));
        }
        Ok(Self { seconds })
    }

    pub fn from_minutes(minutes: i64) -> Result<Self, PrepError> {
        Self::from_secs(minutes.saturating_mul(60))
    }

    pub fn as_secs(self) -> i64 {
        self.seconds
    }

    pub fn as_duration(self) -> Duration {
        Duration::seconds(self.seconds)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self { seconds: 300 }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}min", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

impl FromStr for Interval {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_interval_token(s)
    }
}

impl TryFrom<String> for Interval {
    type Error = PrepError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_interval_token(&value)
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

/// Parse an interval token like `5min`, `30s`, `1h`, `2d` or bare seconds (`300`).
pub fn parse_interval_token(token: &str) -> Result<Interval, PrepError> {
    let trimmed = token.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let invalid = || PrepError::InvalidParameter(format!("invalid interval '{}'", token));
    let value: i64 = digits.parse().map_err(|_| invalid())?;
    let scale = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "t" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        _ => return Err(invalid()),
    };
    Interval::from_secs(value.checked_mul(scale).ok_or_else(invalid)?)
}

/// Round `ts` to the nearest multiple of `interval`, ties to even.
pub fn round_to_interval(ts: NaiveDateTime, interval: Interval) -> NaiveDateTime {
    let step = i128::from(interval.as_secs()) * NANOS_PER_SEC;
    let utc = ts.and_utc();
    let total =
        i128::from(utc.timestamp()) * NANOS_PER_SEC + i128::from(utc.timestamp_subsec_nanos());
    let floor = total.div_euclid(step);
    let rem = total.rem_euclid(step);
    let multiple = match (rem * 2).cmp(&step) {
        Ordering::Less => floor,
        Ordering::Greater => floor + 1,
        Ordering::Equal if floor.rem_euclid(2) == 0 => floor,
        Ordering::Equal => floor + 1,
    };
    let rounded = multiple * step;
    let secs = rounded.div_euclid(NANOS_PER_SEC) as i64;
    let nanos = rounded.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .unwrap_or(ts)
}

/// How raw timestamp text is turned into a date-time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimestampFormat {
    /// chrono format of the raw text, without the year.
    pub format: String,
    /// Year appended to the raw text before parsing. `None` parses the raw
    /// text with `format` unchanged, for feeds that already carry a year.
    pub assumed_year: Option<i32>,
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self {
            format: "%b %d, %I:%M %p".to_string(),
            assumed_year: Some(2023),
        }
    }
}

impl TimestampFormat {
    /// Format actually handed to chrono.
    pub fn effective_format(&self) -> String {
        match self.assumed_year {
            Some(_) => format!("{}, %Y", self.format),
            None => self.format.clone(),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        match self.assumed_year {
            Some(year) => {
                let normalized = format!("{}, {}", raw.trim(), year);
                NaiveDateTime::parse_from_str(&normalized, &self.effective_format())
            }
            None => NaiveDateTime::parse_from_str(raw.trim(), &self.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn interval_tokens() {
        assert_eq!(parse_interval_token("5min").unwrap().as_secs(), 300);
        assert_eq!(parse_interval_token("5T").unwrap().as_secs(), 300);
        assert_eq!(parse_interval_token(" 30s ").unwrap().as_secs(), 30);
        assert_eq!(parse_interval_token("1h").unwrap().as_secs(), 3_600);
        assert_eq!(parse_interval_token("900").unwrap().as_secs(), 900);
        assert!(parse_interval_token("0min").is_err());
        assert!(parse_interval_token("min").is_err());
        assert!(parse_interval_token("5 fortnights").is_err());
    }

    #[test]
    fn interval_display_round_trips() {
        for token in ["5min", "30s", "2h", "1d", "90s"] {
            let interval: Interval = token.parse().unwrap();
            assert_eq!(interval.to_string(), token);
        }
    }

    #[test]
    fn rounds_to_nearest_boundary() {
        let five = Interval::from_minutes(5).unwrap();
        assert_eq!(round_to_interval(at(10, 0, 0), five), at(10, 0, 0));
        assert_eq!(round_to_interval(at(10, 2, 0), five), at(10, 0, 0));
        assert_eq!(round_to_interval(at(10, 3, 0), five), at(10, 5, 0));
        assert_eq!(round_to_interval(at(10, 4, 59), five), at(10, 5, 0));
    }

    #[test]
    fn ties_round_half_to_even() {
        // 2023-01-01 10:00 is an even multiple of 5 minutes since the epoch.
        let five = Interval::from_minutes(5).unwrap();
        assert_eq!(round_to_interval(at(10, 2, 30), five), at(10, 0, 0));
        assert_eq!(round_to_interval(at(10, 7, 30), five), at(10, 10, 0));
        assert_eq!(round_to_interval(at(10, 12, 30), five), at(10, 10, 0));
    }

    #[test]
    fn parses_with_assumed_year() {
        let fmt = TimestampFormat::default();
        assert_eq!(fmt.parse("Jan 01, 10:05 AM").unwrap(), at(10, 5, 0));
        assert_eq!(fmt.parse(" Jan 01, 12:30 PM ").unwrap(), at(12, 30, 0));
        assert!(fmt.parse("2023-01-01 10:05").is_err());

        let leap = TimestampFormat {
            assumed_year: Some(2024),
            ..TimestampFormat::default()
        };
        assert!(leap.parse("Feb 29, 01:00 AM").is_ok());
        assert!(fmt.parse("Feb 29, 01:00 AM").is_err());
    }

    #[test]
    fn parses_without_assumed_year() {
        let fmt = TimestampFormat {
            format: "%Y-%m-%d %H:%M:%S".to_string(),
            assumed_year: None,
        };
        assert_eq!(fmt.parse("2023-01-01 10:05:00").unwrap(), at(10, 5, 0));
    }
}
