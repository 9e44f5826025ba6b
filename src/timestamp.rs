//! Fixed-width `YYYY-MM-DD HH:MM:SS` line prefixes and their epoch values
use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{LogSearchError, Result};

/// Width of the timestamp prefix every log line starts with.
pub const PREFIX_LEN: usize = 19;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Zone the line timestamps are written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    Fixed(FixedOffset),
    #[default]
    Local,
}

impl FromStr for Zone {
    type Err = LogSearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "local" | "Local" => Ok(Zone::Local),
            "UTC" | "utc" | "Z" => Ok(Zone::Fixed(utc_offset())),
            other => {
                let (sign, rest) = match other.as_bytes().first() {
                    Some(b'+') => (1, &other[1..]),
                    Some(b'-') => (-1, &other[1..]),
                    _ => return Err(LogSearchError::Config(format!("Invalid timezone: {s}"))),
                };
                let (h, m) = rest
                    .split_once(':')
                    .ok_or_else(|| LogSearchError::Config(format!("Invalid timezone: {s}")))?;
                let hours: i32 = h
                    .parse()
                    .map_err(|_| LogSearchError::Config(format!("Invalid timezone: {s}")))?;
                let minutes: i32 = m
                    .parse()
                    .map_err(|_| LogSearchError::Config(format!("Invalid timezone: {s}")))?;
                FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
                    .map(Zone::Fixed)
                    .ok_or_else(|| LogSearchError::Config(format!("Invalid timezone: {s}")))
            }
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => write!(f, "local"),
            Zone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Converts between line prefixes and epoch milliseconds.
///
/// Because the prefix is fixed width and zero padded, lexicographic order of
/// lines equals chronological order, which is what the result merge relies on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCodec {
    zone: Zone,
}

impl TimestampCodec {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }

    pub fn utc() -> Self {
        Self::new(Zone::Fixed(utc_offset()))
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Parse the first 19 bytes of `line`.
    ///
    /// Returns `None` for short lines, non-digit fields, wrong separators and
    /// impossible calendar values. A `None` means the line carries no usable
    /// timestamp and must be left out of time-filtered results.
    pub fn parse(&self, line: &str) -> Option<i64> {
        let b = line.as_bytes().get(..PREFIX_LEN)?;

        if b[4] != b'-' || b[7] != b'-' || b[10] != b' ' || b[13] != b':' || b[16] != b':' {
            return None;
        }

        let year = digits(&b[0..4])? as i32;
        let month = digits(&b[5..7])?;
        let day = digits(&b[8..10])?;
        let hour = digits(&b[11..13])?;
        let minute = digits(&b[14..16])?;
        let second = digits(&b[17..19])?;

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;
        self.to_epoch_ms(NaiveDateTime::new(date, time))
    }

    /// Render `epoch_ms` as a line prefix, truncating sub-second precision.
    pub fn format(&self, epoch_ms: i64) -> Option<String> {
        let utc = Utc.timestamp_millis_opt(epoch_ms).single()?;
        let rendered = match self.zone {
            Zone::Fixed(offset) => utc.with_timezone(&offset).format(FORMAT).to_string(),
            Zone::Local => utc.with_timezone(&Local).format(FORMAT).to_string(),
        };
        Some(rendered)
    }

    /// Parse a request boundary such as `2024-01-31 08:59:55`.
    pub fn parse_bound(&self, text: &str) -> Result<i64> {
        let trimmed = text.trim();
        if trimmed.len() != PREFIX_LEN {
            return Err(LogSearchError::InvalidTimestamp(text.to_string()));
        }
        self.parse(trimmed)
            .ok_or_else(|| LogSearchError::InvalidTimestamp(text.to_string()))
    }

    fn to_epoch_ms(&self, naive: NaiveDateTime) -> Option<i64> {
        match self.zone {
            Zone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.timestamp_millis()),
            Zone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.timestamp_millis()),
        }
    }
}

fn digits(field: &[u8]) -> Option<u32> {
    field.iter().try_fold(0u32, |acc, &c| {
        c.is_ascii_digit().then(|| acc * 10 + u32::from(c - b'0'))
    })
}
