//! MS-DOS timestamp handling.
//!
//! This module provides the [`Timestamp`] type for working with entry
//! timestamps stored in ZIP archives. The ZIP format stores modification
//! times as 16-bit MS-DOS date and time words:
//!
//! - date: bits 0-4 day (1-31), bits 5-8 month (1-12), bits 9-15 years since 1980
//! - time: bits 0-4 seconds/2 (0-29), bits 5-10 minute (0-59), bits 11-15 hour (0-23)
//!
//! # Precision
//!
//! DOS timestamps have 2-second resolution and cover 1980-01-01 through
//! 2107-12-31. Conversions from [`SystemTime`] truncate seconds to the
//! nearest even value and clamp out-of-range dates to the representable
//! bounds.
//!
//! # Example
//!
//! ```rust
//! use zipkit::Timestamp;
//!
//! let ts = Timestamp::from_date_and_time(2018, 8, 15, 20, 45, 6).unwrap();
//! assert_eq!(ts.year(), 2018);
//! assert_eq!(ts.second(), 6);
//!
//! // Round-trips through the raw DOS representation
//! let raw = Timestamp::from_dos(ts.dos_date(), ts.dos_time());
//! assert_eq!(raw, ts);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix timestamp of the DOS epoch, 1980-01-01 00:00:00 UTC.
const DOS_EPOCH_UNIX_SECS: u64 = 315_532_800;

/// A ZIP entry timestamp with MS-DOS 2-second precision.
///
/// The default value is the DOS epoch (1980-01-01 00:00:00), which is what
/// ZIP tools conventionally write when no timestamp is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    dos_date: u16,
    dos_time: u16,
}

impl Timestamp {
    /// Creates a timestamp from raw DOS date and time words.
    ///
    /// No validation is performed; out-of-range fields are preserved
    /// bit-for-bit, matching how other ZIP tools treat them.
    #[inline]
    pub const fn from_dos(dos_date: u16, dos_time: u16) -> Self {
        Self { dos_date, dos_time }
    }

    /// Creates a timestamp from calendar components.
    ///
    /// Returns `None` when a component is outside the representable range
    /// (years 1980-2107). Seconds are truncated to 2-second resolution.
    pub fn from_date_and_time(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        let dos_date = ((year - 1980) << 9) | ((month as u16) << 5) | day as u16;
        let dos_time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2);
        Some(Self { dos_date, dos_time })
    }

    /// Creates a timestamp from a [`SystemTime`].
    ///
    /// Times before the DOS epoch clamp to 1980-01-01; times after
    /// 2107-12-31 clamp to the maximum representable value.
    pub fn from_system_time(time: SystemTime) -> Self {
        let unix_secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs(),
            Err(_) => return Self::default(),
        };
        if unix_secs < DOS_EPOCH_UNIX_SECS {
            return Self::default();
        }
        let secs_since_epoch = unix_secs - DOS_EPOCH_UNIX_SECS;
        let days = secs_since_epoch / 86_400;
        let (year, month, day) = civil_from_days(days as i64);
        if year > 2107 {
            // Saturate rather than wrap
            return Self::from_dos(0xFF9F, 0xBF7D);
        }
        let rem = secs_since_epoch % 86_400;
        let hour = (rem / 3600) as u8;
        let minute = ((rem % 3600) / 60) as u8;
        let second = (rem % 60) as u8;
        // Components are in range by construction
        Self::from_date_and_time(year as u16, month, day, hour, minute, second)
            .unwrap_or_default()
    }

    /// Returns the current time as a DOS timestamp.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Returns the raw DOS date word.
    #[inline]
    pub const fn dos_date(&self) -> u16 {
        self.dos_date
    }

    /// Returns the raw DOS time word.
    #[inline]
    pub const fn dos_time(&self) -> u16 {
        self.dos_time
    }

    /// Returns the calendar year (1980-2107).
    #[inline]
    pub const fn year(&self) -> u16 {
        (self.dos_date >> 9) + 1980
    }

    /// Returns the month (1-12 for well-formed timestamps).
    #[inline]
    pub const fn month(&self) -> u8 {
        ((self.dos_date >> 5) & 0x0F) as u8
    }

    /// Returns the day of month (1-31 for well-formed timestamps).
    #[inline]
    pub const fn day(&self) -> u8 {
        (self.dos_date & 0x1F) as u8
    }

    /// Returns the hour (0-23 for well-formed timestamps).
    #[inline]
    pub const fn hour(&self) -> u8 {
        (self.dos_time >> 11) as u8
    }

    /// Returns the minute (0-59 for well-formed timestamps).
    #[inline]
    pub const fn minute(&self) -> u8 {
        ((self.dos_time >> 5) & 0x3F) as u8
    }

    /// Returns the second, always even (0-58).
    #[inline]
    pub const fn second(&self) -> u8 {
        ((self.dos_time & 0x1F) * 2) as u8
    }

    /// Converts to a [`SystemTime`], treating the timestamp as UTC.
    ///
    /// DOS timestamps carry no zone information; ZIP tools conventionally
    /// store local time, but interpreting them uniformly as UTC keeps
    /// round-trips through this crate lossless.
    pub fn to_system_time(&self) -> SystemTime {
        let days = days_from_civil(self.year() as i64, self.month(), self.day());
        let day_secs =
            self.hour() as u64 * 3600 + self.minute() as u64 * 60 + self.second() as u64;
        let unix_secs = DOS_EPOCH_UNIX_SECS as i64 + days * 86_400 + day_secs as i64;
        UNIX_EPOCH + Duration::from_secs(unix_secs.max(0) as u64)
    }
}

impl Default for Timestamp {
    /// Returns the DOS epoch (1980-01-01 00:00:00).
    fn default() -> Self {
        Self::from_dos(0x0021, 0)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> SystemTime {
        ts.to_system_time()
    }
}

/// Days since 1980-01-01 for a civil date (proleptic Gregorian).
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    // 719468 maps day 0 to 1970-01-01; shift a further 3652 days to 1980-01-01
    era * 146_097 + doe - 719_468 - 3_652
}

/// Civil date (year, month, day) for days since 1980-01-01.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468 + 3_652;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}
