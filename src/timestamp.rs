//! Entry modification times.
//!
//! This module provides the [`Timestamp`] type used for entry modification
//! times. Both supported containers store whole seconds at best, so the type
//! keeps Unix seconds and nothing finer.
//!
//! # Precision
//!
//! - TAR headers store seconds since the Unix epoch (octal, 11 digits in
//!   ustar; GNU base-256 beyond that).
//! - ZIP headers store an MS-DOS date/time: local-time fields with 2-second
//!   resolution, covering 1980-01-01 to 2107-12-31. Values are interpreted
//!   as UTC here and clamped to that range when written.
//!
//! # Example
//!
//! ```rust
//! use arcstream::Timestamp;
//!
//! let ts = Timestamp::from_unix_secs(1_700_000_000);
//! assert_eq!(ts.as_unix_secs(), 1_700_000_000);
//!
//! // ZIP rounds down to an even second
//! let dos = ts.to_zip_datetime();
//! assert_eq!(Timestamp::from_zip_datetime(&dos).as_unix_secs(), 1_700_000_000);
//! ```

use chrono::{Datelike, NaiveDate, Timelike, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Earliest year representable by an MS-DOS date.
const DOS_MIN_YEAR: i32 = 1980;

/// Latest year representable by an MS-DOS date.
const DOS_MAX_YEAR: i32 = 2107;

/// 1980-01-01T00:00:00Z in Unix seconds.
const DOS_EPOCH_UNIX_SECS: i64 = 315_532_800;

/// A modification time with one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
}

impl Timestamp {
    /// Creates a timestamp from Unix seconds (since January 1, 1970 UTC).
    #[inline]
    pub const fn from_unix_secs(secs: i64) -> Self {
        Self { secs }
    }

    /// Returns the current wall-clock time.
    pub fn now() -> Self {
        Self::from_unix_secs(Utc::now().timestamp())
    }

    /// Creates a timestamp from a `SystemTime`, truncating sub-second parts.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::from_unix_secs(d.as_secs() as i64),
            Err(e) => {
                let d = e.duration();
                let extra = i64::from(d.subsec_nanos() > 0);
                Self::from_unix_secs(-(d.as_secs() as i64) - extra)
            }
        }
    }

    /// Returns the timestamp as Unix seconds.
    #[inline]
    pub const fn as_unix_secs(&self) -> i64 {
        self.secs
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.secs.unsigned_abs())
        }
    }

    /// Returns the value written into a TAR `mtime` field.
    ///
    /// TAR cannot represent times before the epoch; those clamp to zero.
    pub fn as_tar_mtime(&self) -> u64 {
        self.secs.max(0) as u64
    }

    /// Converts to an MS-DOS date/time for a ZIP header.
    ///
    /// Times outside 1980..=2107 clamp to the nearest representable value.
    pub fn to_zip_datetime(&self) -> zip::DateTime {
        let Some(dt) = chrono::DateTime::from_timestamp(self.secs, 0) else {
            return zip::DateTime::default();
        };
        let dt = dt.naive_utc();

        if dt.year() < DOS_MIN_YEAR {
            return zip::DateTime::default();
        }
        if dt.year() > DOS_MAX_YEAR {
            return zip::DateTime::from_date_and_time(DOS_MAX_YEAR as u16, 12, 31, 23, 59, 58)
                .unwrap_or_default();
        }

        zip::DateTime::from_date_and_time(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        )
        .unwrap_or_default()
    }

    /// Converts an MS-DOS date/time read from a ZIP header.
    ///
    /// Field values the DOS encoding allows but the calendar does not
    /// (e.g. month 0) yield the DOS epoch, 1980-01-01.
    pub fn from_zip_datetime(dt: &zip::DateTime) -> Self {
        let naive = NaiveDate::from_ymd_opt(
            i32::from(dt.year()),
            u32::from(dt.month()),
            u32::from(dt.day()),
        )
        .and_then(|d| {
            d.and_hms_opt(
                u32::from(dt.hour()),
                u32::from(dt.minute()),
                u32::from(dt.second()),
            )
        });
        match naive {
            Some(n) => Self::from_unix_secs(n.and_utc().timestamp()),
            None => Self::from_unix_secs(DOS_EPOCH_UNIX_SECS),
        }
    }
}

impl Default for Timestamp {
    /// Returns the Unix epoch (January 1, 1970).
    fn default() -> Self {
        Self::from_unix_secs(0)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> SystemTime {
        ts.as_system_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let ts = Timestamp::default();
        assert_eq!(ts.as_unix_secs(), 0);
        assert_eq!(ts.as_system_time(), UNIX_EPOCH);
        assert_eq!(ts.as_tar_mtime(), 0);
    }

    #[test]
    fn test_roundtrip_system_time() {
        let original = UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        let ts = Timestamp::from_system_time(original);
        assert_eq!(ts.as_system_time(), original);
    }

    #[test]
    fn test_sub_second_truncated() {
        let ts = Timestamp::from_system_time(UNIX_EPOCH + Duration::new(10, 999_999_999));
        assert_eq!(ts.as_unix_secs(), 10);
    }

    #[test]
    fn test_before_unix_epoch() {
        let ts = Timestamp::from_system_time(UNIX_EPOCH - Duration::from_secs(86_400));
        assert_eq!(ts.as_unix_secs(), -86_400);
        assert_eq!(ts.as_tar_mtime(), 0);
    }

    #[test]
    fn test_zip_roundtrip_even_second() {
        // 2021-06-15T12:34:56Z
        let ts = Timestamp::from_unix_secs(1_623_760_496);
        let dos = ts.to_zip_datetime();
        assert_eq!(dos.year(), 2021);
        assert_eq!(dos.month(), 6);
        assert_eq!(dos.day(), 15);
        assert_eq!(Timestamp::from_zip_datetime(&dos), ts);
    }

    #[test]
    fn test_zip_odd_second_rounds_down() {
        let ts = Timestamp::from_unix_secs(1_623_760_497);
        let back = Timestamp::from_zip_datetime(&ts.to_zip_datetime());
        assert_eq!(back.as_unix_secs(), 1_623_760_496);
    }

    #[test]
    fn test_zip_clamps_before_1980() {
        let dos = Timestamp::from_unix_secs(0).to_zip_datetime();
        assert_eq!(dos.year(), 1980);
        assert_eq!(
            Timestamp::from_zip_datetime(&dos).as_unix_secs(),
            DOS_EPOCH_UNIX_SECS
        );
    }

    #[test]
    fn test_now_is_recent() {
        // 2020-01-01
        assert!(Timestamp::now().as_unix_secs() > 1_577_836_800);
    }
}
