// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Canonical instant.
//!
//! [`Time`] is the single in-memory time representation used by every table,
//! series and interval in the crate.  It stores a signed count of
//! nanoseconds since **2000-01-01T00:00:00 UTC** on a continuous axis where
//! leap seconds are not counted (every UTC day is exactly 86 400 s long).
//!
//! | Property | Value |
//! |----------|-------|
//! | Resolution | 1 ns |
//! | Epoch | 2000-01-01T00:00:00 UTC |
//! | Valid range | ≈ 1707-09-22 … 2292-04-10 |
//! | Invalid sentinel | [`Time::INVALID`] (`i64::MIN`) |
//!
//! Comparison is plain integer comparison.  [`Time::INVALID`] sorts before
//! every valid instant and is never equal to one; arithmetic involving it
//! yields [`Time::INVALID`] again.
//!
//! The on-disk encodings (CDF_EPOCH, CDF_TT2000) live in
//! [`crate::encoding`]; conversions to and from `chrono::DateTime<Utc>` and
//! MJD2000 day counts are provided here.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use qtty::{Days, Seconds};
use std::fmt;
use std::ops::{Add, Sub};

/// Nanoseconds in one millisecond.
pub const NANOS_PER_MILLI: i64 = 1_000_000;
/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
/// Nanoseconds in one (leap-second free) day.
pub const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SECOND;

/// Unix timestamp of 2000-01-01T00:00:00Z.
const UNIX_SECONDS_2000: i64 = 946_684_800;

// ═══════════════════════════════════════════════════════════════════════════
// Time: the canonical instant
// ═══════════════════════════════════════════════════════════════════════════

/// A point on the canonical UTC-2000 nanosecond axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    nanos: i64,
}

impl Time {
    /// The invalid sentinel ("not a time").
    pub const INVALID: Self = Self { nanos: i64::MIN };

    /// 2000-01-01T00:00:00 UTC.
    pub const EPOCH_2000: Self = Self { nanos: 0 };

    /// Earliest valid instant.
    pub const MIN: Self = Self {
        nanos: i64::MIN + 1,
    };

    /// Latest valid instant.
    pub const MAX: Self = Self { nanos: i64::MAX };

    // ── constructors ──────────────────────────────────────────────────

    /// Create from nanoseconds since 2000-01-01T00:00:00 UTC.
    #[inline]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Create from whole milliseconds since 2000-01-01T00:00:00 UTC.
    ///
    /// Returns `None` when the value does not fit the canonical range.
    #[inline]
    pub const fn from_millis(millis: i64) -> Option<Self> {
        match millis.checked_mul(NANOS_PER_MILLI) {
            Some(nanos) if nanos != i64::MIN => Some(Self { nanos }),
            _ => None,
        }
    }

    /// Create from whole seconds since 2000-01-01T00:00:00 UTC.
    #[inline]
    pub const fn from_seconds(seconds: i64) -> Option<Self> {
        match seconds.checked_mul(NANOS_PER_SECOND) {
            Some(nanos) if nanos != i64::MIN => Some(Self { nanos }),
            _ => None,
        }
    }

    // ── accessors ─────────────────────────────────────────────────────

    /// Nanoseconds since 2000-01-01T00:00:00 UTC.
    #[inline]
    pub const fn nanos(self) -> i64 {
        self.nanos
    }

    /// `false` only for [`Time::INVALID`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.nanos != i64::MIN
    }

    /// `Some(self)` for valid instants.
    #[inline]
    pub const fn valid(self) -> Option<Self> {
        if self.is_valid() {
            Some(self)
        } else {
            None
        }
    }

    /// Index of the UTC day containing this instant, counted from
    /// 2000-01-01 (negative before).
    #[inline]
    pub const fn day2k(self) -> i64 {
        self.nanos.div_euclid(NANOS_PER_DAY)
    }

    // ── UTC helpers ───────────────────────────────────────────────────

    /// Build an instant from a `chrono::DateTime<Utc>`.
    pub fn from_utc(datetime: DateTime<Utc>) -> Result<Self> {
        let seconds = i128::from(datetime.timestamp() - UNIX_SECONDS_2000);
        let nanos = seconds * i128::from(NANOS_PER_SECOND)
            + i128::from(datetime.timestamp_subsec_nanos());
        Self::from_wide(nanos)
            .ok_or_else(|| Error::invalid_time(format!("{datetime} is outside the canonical range")))
    }

    /// Convert to a `chrono::DateTime<Utc>`.
    ///
    /// Returns `None` for [`Time::INVALID`].
    pub fn to_utc(self) -> Option<DateTime<Utc>> {
        if !self.is_valid() {
            return None;
        }
        let seconds = self.nanos.div_euclid(NANOS_PER_SECOND) + UNIX_SECONDS_2000;
        let subsec = self.nanos.rem_euclid(NANOS_PER_SECOND) as u32;
        DateTime::<Utc>::from_timestamp(seconds, subsec)
    }

    /// Parse an ISO-8601 timestamp.
    ///
    /// Accepts RFC 3339 (`2020-01-01T00:00:00Z`, `...+02:00`), a naive
    /// date-time read as UTC (`2020-01-01T00:00:00.250`) and a bare date.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Self::from_utc(datetime.with_timezone(&Utc));
        }
        let naive = text.trim_end_matches('Z');
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(naive, format) {
                return Self::from_utc(datetime.and_utc());
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
            if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
                return Self::from_utc(datetime.and_utc());
            }
        }
        Err(Error::invalid_input(format!("cannot parse {text:?} as a timestamp")))
    }

    // ── MJD2000 helpers ───────────────────────────────────────────────

    /// Build an instant from an MJD2000 day count (days since 2000-01-01).
    pub fn from_mjd2000(mjd2000: Days) -> Result<Self> {
        let nanos = mjd2000.value() * NANOS_PER_DAY as f64;
        Self::from_float_nanos(nanos.round()).ok_or_else(|| {
            Error::invalid_time(format!("MJD2000 {} is outside the canonical range", mjd2000.value()))
        })
    }

    /// MJD2000 day count (days since 2000-01-01), `None` if invalid.
    pub fn to_mjd2000(self) -> Option<Days> {
        if !self.is_valid() {
            return None;
        }
        let days = self.nanos.div_euclid(NANOS_PER_DAY) as f64;
        let fraction = self.nanos.rem_euclid(NANOS_PER_DAY) as f64 / NANOS_PER_DAY as f64;
        Some(Days::new(days + fraction))
    }

    // ── arithmetic ────────────────────────────────────────────────────

    /// Signed difference `self − earlier` in seconds.
    ///
    /// NaN when either operand is invalid.
    pub fn delta_seconds(self, earlier: Self) -> Seconds {
        if !self.is_valid() || !earlier.is_valid() {
            return Seconds::new(f64::NAN);
        }
        let nanos = i128::from(self.nanos) - i128::from(earlier.nanos);
        Seconds::new(nanos as f64 * 1e-9)
    }

    /// Shift by a (possibly fractional) number of seconds, rounded to the
    /// nearest nanosecond.
    pub fn add_seconds(self, delta: Seconds) -> Result<Self> {
        if !self.is_valid() {
            return Err(Error::invalid_time("cannot shift an invalid time"));
        }
        let shift = (delta.value() * 1e9).round();
        if !shift.is_finite() {
            return Err(Error::invalid_input(format!("non-finite shift {} s", delta.value())));
        }
        let nanos = i128::from(self.nanos) + shift as i128;
        Self::from_wide(nanos).ok_or_else(|| {
            Error::invalid_time(format!("{self} shifted by {} s leaves the canonical range", delta.value()))
        })
    }

    /// Checked addition of an exact duration.
    #[inline]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        if !self.is_valid() {
            return None;
        }
        Self::from_wide(i128::from(self.nanos) + duration_nanos(duration))
    }

    /// Checked subtraction of an exact duration.
    #[inline]
    pub fn checked_sub(self, duration: Duration) -> Option<Self> {
        if !self.is_valid() {
            return None;
        }
        Self::from_wide(i128::from(self.nanos) - duration_nanos(duration))
    }

    /// Round to the nearest multiple of `step` (ties round up).
    ///
    /// Non-positive steps leave the instant unchanged.
    pub fn round_to(self, step: Duration) -> Self {
        let step = duration_nanos(step);
        if !self.is_valid() || step <= 0 {
            return self;
        }
        let nanos = i128::from(self.nanos);
        let rounded = (nanos + step / 2).div_euclid(step) * step;
        Self::from_wide(rounded).unwrap_or(self)
    }

    /// Element-wise minimum.
    #[inline]
    pub fn earliest(self, other: Self) -> Self {
        std::cmp::min(self, other)
    }

    /// Element-wise maximum.
    #[inline]
    pub fn latest(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }

    fn from_wide(nanos: i128) -> Option<Self> {
        if nanos > i128::from(i64::MIN) && nanos <= i128::from(i64::MAX) {
            Some(Self {
                nanos: nanos as i64,
            })
        } else {
            None
        }
    }

    fn from_float_nanos(nanos: f64) -> Option<Self> {
        // 2^63 is exactly representable; the valid range is (-2^63, 2^63).
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if nanos.is_finite() && nanos > -LIMIT && nanos < LIMIT {
            Self::from_wide(nanos as i128)
        } else {
            None
        }
    }
}

/// Exact nanosecond count of a chrono duration (saturating far outside the
/// canonical range).
#[inline]
pub(crate) fn duration_nanos(duration: Duration) -> i128 {
    match duration.num_nanoseconds() {
        Some(nanos) => i128::from(nanos),
        None => i128::from(duration.num_milliseconds()) * i128::from(NANOS_PER_MILLI),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Trait implementations
// ═══════════════════════════════════════════════════════════════════════════

// ── Display ───────────────────────────────────────────────────────────────

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_utc() {
            Some(datetime) => f.write_str(&datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => f.write_str("invalid"),
        }
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────

/// Saturating shift; [`Time::INVALID`] stays invalid.
impl Add<Duration> for Time {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        if !self.is_valid() {
            return self;
        }
        let nanos = i128::from(self.nanos) + duration_nanos(rhs);
        Self::from_wide(nanos).unwrap_or(if nanos > 0 { Self::MAX } else { Self::MIN })
    }
}

/// Saturating shift; [`Time::INVALID`] stays invalid.
impl Sub<Duration> for Time {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        if !self.is_valid() {
            return self;
        }
        let nanos = i128::from(self.nanos) - duration_nanos(rhs);
        Self::from_wide(nanos).unwrap_or(if nanos > 0 { Self::MAX } else { Self::MIN })
    }
}

/// Exact difference between two valid instants.
impl Sub for Time {
    type Output = Duration;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        let nanos = i128::from(self.nanos) - i128::from(rhs.nanos);
        let clamped = nanos.clamp(i128::from(i64::MIN), i128::from(i64::MAX));
        Duration::nanoseconds(clamped as i64)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_2000_is_zero() {
        let datetime = DateTime::from_timestamp(946_684_800, 0).unwrap();
        assert_eq!(Time::from_utc(datetime).unwrap(), Time::EPOCH_2000);
        assert_eq!(Time::EPOCH_2000.to_utc(), Some(datetime));
    }

    #[test]
    fn test_utc_roundtrip_keeps_nanoseconds() {
        let datetime = DateTime::from_timestamp(1_577_836_800, 123_456_789).unwrap();
        let time = Time::from_utc(datetime).unwrap();
        assert_eq!(time.to_utc(), Some(datetime));
    }

    #[test]
    fn test_pre_2000_instants_floor_correctly() {
        let time = Time::from_nanos(-1);
        let datetime = time.to_utc().unwrap();
        assert_eq!(datetime.timestamp(), 946_684_799);
        assert_eq!(datetime.timestamp_subsec_nanos(), 999_999_999);
        assert_eq!(time.day2k(), -1);
    }

    #[test]
    fn test_invalid_sorts_first_and_never_equals_valid() {
        assert!(Time::INVALID < Time::MIN);
        assert_ne!(Time::INVALID, Time::MIN);
        assert!(!Time::INVALID.is_valid());
        assert_eq!(Time::INVALID.to_utc(), None);
        assert_eq!(Time::INVALID + Duration::seconds(1), Time::INVALID);
        assert!(Time::INVALID.delta_seconds(Time::EPOCH_2000).value().is_nan());
    }

    #[test]
    fn test_parse_variants() {
        let expected = Time::from_seconds(631_152_000).unwrap(); // 2020-01-01
        assert_eq!(Time::parse("2020-01-01T00:00:00Z").unwrap(), expected);
        assert_eq!(Time::parse("2020-01-01T01:00:00+01:00").unwrap(), expected);
        assert_eq!(Time::parse("2020-01-01T00:00:00").unwrap(), expected);
        assert_eq!(Time::parse("2020-01-01").unwrap(), expected);
        assert!(Time::parse("not a date").is_err());
    }

    #[test]
    fn test_display_is_iso() {
        let time = Time::parse("2020-01-01T00:00:00.250Z").unwrap();
        assert_eq!(time.to_string(), "2020-01-01T00:00:00.250Z");
        assert_eq!(Time::INVALID.to_string(), "invalid");
    }

    #[test]
    fn test_mjd2000_conversions() {
        let time = Time::parse("2000-01-02T12:00:00Z").unwrap();
        assert_eq!(time.to_mjd2000(), Some(Days::new(1.5)));
        assert_eq!(Time::from_mjd2000(Days::new(1.5)).unwrap(), time);

        let before = Time::from_mjd2000(Days::new(-0.25)).unwrap();
        assert_eq!(before, Time::parse("1999-12-31T18:00:00Z").unwrap());
        assert!(Time::from_mjd2000(Days::new(1.0e6)).is_err());
        assert!(Time::from_mjd2000(Days::new(f64::NAN)).is_err());
    }

    #[test]
    fn test_delta_and_add_seconds() {
        let t1 = Time::parse("2020-01-01T00:00:00Z").unwrap();
        let t2 = t1.add_seconds(Seconds::new(90.5)).unwrap();
        assert_eq!(t2 - t1, Duration::milliseconds(90_500));
        assert!((t2.delta_seconds(t1).value() - 90.5).abs() < 1e-12);
        assert!((t1.delta_seconds(t2).value() + 90.5).abs() < 1e-12);
        assert!(Time::MAX.add_seconds(Seconds::new(1.0)).is_err());
        assert!(t1.add_seconds(Seconds::new(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_saturating_ops_stay_valid() {
        assert_eq!(Time::MAX + Duration::days(1), Time::MAX);
        assert_eq!(Time::MIN - Duration::days(1), Time::MIN);
        assert_eq!(Time::MAX.checked_add(Duration::nanoseconds(1)), None);
    }

    #[test]
    fn test_round_to() {
        let step = Duration::seconds(1);
        assert_eq!(Time::from_nanos(1_499_999_999).round_to(step), Time::from_nanos(1_000_000_000));
        assert_eq!(Time::from_nanos(1_500_000_000).round_to(step), Time::from_nanos(2_000_000_000));
        assert_eq!(Time::from_nanos(-1_400_000_000).round_to(step), Time::from_nanos(-1_000_000_000));
        assert_eq!(Time::INVALID.round_to(step), Time::INVALID);
    }

    #[test]
    fn test_from_millis_overflow() {
        assert_eq!(Time::from_millis(1_500).map(Time::nanos), Some(1_500_000_000));
        assert_eq!(Time::from_millis(i64::MAX), None);
    }
}
