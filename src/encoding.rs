// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! On-disk time encodings.
//!
//! | Encoding | Raw type | Epoch | Resolution | Leap seconds |
//! |----------|----------|-------|------------|--------------|
//! | [`TimeEncoding::CdfEpoch`] | `f64` ms | 0000-01-01T00:00:00 | 1 ms kept | ignored |
//! | [`TimeEncoding::CdfTt2000`] | `i64` ns | 2000-01-01T12:00:00 TT | 1 ns | applied |
//!
//! Each encoding is a row of a static strategy table ([`TimeEncoding::ops`])
//! holding plain conversion functions.  [`TimeCodec`] pairs an encoding with
//! a borrowed [`LeapSecondTable`] and is the entry point used by the storage
//! layer.
//!
//! Sentinel raw values (invalid/padding) decode to [`Time::INVALID`];
//! [`Time::INVALID`] encodes to the invalid sentinel.  Any other raw value
//! that does not map into the canonical range is an
//! [`Error::InvalidTime`](crate::Error::InvalidTime), never clamped.

use crate::error::{Error, Result};
use crate::instant::{Time, NANOS_PER_MILLI, NANOS_PER_SECOND};
use crate::leap_seconds::{LeapSecondTable, NS_TT2000_TO_TAI2000_OFFSET};
use chrono::Duration;
use qtty::Seconds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CDF_EPOCH value of 2000-01-01T00:00:00.
pub const CDF_EPOCH_2000: f64 = 63_113_904_000_000.0;
/// CDF_EPOCH value of 1970-01-01T00:00:00.
pub const CDF_EPOCH_1970: f64 = 62_167_219_200_000.0;
/// CDF_EPOCH invalid sentinel.
pub const CDF_EPOCH_INVALID_VALUE: f64 = -1.0e31;
/// CDF_EPOCH padding value.
pub const CDF_EPOCH_PADDING_VALUE: f64 = 0.0;

/// CDF_TT2000 invalid sentinel.
pub const CDF_TT2000_INVALID_VALUE: i64 = i64::MIN;
/// CDF_TT2000 padding value.
pub const CDF_TT2000_PADDING_VALUE: i64 = i64::MIN + 1;
/// Smallest non-sentinel CDF_TT2000 value.
pub const CDF_TT2000_MIN_VALID: i64 = i64::MIN + 2;

const CDF_EPOCH_2000_MS: i64 = 63_113_904_000_000;

// ═══════════════════════════════════════════════════════════════════════════
// Encodings and raw values
// ═══════════════════════════════════════════════════════════════════════════

/// Supported on-disk time encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeEncoding {
    /// `f64` milliseconds since 0000-01-01T00:00:00, no leap seconds.
    #[default]
    #[serde(rename = "CDF_EPOCH")]
    CdfEpoch,
    /// `i64` nanoseconds since 2000-01-01T12:00:00 TT.
    #[serde(rename = "CDF_TIME_TT2000")]
    CdfTt2000,
}

/// A single raw time value tagged with its encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawTime {
    Epoch(f64),
    Tt2000(i64),
}

impl RawTime {
    /// Encoding the value belongs to.
    pub fn encoding(self) -> TimeEncoding {
        match self {
            RawTime::Epoch(_) => TimeEncoding::CdfEpoch,
            RawTime::Tt2000(_) => TimeEncoding::CdfTt2000,
        }
    }

    /// `true` for the invalid and padding sentinels.
    pub fn is_sentinel(self) -> bool {
        match self {
            RawTime::Epoch(value) => {
                value == CDF_EPOCH_INVALID_VALUE || value == CDF_EPOCH_PADDING_VALUE
            }
            RawTime::Tt2000(value) => {
                value == CDF_TT2000_INVALID_VALUE || value == CDF_TT2000_PADDING_VALUE
            }
        }
    }
}

impl fmt::Display for RawTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTime::Epoch(value) => write!(f, "CDF_EPOCH {value}"),
            RawTime::Tt2000(value) => write!(f, "CDF_TIME_TT2000 {value}"),
        }
    }
}

/// Strategy-table row for one encoding.
#[derive(Debug)]
pub struct EncodingOps {
    /// CDF data type label.
    pub label: &'static str,
    pub encode: fn(&LeapSecondTable, Time) -> Result<RawTime>,
    pub decode: fn(&LeapSecondTable, RawTime) -> Result<Time>,
    pub delta_seconds: fn(RawTime, RawTime) -> Result<Seconds>,
    pub add_seconds: fn(RawTime, Seconds) -> Result<RawTime>,
}

static CDF_EPOCH_OPS: EncodingOps = EncodingOps {
    label: "CDF_EPOCH",
    encode: epoch::encode,
    decode: epoch::decode,
    delta_seconds: epoch::delta_seconds,
    add_seconds: epoch::add_seconds,
};

static CDF_TT2000_OPS: EncodingOps = EncodingOps {
    label: "CDF_TIME_TT2000",
    encode: tt2000::encode,
    decode: tt2000::decode,
    delta_seconds: tt2000::delta_seconds,
    add_seconds: tt2000::add_seconds,
};

impl TimeEncoding {
    /// Conversion functions of this encoding.
    #[inline]
    pub fn ops(self) -> &'static EncodingOps {
        match self {
            TimeEncoding::CdfEpoch => &CDF_EPOCH_OPS,
            TimeEncoding::CdfTt2000 => &CDF_TT2000_OPS,
        }
    }

    /// CDF data type label.
    #[inline]
    pub fn label(self) -> &'static str {
        self.ops().label
    }

    /// Finest step stored exactly.
    ///
    /// `CDF_EPOCH` values near the present are only accurate to a few
    /// microseconds, so tables written with it keep whole milliseconds.
    pub fn resolution(self) -> Duration {
        match self {
            TimeEncoding::CdfEpoch => Duration::milliseconds(1),
            TimeEncoding::CdfTt2000 => Duration::nanoseconds(1),
        }
    }

    /// The invalid sentinel of this encoding.
    pub fn invalid_value(self) -> RawTime {
        match self {
            TimeEncoding::CdfEpoch => RawTime::Epoch(CDF_EPOCH_INVALID_VALUE),
            TimeEncoding::CdfTt2000 => RawTime::Tt2000(CDF_TT2000_INVALID_VALUE),
        }
    }
}

impl fmt::Display for TimeEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn encoding_mismatch(raw: RawTime, expected: TimeEncoding) -> Error {
    Error::invalid_input(format!("{raw} passed where {expected} was expected"))
}

// ── CDF_EPOCH ─────────────────────────────────────────────────────────────

mod epoch {
    use super::*;

    fn value(raw: RawTime) -> Result<f64> {
        match raw {
            RawTime::Epoch(value) => Ok(value),
            other => Err(encoding_mismatch(other, TimeEncoding::CdfEpoch)),
        }
    }

    fn valid_value(raw: RawTime) -> Result<f64> {
        let value = value(raw)?;
        if raw.is_sentinel() || !value.is_finite() {
            return Err(Error::invalid_time(format!("{raw} is not a valid time")));
        }
        Ok(value)
    }

    pub(super) fn encode(_: &LeapSecondTable, time: Time) -> Result<RawTime> {
        if !time.is_valid() {
            return Ok(RawTime::Epoch(CDF_EPOCH_INVALID_VALUE));
        }
        // Whole milliseconds are added exactly; only the sub-ms part is
        // subject to float rounding.
        let millis = time.nanos().div_euclid(NANOS_PER_MILLI);
        let remainder = time.nanos().rem_euclid(NANOS_PER_MILLI);
        let whole = (millis + CDF_EPOCH_2000_MS) as f64;
        Ok(RawTime::Epoch(whole + remainder as f64 * 1e-6))
    }

    pub(super) fn decode(_: &LeapSecondTable, raw: RawTime) -> Result<Time> {
        let value = value(raw)?;
        if raw.is_sentinel() {
            return Ok(Time::INVALID);
        }
        if !value.is_finite() || value.abs() >= 1.0e17 {
            return Err(Error::invalid_time(format!("{raw} is out of range")));
        }
        let whole = value.floor();
        let fraction_ns = ((value - whole) * NANOS_PER_MILLI as f64).round() as i128;
        let nanos = (whole as i128 - i128::from(CDF_EPOCH_2000_MS)) * i128::from(NANOS_PER_MILLI)
            + fraction_ns;
        wide_to_time(nanos).ok_or_else(|| Error::invalid_time(format!("{raw} is out of range")))
    }

    pub(super) fn delta_seconds(raw1: RawTime, raw2: RawTime) -> Result<Seconds> {
        Ok(Seconds::new((valid_value(raw1)? - valid_value(raw2)?) / 1e3))
    }

    pub(super) fn add_seconds(raw: RawTime, delta: Seconds) -> Result<RawTime> {
        let shifted = valid_value(raw)? + delta.value() * 1e3;
        if !shifted.is_finite() {
            return Err(Error::invalid_input(format!("non-finite shift {} s", delta.value())));
        }
        Ok(RawTime::Epoch(shifted))
    }
}

// ── CDF_TIME_TT2000 ───────────────────────────────────────────────────────

mod tt2000 {
    use super::*;

    fn value(raw: RawTime) -> Result<i64> {
        match raw {
            RawTime::Tt2000(value) => Ok(value),
            other => Err(encoding_mismatch(other, TimeEncoding::CdfTt2000)),
        }
    }

    fn valid_value(raw: RawTime) -> Result<i64> {
        let value = value(raw)?;
        if raw.is_sentinel() {
            return Err(Error::invalid_time(format!("{raw} is not a valid time")));
        }
        Ok(value)
    }

    pub(super) fn encode(leap_seconds: &LeapSecondTable, time: Time) -> Result<RawTime> {
        if !time.is_valid() {
            return Ok(RawTime::Tt2000(CDF_TT2000_INVALID_VALUE));
        }
        let offset = leap_seconds.offset_for_utc_day(time.day2k()) - NS_TT2000_TO_TAI2000_OFFSET;
        let tt2000 = i128::from(time.nanos()) + i128::from(offset);
        if tt2000 < i128::from(CDF_TT2000_MIN_VALID) || tt2000 > i128::from(i64::MAX) {
            return Err(Error::invalid_time(format!("{time} cannot be encoded as CDF_TIME_TT2000")));
        }
        Ok(RawTime::Tt2000(tt2000 as i64))
    }

    pub(super) fn decode(leap_seconds: &LeapSecondTable, raw: RawTime) -> Result<Time> {
        let value = value(raw)?;
        if raw.is_sentinel() {
            return Ok(Time::INVALID);
        }
        let offset = leap_seconds.offset_for_tt2000(value) - NS_TT2000_TO_TAI2000_OFFSET;
        let nanos = i128::from(value) - i128::from(offset);
        wide_to_time(nanos).ok_or_else(|| Error::invalid_time(format!("{raw} is out of range")))
    }

    pub(super) fn delta_seconds(raw1: RawTime, raw2: RawTime) -> Result<Seconds> {
        let delta = i128::from(valid_value(raw1)?) - i128::from(valid_value(raw2)?);
        Ok(Seconds::new(delta as f64 / NANOS_PER_SECOND as f64))
    }

    pub(super) fn add_seconds(raw: RawTime, delta: Seconds) -> Result<RawTime> {
        let value = valid_value(raw)?;
        let shift = (delta.value() * NANOS_PER_SECOND as f64).round();
        if !shift.is_finite() || shift.abs() > 1.0e19 {
            return Err(Error::invalid_input(format!("shift {} s out of range", delta.value())));
        }
        let shifted = i128::from(value) + shift as i128;
        if shifted < i128::from(CDF_TT2000_MIN_VALID) || shifted > i128::from(i64::MAX) {
            return Err(Error::invalid_time(format!("{raw} shifted by {} s overflows", delta.value())));
        }
        Ok(RawTime::Tt2000(shifted as i64))
    }
}

fn wide_to_time(nanos: i128) -> Option<Time> {
    if nanos > i128::from(i64::MIN) && nanos <= i128::from(i64::MAX) {
        Some(Time::from_nanos(nanos as i64))
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TimeCodec
// ═══════════════════════════════════════════════════════════════════════════

/// An encoding bound to the leap-second table it converts with.
#[derive(Debug, Clone, Copy)]
pub struct TimeCodec<'a> {
    encoding: TimeEncoding,
    leap_seconds: &'a LeapSecondTable,
}

impl<'a> TimeCodec<'a> {
    pub fn new(encoding: TimeEncoding, leap_seconds: &'a LeapSecondTable) -> Self {
        Self {
            encoding,
            leap_seconds,
        }
    }

    #[inline]
    pub fn encoding(&self) -> TimeEncoding {
        self.encoding
    }

    #[inline]
    pub fn leap_seconds(&self) -> &'a LeapSecondTable {
        self.leap_seconds
    }

    /// Same leap-second table, different encoding.
    pub fn with_encoding(&self, encoding: TimeEncoding) -> Self {
        Self::new(encoding, self.leap_seconds)
    }

    /// Canonical → raw.
    pub fn encode(&self, time: Time) -> Result<RawTime> {
        (self.encoding.ops().encode)(self.leap_seconds, time)
    }

    /// Raw → canonical.
    pub fn decode(&self, raw: RawTime) -> Result<Time> {
        (raw.encoding().ops().decode)(self.leap_seconds, raw)
    }

    /// `raw1 − raw2` in seconds, in the raw values' own time scale.
    pub fn delta_seconds(&self, raw1: RawTime, raw2: RawTime) -> Result<Seconds> {
        (self.encoding.ops().delta_seconds)(raw1, raw2)
    }

    /// Shift a raw value by `delta` seconds of its own time scale.
    pub fn add_seconds(&self, raw: RawTime, delta: Seconds) -> Result<RawTime> {
        (self.encoding.ops().add_seconds)(raw, delta)
    }

    /// Convert a raw value of any encoding into this codec's encoding.
    pub fn transcode(&self, raw: RawTime) -> Result<RawTime> {
        if raw.encoding() == self.encoding {
            return Ok(raw);
        }
        self.encode(self.decode(raw)?)
    }

    /// Encode a slice of instants.
    pub fn encode_all(&self, times: &[Time]) -> Result<Vec<RawTime>> {
        times.iter().map(|&time| self.encode(time)).collect()
    }

    /// Decode a slice of raw values.
    pub fn decode_all(&self, raw: &[RawTime]) -> Result<Vec<Time>> {
        raw.iter().map(|&value| self.decode(value)).collect()
    }
}
