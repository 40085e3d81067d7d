// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Leap-second correction table.
//!
//! [`LeapSecondTable`] holds the stepwise constant TAI − UTC offset as an
//! ordered list of `(effective_day, offset_ns)` breakpoints, where
//! `effective_day` counts UTC days from 2000-01-01.  A second breakpoint list
//! keyed on CDF_TT2000 values supports the inverse conversion.  Both lookups
//! are binary searches for the last breakpoint not after the query; before
//! the first breakpoint the offset is zero.
//!
//! The table is built once (from the built-in CDF table, a CDF leap-seconds
//! file, or caller-supplied breakpoints) and passed by reference to the
//! components that need it, most notably [`crate::TimeCodec`].
//!
//! Between 1960-01-01 and 1972-01-01 UTC drifted continuously against TAI.
//! Those records are expanded into one breakpoint per day using exact
//! integer arithmetic:
//!
//! ```text
//! offset(day) = offset₀ + slope_half_day × (1 + 2 × (day − drift_day))
//! ```

use crate::error::{Error, Result};
use crate::instant::{Time, NANOS_PER_DAY, NANOS_PER_SECOND};
use chrono::NaiveDate;
use qtty::Seconds;
use std::fs;
use std::path::Path;

/// 12 h offset between the Julian-date (noon) and calendar-day (midnight) epochs.
pub const NS_JD_TO_MJD_OFFSET: i64 = 43_200_000_000_000;
/// TT − TAI = 32.184 s.
pub const NS_TT_TO_TAI_OFFSET: i64 = 32_184_000_000;
/// Offset between the TT2000 and TAI2000 epochs.
pub const NS_TT2000_TO_TAI2000_OFFSET: i64 = NS_JD_TO_MJD_OFFSET - NS_TT_TO_TAI_OFFSET;

/// Modified Julian Date of 2000-01-01.
const MJD_2000: i64 = 51_544;

/// One line of a CDF leap-seconds table, already converted to integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeapSecondRecord {
    /// First UTC day (from 2000-01-01) the record applies to.
    pub day2k: i64,
    /// TAI − UTC at `day2k` in nanoseconds (before drift).
    pub tai_offset_ns: i64,
    /// Drift reference day (from 2000-01-01).
    pub drift_day2k: i64,
    /// Drift in nanoseconds per half day; zero for post-1972 records.
    pub drift_slope_ns: i64,
}

impl LeapSecondRecord {
    fn from_cdf_values(day2k: i64, tai_offset: f64, drift_mjd: i64, drift_slope: f64) -> Self {
        let drift_slope_ns = ((NANOS_PER_SECOND / 2) as f64 * drift_slope).round() as i64;
        Self {
            day2k,
            tai_offset_ns: (NANOS_PER_SECOND as f64 * tai_offset).round() as i64,
            drift_day2k: if drift_slope_ns == 0 { 0 } else { drift_mjd - MJD_2000 },
            drift_slope_ns,
        }
    }
}

// year, month, day, TAI−UTC [s], drift reference [MJD], drift [s/day]
const CDF_LEAP_SECONDS: [(i64, i64, i64, f64, i64, f64); 42] = [
    (1960, 1, 1, 1.4178180, 37300, 0.001296),
    (1961, 1, 1, 1.4228180, 37300, 0.001296),
    (1961, 8, 1, 1.3728180, 37300, 0.001296),
    (1962, 1, 1, 1.8458580, 37665, 0.0011232),
    (1963, 11, 1, 1.9458580, 37665, 0.0011232),
    (1964, 1, 1, 3.2401300, 38761, 0.001296),
    (1964, 4, 1, 3.3401300, 38761, 0.001296),
    (1964, 9, 1, 3.4401300, 38761, 0.001296),
    (1965, 1, 1, 3.5401300, 38761, 0.001296),
    (1965, 3, 1, 3.6401300, 38761, 0.001296),
    (1965, 7, 1, 3.7401300, 38761, 0.001296),
    (1965, 9, 1, 3.8401300, 38761, 0.001296),
    (1966, 1, 1, 4.3131700, 39126, 0.002592),
    (1968, 2, 1, 4.2131700, 39126, 0.002592),
    (1972, 1, 1, 10.0, 0, 0.0),
    (1972, 7, 1, 11.0, 0, 0.0),
    (1973, 1, 1, 12.0, 0, 0.0),
    (1974, 1, 1, 13.0, 0, 0.0),
    (1975, 1, 1, 14.0, 0, 0.0),
    (1976, 1, 1, 15.0, 0, 0.0),
    (1977, 1, 1, 16.0, 0, 0.0),
    (1978, 1, 1, 17.0, 0, 0.0),
    (1979, 1, 1, 18.0, 0, 0.0),
    (1980, 1, 1, 19.0, 0, 0.0),
    (1981, 7, 1, 20.0, 0, 0.0),
    (1982, 7, 1, 21.0, 0, 0.0),
    (1983, 7, 1, 22.0, 0, 0.0),
    (1985, 7, 1, 23.0, 0, 0.0),
    (1988, 1, 1, 24.0, 0, 0.0),
    (1990, 1, 1, 25.0, 0, 0.0),
    (1991, 1, 1, 26.0, 0, 0.0),
    (1992, 7, 1, 27.0, 0, 0.0),
    (1993, 7, 1, 28.0, 0, 0.0),
    (1994, 7, 1, 29.0, 0, 0.0),
    (1996, 1, 1, 30.0, 0, 0.0),
    (1997, 7, 1, 31.0, 0, 0.0),
    (1999, 1, 1, 32.0, 0, 0.0),
    (2006, 1, 1, 33.0, 0, 0.0),
    (2009, 1, 1, 34.0, 0, 0.0),
    (2012, 7, 1, 35.0, 0, 0.0),
    (2015, 7, 1, 36.0, 0, 0.0),
    (2017, 1, 1, 37.0, 0, 0.0),
];

/// Days from 2000-01-01 to the given proleptic Gregorian date.
pub(crate) const fn date_to_day2k(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let year_of_era = y - era * 400;
    let month_index = (month + 9) % 12;
    let day_of_year = (153 * month_index + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 730_425
}

// ═══════════════════════════════════════════════════════════════════════════
// LeapSecondTable
// ═══════════════════════════════════════════════════════════════════════════

/// Stepwise constant TAI − UTC offset with UTC-day and TT2000 lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeapSecondTable {
    days: Vec<i64>,
    offsets: Vec<i64>,
    tt2000_breaks: Vec<i64>,
}

impl LeapSecondTable {
    /// Build from caller-supplied `(effective_day, offset_ns)` breakpoints.
    ///
    /// Days count from 2000-01-01 and must be strictly increasing.
    pub fn new(entries: Vec<(i64, i64)>) -> Result<Self> {
        for (index, pair) in entries.windows(2).enumerate() {
            if pair[1].0 <= pair[0].0 {
                return Err(Error::LeapSeconds {
                    line: index + 2,
                    message: format!("effective day {} does not follow {}", pair[1].0, pair[0].0),
                });
            }
        }
        Ok(Self::from_breakpoints(entries))
    }

    /// The table distributed with the CDF library (last entry 2017-01-01).
    pub fn builtin() -> Self {
        let records: Vec<LeapSecondRecord> = CDF_LEAP_SECONDS
            .iter()
            .map(|&(year, month, day, offset, drift_mjd, slope)| {
                LeapSecondRecord::from_cdf_values(
                    date_to_day2k(year, month, day),
                    offset,
                    drift_mjd,
                    slope,
                )
            })
            .collect();
        Self::from_breakpoints(expand_drift(&records))
    }

    /// Build from CDF leap-second records, expanding the drift periods.
    pub fn from_records(records: &[LeapSecondRecord]) -> Result<Self> {
        for (index, pair) in records.windows(2).enumerate() {
            if pair[1].day2k <= pair[0].day2k {
                return Err(Error::LeapSeconds {
                    line: index + 2,
                    message: "records are not in chronological order".to_string(),
                });
            }
        }
        if records.last().is_some_and(|last| last.drift_slope_ns != 0) {
            return Err(Error::LeapSeconds {
                line: records.len(),
                message: "unbound drift period in the last record".to_string(),
            });
        }
        Ok(Self::from_breakpoints(expand_drift(records)))
    }

    /// Parse a CDF leap-seconds table.
    ///
    /// Each non-comment line holds `year month day tai_offset drift_mjd
    /// drift_slope`; everything after `;` is ignored.
    pub fn parse_cdf(text: &str) -> Result<Self> {
        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let content = line.split(';').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            records.push(parse_record(content).map_err(|message| Error::LeapSeconds {
                line: line_no,
                message,
            })?);
        }
        if records.is_empty() {
            return Err(Error::LeapSeconds {
                line: 0,
                message: "no leap-second records found".to_string(),
            });
        }
        Self::from_records(&records)
    }

    /// Read and parse a CDF leap-seconds file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse_cdf(&text)
    }

    fn from_breakpoints(entries: Vec<(i64, i64)>) -> Self {
        let (days, offsets): (Vec<i64>, Vec<i64>) = entries.into_iter().unzip();
        let tt2000_breaks = days
            .iter()
            .zip(&offsets)
            .map(|(&day, &offset)| {
                day.saturating_mul(NANOS_PER_DAY)
                    .saturating_add(offset)
                    .saturating_sub(NS_TT2000_TO_TAI2000_OFFSET)
            })
            .collect();
        Self {
            days,
            offsets,
            tt2000_breaks,
        }
    }

    // ── lookups ───────────────────────────────────────────────────────

    /// Number of breakpoints.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// `true` when the table has no breakpoints (offset is always zero).
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Breakpoints as `(effective_day, offset_ns)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.days.iter().copied().zip(self.offsets.iter().copied())
    }

    /// TAI − UTC in nanoseconds for the UTC day `day2k`.
    pub fn offset_for_utc_day(&self, day2k: i64) -> i64 {
        let index = self.days.partition_point(|&day| day <= day2k);
        if index == 0 {
            0
        } else {
            self.offsets[index - 1]
        }
    }

    /// TAI − UTC in nanoseconds in effect at the given CDF_TT2000 value.
    pub fn offset_for_tt2000(&self, tt2000: i64) -> i64 {
        let index = self.tt2000_breaks.partition_point(|&tt| tt <= tt2000);
        if index == 0 {
            0
        } else {
            self.offsets[index - 1]
        }
    }

    /// TAI − UTC at a canonical instant.
    pub fn tai_minus_utc(&self, time: Time) -> Seconds {
        Seconds::new(self.offset_for_utc_day(time.day2k()) as f64 * 1e-9)
    }
}

impl Default for LeapSecondTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn expand_drift(records: &[LeapSecondRecord]) -> Vec<(i64, i64)> {
    let mut entries = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let next_day = records.get(index + 1).map(|next| next.day2k);
        match next_day {
            Some(next_day) if record.drift_slope_ns != 0 => {
                for day in record.day2k..next_day {
                    let steps = 1 + 2 * (day - record.drift_day2k);
                    entries.push((day, record.tai_offset_ns + record.drift_slope_ns * steps));
                }
            }
            _ => entries.push((record.day2k, record.tai_offset_ns)),
        }
    }
    entries
}

fn parse_record(content: &str) -> std::result::Result<LeapSecondRecord, String> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    }
    let int = |text: &str| text.parse::<i64>().map_err(|e| format!("{text:?}: {e}"));
    let float = |text: &str| text.parse::<f64>().map_err(|e| format!("{text:?}: {e}"));

    let (year, month, day) = (int(fields[0])?, int(fields[1])?, int(fields[2])?);
    let valid_date = i32::try_from(year).ok().and_then(|year| {
        NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
    });
    if valid_date.is_none() {
        return Err(format!("invalid date {year}-{month}-{day}"));
    }
    let tai_offset = float(fields[3])?;
    let drift_mjd = float(fields[4])?;
    if drift_mjd.fract() != 0.0 || !drift_mjd.is_finite() {
        return Err("drift offset is expected to be an integer MJD".to_string());
    }
    let drift_slope = float(fields[5])?;

    Ok(LeapSecondRecord::from_cdf_values(
        date_to_day2k(year, month, day),
        tai_offset,
        drift_mjd as i64,
        drift_slope,
    ))
}
