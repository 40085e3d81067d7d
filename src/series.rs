// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Output and input series.
//!
//! | Type | Columns | Used by |
//! |------|---------|---------|
//! | [`OrbitDirectionSeries`] | `times`, `directions`, `boundaries` | orbit-direction tables |
//! | [`ConjunctionSeries`] | `times`, `separations` (deg) | conjunction tables |
//! | [`OrbitSamples`] | `times`, `latitudes`, `longitudes`, `radii` | extractors (input) |
//!
//! Both output series implement [`SeriesData`], the column-agnostic surface
//! the lookup table needs to split, splice, cut and verify its data.
//!
//! # Orbit-direction blocks
//!
//! An orbit-direction series is a sequence of self-contained *blocks*. Each
//! block opens with a [`BoundaryType::Start`] point, contains any number of
//! [`BoundaryType::Middle`] points (direction inversions) and closes with a
//! [`BoundaryType::End`] point. The direction stored at a point is the
//! direction in effect *after* it; inside a block directions alternate and
//! are never [`OrbitDirection::Undefined`]. A block consisting of a single
//! START immediately followed by its END may carry an undefined direction
//! (a run too short to tell the direction).

use crate::error::{Error, Result};
use crate::instant::Time;
use chrono::Duration;
use std::fmt;
use std::ops::{Bound, Range};

/// Separation tolerance (degrees) applied by [`ConjunctionSeries`] range checks.
pub const SEPARATION_TOLERANCE: f64 = 1e-6;

// ═══════════════════════════════════════════════════════════════════════════
// Flags
// ═══════════════════════════════════════════════════════════════════════════

/// Orbit direction after a point (persisted as `int8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum OrbitDirection {
    Descending = -1,
    #[default]
    Undefined = 0,
    Ascending = 1,
}

impl OrbitDirection {
    /// Direction implied by the sign of a slope (`true` = rising).
    #[inline]
    pub const fn from_rising(rising: bool) -> Self {
        if rising {
            OrbitDirection::Ascending
        } else {
            OrbitDirection::Descending
        }
    }

    /// The opposite direction; undefined stays undefined.
    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            OrbitDirection::Ascending => OrbitDirection::Descending,
            OrbitDirection::Descending => OrbitDirection::Ascending,
            OrbitDirection::Undefined => OrbitDirection::Undefined,
        }
    }

    /// One-letter label used by table dumps.
    pub const fn label(self) -> &'static str {
        match self {
            OrbitDirection::Ascending => "A",
            OrbitDirection::Descending => "D",
            OrbitDirection::Undefined => "?",
        }
    }
}

impl From<OrbitDirection> for i8 {
    #[inline]
    fn from(value: OrbitDirection) -> Self {
        value as i8
    }
}

impl TryFrom<i8> for OrbitDirection {
    type Error = Error;

    fn try_from(value: i8) -> Result<Self> {
        match value {
            -1 => Ok(OrbitDirection::Descending),
            0 => Ok(OrbitDirection::Undefined),
            1 => Ok(OrbitDirection::Ascending),
            other => Err(Error::invalid_input(format!("invalid orbit direction flag {other}"))),
        }
    }
}

/// Position of a point within its block (persisted as `int8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum BoundaryType {
    End = -1,
    #[default]
    Middle = 0,
    Start = 1,
}

impl BoundaryType {
    pub const fn label(self) -> &'static str {
        match self {
            BoundaryType::Start => "START",
            BoundaryType::End => "END",
            BoundaryType::Middle => "",
        }
    }
}

impl From<BoundaryType> for i8 {
    #[inline]
    fn from(value: BoundaryType) -> Self {
        value as i8
    }
}

impl TryFrom<i8> for BoundaryType {
    type Error = Error;

    fn try_from(value: i8) -> Result<Self> {
        match value {
            -1 => Ok(BoundaryType::End),
            0 => Ok(BoundaryType::Middle),
            1 => Ok(BoundaryType::Start),
            other => Err(Error::invalid_input(format!("invalid boundary type flag {other}"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SeriesData
// ═══════════════════════════════════════════════════════════════════════════

/// Column-agnostic operations over a time-ordered output series.
pub trait SeriesData: Clone + Default + fmt::Debug + PartialEq {
    /// Time column.
    fn times(&self) -> &[Time];

    /// Mutable time column; the caller keeps the rows ordered.
    fn times_mut(&mut self) -> &mut [Time];

    /// Copy of the rows in `range`.
    fn slice(&self, range: Range<usize>) -> Self;

    /// Append all rows of `other`.
    fn append(&mut self, other: &Self);

    /// Check the series invariants; any violation is a data-integrity error.
    fn verify(&self) -> Result<()>;

    /// Rows in `[start, end)` (either side may be open), with block
    /// boundaries regenerated where the bounds cut through a block.
    fn trim(&self, start: Option<Time>, end: Option<Time>) -> Self;

    /// One human-readable line per row.
    fn format_row(&self, index: usize) -> String;

    /// Reject splices that would put two block starts or two block ends
    /// next to each other.
    fn check_splice(_head: &Self, _body: &Self, _tail: &Self) -> Result<()> {
        Ok(())
    }

    /// `true` when the last row leaves a block open.
    fn open_at_end(&self) -> bool {
        false
    }

    /// `true` when the first row continues a block opened earlier.
    fn open_at_start(&self) -> bool {
        false
    }

    /// Rows in `[start, end]` to be spliced into a table.
    ///
    /// `close_start`/`close_end` request synthetic boundaries where the cut
    /// falls inside a block and no neighbouring data continues it.
    fn splice_body(&self, start: Time, end: Time, _close_start: bool, _close_end: bool) -> Self {
        self.subset(Bound::Included(start), Bound::Included(end))
    }

    #[inline]
    fn len(&self) -> usize {
        self.times().len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.times().is_empty()
    }

    /// First and last time stamp.
    fn time_extent(&self) -> Option<(Time, Time)> {
        Some((*self.times().first()?, *self.times().last()?))
    }

    /// Index range selected by the given bounds (no boundary regeneration).
    fn range_of(&self, start: Bound<Time>, end: Bound<Time>) -> Range<usize> {
        let times = self.times();
        let first = match start {
            Bound::Included(t) => times.partition_point(|&x| x < t),
            Bound::Excluded(t) => times.partition_point(|&x| x <= t),
            Bound::Unbounded => 0,
        };
        let last = match end {
            Bound::Included(t) => times.partition_point(|&x| x <= t),
            Bound::Excluded(t) => times.partition_point(|&x| x < t),
            Bound::Unbounded => times.len(),
        };
        first..last.max(first)
    }

    /// Copy with every time rounded to a multiple of `step`.
    ///
    /// Rows closer than `step` may collapse onto one instant; `verify`
    /// reports them as duplicates.
    fn rounded_to(&self, step: Duration) -> Self {
        let mut result = self.clone();
        for time in result.times_mut() {
            *time = time.round_to(step);
        }
        result
    }

    /// Plain temporal subset (no boundary regeneration).
    fn subset(&self, start: Bound<Time>, end: Bound<Time>) -> Self {
        self.slice(self.range_of(start, end))
    }

    /// Remove the rows in `[start, end)`, closing the block cut open on the
    /// left with a synthetic END at `start` and reopening the block cut open
    /// on the right with a synthetic START at `end`.
    fn cut_out(&self, start: Time, end: Time) -> Self {
        if start >= end {
            return self.clone();
        }
        let mut result = self.trim(None, Some(start));
        result.append(&self.trim(Some(end), None));
        result
    }

    /// Join several series in order.
    fn concat(parts: &[&Self]) -> Self {
        let mut result = Self::default();
        for part in parts {
            result.append(part);
        }
        result
    }
}

fn check_strictly_increasing(times: &[Time]) -> Result<()> {
    for (index, pair) in times.windows(2).enumerate() {
        if pair[1] < pair[0] {
            return Err(Error::integrity(format!(
                "Times are not ordered ({} before {} at #{}).",
                pair[0],
                pair[1],
                index + 1
            )));
        }
        if pair[1] == pair[0] {
            return Err(Error::integrity(format!(
                "Duplicate times found ({} at #{}).",
                pair[0],
                index + 1
            )));
        }
    }
    if times.first().is_some_and(|t| !t.is_valid()) {
        return Err(Error::integrity("Invalid time stamp in the series."));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// OrbitDirectionSeries
// ═══════════════════════════════════════════════════════════════════════════

/// One row of an [`OrbitDirectionSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionPoint {
    pub time: Time,
    pub direction: OrbitDirection,
    pub boundary: BoundaryType,
}

/// Orbit-direction inversion points grouped into START/END blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrbitDirectionSeries {
    times: Vec<Time>,
    directions: Vec<OrbitDirection>,
    boundaries: Vec<BoundaryType>,
}

impl OrbitDirectionSeries {
    /// Build from parallel columns of equal length.
    pub fn new(
        times: Vec<Time>,
        directions: Vec<OrbitDirection>,
        boundaries: Vec<BoundaryType>,
    ) -> Result<Self> {
        if times.len() != directions.len() || times.len() != boundaries.len() {
            return Err(Error::invalid_input(format!(
                "column length mismatch: {} times, {} directions, {} boundaries",
                times.len(),
                directions.len(),
                boundaries.len()
            )));
        }
        Ok(Self {
            times,
            directions,
            boundaries,
        })
    }

    /// Single block-start point.
    pub fn block_start(time: Time, direction: OrbitDirection) -> Self {
        Self {
            times: vec![time],
            directions: vec![direction],
            boundaries: vec![BoundaryType::Start],
        }
    }

    /// Single block-end point.
    pub fn block_end(time: Time) -> Self {
        Self {
            times: vec![time],
            directions: vec![OrbitDirection::Undefined],
            boundaries: vec![BoundaryType::End],
        }
    }

    pub fn directions(&self) -> &[OrbitDirection] {
        &self.directions
    }

    pub fn boundaries(&self) -> &[BoundaryType] {
        &self.boundaries
    }

    /// Row at `index`.
    pub fn get(&self, index: usize) -> Option<DirectionPoint> {
        Some(DirectionPoint {
            time: *self.times.get(index)?,
            direction: self.directions[index],
            boundary: self.boundaries[index],
        })
    }

    pub fn first(&self) -> Option<DirectionPoint> {
        self.get(0)
    }

    pub fn last(&self) -> Option<DirectionPoint> {
        self.get(self.times.len().checked_sub(1)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = DirectionPoint> + '_ {
        (0..self.times.len()).filter_map(|index| self.get(index))
    }

    /// Append one row.
    pub fn push(&mut self, time: Time, direction: OrbitDirection, boundary: BoundaryType) {
        self.times.push(time);
        self.directions.push(direction);
        self.boundaries.push(boundary);
    }

    /// Index ranges of the blocks, END included.
    pub fn blocks(&self) -> Vec<Range<usize>> {
        let mut blocks = Vec::new();
        let mut open = None;
        for (index, boundary) in self.boundaries.iter().enumerate() {
            match boundary {
                BoundaryType::Start => open = Some(index),
                BoundaryType::End => {
                    if let Some(start) = open.take() {
                        blocks.push(start..index + 1);
                    }
                }
                BoundaryType::Middle => {}
            }
        }
        blocks
    }

    /// Direction in effect just before row `index`.
    fn direction_before(&self, index: usize) -> OrbitDirection {
        match index.checked_sub(1) {
            Some(prev) if self.boundaries[prev] != BoundaryType::End => self.directions[prev],
            _ => OrbitDirection::Undefined,
        }
    }
}

impl SeriesData for OrbitDirectionSeries {
    fn times(&self) -> &[Time] {
        &self.times
    }

    fn times_mut(&mut self) -> &mut [Time] {
        &mut self.times
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            times: self.times[range.clone()].to_vec(),
            directions: self.directions[range.clone()].to_vec(),
            boundaries: self.boundaries[range].to_vec(),
        }
    }

    fn append(&mut self, other: &Self) {
        self.times.extend_from_slice(&other.times);
        self.directions.extend_from_slice(&other.directions);
        self.boundaries.extend_from_slice(&other.boundaries);
    }

    fn verify(&self) -> Result<()> {
        if self.times.len() != self.directions.len() || self.times.len() != self.boundaries.len() {
            return Err(Error::integrity("Data size mismatch."));
        }
        check_strictly_increasing(&self.times)?;

        // Block boundaries alternate START, END, START, ... and an END is
        // always immediately followed by a START.
        let mut expected = BoundaryType::Start;
        let mut last_end: Option<usize> = None;
        let mut block_start = 0;
        for (index, &boundary) in self.boundaries.iter().enumerate() {
            if boundary == BoundaryType::Middle {
                if expected == BoundaryType::Start {
                    return Err(Error::integrity(format!(
                        "Wrong block boundaries! Point #{index} lies outside of a block."
                    )));
                }
                continue;
            }
            if boundary != expected {
                return Err(Error::integrity(
                    "Wrong block boundaries! Starts and ends are not alternating.",
                ));
            }
            match boundary {
                BoundaryType::Start => {
                    if last_end.is_some_and(|end| end + 1 != index) {
                        return Err(Error::integrity(
                            "Wrong block boundaries! An end is not followed by a start!",
                        ));
                    }
                    block_start = index;
                    expected = BoundaryType::End;
                }
                _ => {
                    verify_block_directions(&self.directions[block_start..index])?;
                    last_end = Some(index);
                    expected = BoundaryType::Start;
                }
            }
        }
        if expected == BoundaryType::End {
            return Err(Error::integrity(
                "Wrong block boundaries! Starts and ends are not alternating.",
            ));
        }
        Ok(())
    }

    fn trim(&self, start: Option<Time>, end: Option<Time>) -> Self {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Self::default();
            }
        }
        let len = self.times.len();
        let mut index = start.map_or(0, |s| self.times.partition_point(|&t| t < s));
        let stop = end.map_or(len, |e| self.times.partition_point(|&t| t < e));

        let mut result = Self::default();
        if let Some(start) = start {
            if index < len {
                match self.boundaries[index] {
                    BoundaryType::Start => {}
                    BoundaryType::Middle if self.times[index] == start => {
                        result.push(start, self.directions[index], BoundaryType::Start);
                        index += 1;
                    }
                    BoundaryType::End if self.times[index] == start => index += 1,
                    _ => result.push(start, self.direction_before(index), BoundaryType::Start),
                }
            }
        }
        if index < stop {
            result.append(&self.slice(index..stop));
        }
        if let Some(end) = end {
            if result.boundaries.last().is_some_and(|&b| b != BoundaryType::End) {
                result.push(end, OrbitDirection::Undefined, BoundaryType::End);
            }
        }
        result
    }

    fn format_row(&self, index: usize) -> String {
        match self.get(index) {
            Some(point) => format!(
                "{} {} {}",
                point.time,
                point.direction.label(),
                point.boundary.label()
            )
            .trim_end()
            .to_string(),
            None => String::new(),
        }
    }

    fn check_splice(head: &Self, body: &Self, tail: &Self) -> Result<()> {
        if body.is_empty() {
            return check_splice_edge(head.last(), tail.first(), "head and tail");
        }
        check_splice_edge(head.last(), body.first(), "head and new data")?;
        check_splice_edge(body.last(), tail.first(), "new data and tail")
    }

    fn open_at_end(&self) -> bool {
        self.last().is_some_and(|p| p.boundary != BoundaryType::End)
    }

    fn open_at_start(&self) -> bool {
        self.first().is_some_and(|p| p.boundary != BoundaryType::Start)
    }

    fn splice_body(&self, start: Time, end: Time, close_start: bool, close_end: bool) -> Self {
        self.trim(close_start.then_some(start), close_end.then_some(end))
            .subset(Bound::Included(start), Bound::Included(end))
    }
}

/// Rows meeting at a splice edge must neither open a block inside an open
/// one nor continue a block that is already closed.
fn check_splice_edge(
    before: Option<DirectionPoint>,
    after: Option<DirectionPoint>,
    edge: &str,
) -> Result<()> {
    let (Some(before), Some(after)) = (before, after) else {
        return Ok(());
    };
    let open = before.boundary != BoundaryType::End;
    match (open, after.boundary) {
        (true, BoundaryType::Start) => Err(Error::integrity(format!(
            "Unexpected segment start between {edge} at {}.",
            after.time
        ))),
        (false, BoundaryType::End) => Err(Error::integrity(format!(
            "Unexpected segment end between {edge} at {}.",
            after.time
        ))),
        (false, BoundaryType::Middle) => Err(Error::integrity(format!(
            "Point outside of a segment between {edge} at {}.",
            after.time
        ))),
        _ => Ok(()),
    }
}

/// Directions of one block (START included, END excluded).
fn verify_block_directions(directions: &[OrbitDirection]) -> Result<()> {
    if directions.len() == 1 {
        // START immediately followed by END, direction may be unknown.
        return Ok(());
    }
    if directions.contains(&OrbitDirection::Undefined) || directions.windows(2).any(|w| w[0] == w[1]) {
        return Err(Error::integrity("Orbit direction do not alternate!"));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// ConjunctionSeries
// ═══════════════════════════════════════════════════════════════════════════

/// Detected conjunction instants with their angular separation in degrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConjunctionSeries {
    times: Vec<Time>,
    separations: Vec<f64>,
}

impl ConjunctionSeries {
    pub fn new(times: Vec<Time>, separations: Vec<f64>) -> Result<Self> {
        if times.len() != separations.len() {
            return Err(Error::invalid_input(format!(
                "column length mismatch: {} times, {} separations",
                times.len(),
                separations.len()
            )));
        }
        Ok(Self { times, separations })
    }

    pub fn separations(&self) -> &[f64] {
        &self.separations
    }

    pub fn push(&mut self, time: Time, separation: f64) {
        self.times.push(time);
        self.separations.push(separation);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Time, f64)> + '_ {
        self.times.iter().copied().zip(self.separations.iter().copied())
    }
}

impl SeriesData for ConjunctionSeries {
    fn times(&self) -> &[Time] {
        &self.times
    }

    fn times_mut(&mut self) -> &mut [Time] {
        &mut self.times
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            times: self.times[range.clone()].to_vec(),
            separations: self.separations[range].to_vec(),
        }
    }

    fn append(&mut self, other: &Self) {
        self.times.extend_from_slice(&other.times);
        self.separations.extend_from_slice(&other.separations);
    }

    fn verify(&self) -> Result<()> {
        if self.times.len() != self.separations.len() {
            return Err(Error::integrity("Data size mismatch."));
        }
        check_strictly_increasing(&self.times)?;
        let limits = -SEPARATION_TOLERANCE..=180.0 + SEPARATION_TOLERANCE;
        if let Some(value) = self.separations.iter().find(|v| !limits.contains(*v)) {
            return Err(Error::integrity(format!("Data range exceeded ({value} deg).")));
        }
        Ok(())
    }

    fn trim(&self, start: Option<Time>, end: Option<Time>) -> Self {
        let start = start.map_or(Bound::Unbounded, Bound::Included);
        let end = end.map_or(Bound::Unbounded, Bound::Excluded);
        self.subset(start, end)
    }

    fn format_row(&self, index: usize) -> String {
        match (self.times.get(index), self.separations.get(index)) {
            (Some(time), Some(separation)) => format!("{time} {separation:6.3}"),
            _ => String::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// OrbitSamples
// ═══════════════════════════════════════════════════════════════════════════

/// Spacecraft positions as read from an input product.
///
/// Latitudes and longitudes are in degrees, radii in metres.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbitSamples {
    pub times: Vec<Time>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub radii: Vec<f64>,
}

impl OrbitSamples {
    /// Build from parallel columns; times must be strictly increasing.
    pub fn new(
        times: Vec<Time>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        radii: Vec<f64>,
    ) -> Result<Self> {
        let n = times.len();
        if latitudes.len() != n || longitudes.len() != n || radii.len() != n {
            return Err(Error::invalid_input(format!(
                "sample column length mismatch: {n} times, {} latitudes, {} longitudes, {} radii",
                latitudes.len(),
                longitudes.len(),
                radii.len()
            )));
        }
        if times.iter().any(|t| !t.is_valid()) {
            return Err(Error::invalid_input("samples contain an invalid time"));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::invalid_input("sample times are not strictly increasing"));
        }
        Ok(Self {
            times,
            latitudes,
            longitudes,
            radii,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Copy of the samples in `range`.
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            times: self.times[range.clone()].to_vec(),
            latitudes: self.latitudes[range.clone()].to_vec(),
            longitudes: self.longitudes[range.clone()].to_vec(),
            radii: self.radii[range].to_vec(),
        }
    }

    /// First `count` samples.
    pub fn head(&self, count: usize) -> Self {
        self.slice(0..count.min(self.len()))
    }

    /// Last `count` samples.
    pub fn tail(&self, count: usize) -> Self {
        self.slice(self.len().saturating_sub(count)..self.len())
    }

    /// Samples with `start <= time < end`.
    pub fn between(&self, start: Time, end: Time) -> Self {
        let first = self.times.partition_point(|&t| t < start);
        let last = self.times.partition_point(|&t| t < end).max(first);
        self.slice(first..last)
    }

    /// Concatenate consecutive sample sets, checking that times keep
    /// strictly increasing across the joins.
    pub fn join(parts: &[&Self]) -> Result<Self> {
        let mut result = Self::default();
        for part in parts {
            if let (Some(&last), Some(&first)) = (result.times.last(), part.times.first()) {
                if first <= last {
                    return Err(Error::invalid_input(format!(
                        "joined samples overlap ({first} follows {last})"
                    )));
                }
            }
            result.times.extend_from_slice(&part.times);
            result.latitudes.extend_from_slice(&part.latitudes);
            result.longitudes.extend_from_slice(&part.longitudes);
            result.radii.extend_from_slice(&part.radii);
        }
        Ok(result)
    }

    /// Same positions with the latitude column replaced.
    pub fn with_latitudes(&self, latitudes: Vec<f64>) -> Result<Self> {
        Self::new(
            self.times.clone(),
            latitudes,
            self.longitudes.clone(),
            self.radii.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::BoundaryType::{End, Middle, Start};
    use super::OrbitDirection::{Ascending as A, Descending as D, Undefined as U};

    fn t(seconds: i64) -> Time {
        Time::from_seconds(seconds).unwrap()
    }

    fn series(rows: &[(i64, OrbitDirection, BoundaryType)]) -> OrbitDirectionSeries {
        let mut result = OrbitDirectionSeries::default();
        for &(time, direction, boundary) in rows {
            result.push(t(time), direction, boundary);
        }
        result
    }

    fn rows(series: &OrbitDirectionSeries) -> Vec<(i64, OrbitDirection, BoundaryType)> {
        series
            .iter()
            .map(|p| (p.time.nanos() / 1_000_000_000, p.direction, p.boundary))
            .collect()
    }

    #[test]
    fn test_flag_conversions() {
        assert_eq!(i8::from(OrbitDirection::Ascending), 1);
        assert_eq!(i8::from(BoundaryType::End), -1);
        assert_eq!(OrbitDirection::try_from(-1).unwrap(), D);
        assert_eq!(BoundaryType::try_from(1).unwrap(), Start);
        assert!(OrbitDirection::try_from(2).is_err());
        assert!(BoundaryType::try_from(-2).is_err());
        assert_eq!(A.reversed(), D);
        assert_eq!(U.reversed(), U);
    }

    #[test]
    fn test_verify_accepts_valid_blocks() {
        let data = series(&[
            (0, A, Start),
            (10, D, Middle),
            (20, A, Middle),
            (30, U, End),
            (40, D, Start),
            (50, U, End),
        ]);
        data.verify().unwrap();
        assert_eq!(data.blocks(), vec![0..4, 4..6]);
        OrbitDirectionSeries::default().verify().unwrap();
    }

    #[test]
    fn test_verify_accepts_degenerate_block() {
        series(&[(0, U, Start), (1, U, End)]).verify().unwrap();
    }

    #[test]
    fn test_verify_rejects_broken_series() {
        let cases = [
            series(&[(0, A, Start), (10, A, Middle), (20, U, End)]),
            series(&[(0, A, Start), (10, U, Middle), (20, U, End)]),
            series(&[(0, A, Start), (10, D, Start), (20, U, End)]),
            series(&[(0, A, Start), (10, D, Middle)]),
            series(&[(0, A, Middle), (10, U, End)]),
            series(&[(0, A, Start), (10, U, End), (15, A, Middle), (20, D, Start), (30, U, End)]),
            series(&[(0, A, Start), (0, D, Middle), (20, U, End)]),
            series(&[(0, A, Start), (20, D, Middle), (10, U, End)]),
        ];
        for (index, case) in cases.iter().enumerate() {
            assert!(
                matches!(case.verify(), Err(Error::DataIntegrity(_))),
                "case #{index} should fail verification"
            );
        }
    }

    #[test]
    fn test_trim_inside_block_regenerates_boundaries() {
        let data = series(&[
            (0, A, Start),
            (10, D, Middle),
            (20, A, Middle),
            (30, D, Middle),
            (40, U, End),
        ]);
        let trimmed = data.trim(Some(t(15)), Some(t(25)));
        assert_eq!(rows(&trimmed), vec![(15, D, Start), (20, A, Middle), (25, U, End)]);
        trimmed.verify().unwrap();
    }

    #[test]
    fn test_trim_on_middle_point_converts_it() {
        let data = series(&[(0, A, Start), (10, D, Middle), (20, A, Middle), (40, U, End)]);
        let trimmed = data.trim(Some(t(10)), None);
        assert_eq!(rows(&trimmed), vec![(10, D, Start), (20, A, Middle), (40, U, End)]);
        trimmed.verify().unwrap();
    }

    #[test]
    fn test_trim_on_block_end_drops_it() {
        let data = series(&[(0, A, Start), (10, U, End), (20, D, Start), (30, U, End)]);
        let trimmed = data.trim(Some(t(10)), None);
        assert_eq!(rows(&trimmed), vec![(20, D, Start), (30, U, End)]);
    }

    #[test]
    fn test_trim_window_without_points_inside_block() {
        let data = series(&[(0, A, Start), (100, U, End)]);
        let trimmed = data.trim(Some(t(40)), Some(t(60)));
        assert_eq!(rows(&trimmed), vec![(40, A, Start), (60, U, End)]);
        assert!(data.trim(Some(t(60)), Some(t(40))).is_empty());
    }

    #[test]
    fn test_cut_out_inserts_synthetic_boundaries() {
        let data = series(&[
            (0, A, Start),
            (10, D, Middle),
            (20, A, Middle),
            (30, D, Middle),
            (40, U, End),
        ]);
        let cut = data.cut_out(t(15), t(25));
        assert_eq!(
            rows(&cut),
            vec![
                (0, A, Start),
                (10, D, Middle),
                (15, U, End),
                (25, A, Start),
                (30, D, Middle),
                (40, U, End),
            ]
        );
        cut.verify().unwrap();
    }

    #[test]
    fn test_cut_out_whole_blocks() {
        let data = series(&[(0, A, Start), (10, U, End), (10 + 1, D, Start), (20, U, End)]);
        let cut = data.cut_out(t(0), t(11));
        assert_eq!(rows(&cut), vec![(11, D, Start), (20, U, End)]);
        assert_eq!(data.cut_out(t(5), t(5)), data);
    }

    #[test]
    fn test_check_splice() {
        let head = series(&[(0, A, Start), (10, D, Middle)]);
        let body = series(&[(20, A, Start), (30, U, End)]);
        let tail = series(&[(40, D, Middle), (50, U, End)]);
        let empty = OrbitDirectionSeries::default();
        assert!(OrbitDirectionSeries::check_splice(&head, &body, &empty).is_err());
        assert!(OrbitDirectionSeries::check_splice(&empty, &body, &tail).is_err());
        let closed = series(&[(0, A, Start), (10, U, End)]);
        OrbitDirectionSeries::check_splice(&closed, &body, &empty).unwrap();
        OrbitDirectionSeries::check_splice(&head, &empty, &tail).unwrap();
    }

    #[test]
    fn test_check_splice_names_the_edge() {
        let closed = series(&[(0, A, Start), (10, U, End)]);
        let open = series(&[(0, A, Start), (10, D, Middle)]);
        let empty = OrbitDirectionSeries::default();

        // END followed by END
        let ending = series(&[(20, U, End)]);
        let err = OrbitDirectionSeries::check_splice(&closed, &ending, &empty).unwrap_err();
        assert!(matches!(&err, Error::DataIntegrity(m) if m.contains("end between head and new data")));

        // START followed by START
        let starting = series(&[(60, D, Start), (70, U, End)]);
        let err = OrbitDirectionSeries::check_splice(&empty, &open, &starting).unwrap_err();
        assert!(matches!(&err, Error::DataIntegrity(m) if m.contains("start between new data and tail")));

        // continuation of a closed block across an empty body
        let middle = series(&[(30, D, Middle), (40, U, End)]);
        let err = OrbitDirectionSeries::check_splice(&closed, &empty, &middle).unwrap_err();
        assert!(matches!(&err, Error::DataIntegrity(m) if m.contains("outside of a segment between head and tail")));
    }

    #[test]
    fn test_rounded_to() {
        let data = OrbitDirectionSeries::new(
            vec![Time::from_nanos(1_400_000), Time::from_nanos(2_600_001)],
            vec![A, U],
            vec![Start, End],
        )
        .unwrap();
        let rounded = data.rounded_to(Duration::milliseconds(1));
        assert_eq!(rounded.times(), &[Time::from_nanos(1_000_000), Time::from_nanos(3_000_000)]);
        assert_eq!(rounded.directions(), data.directions());

        let close = ConjunctionSeries::new(
            vec![Time::from_nanos(1_000_100), Time::from_nanos(1_000_200)],
            vec![1.0, 2.0],
        )
        .unwrap();
        assert!(close.verify().is_ok());
        assert!(close.rounded_to(Duration::milliseconds(1)).verify().is_err());
    }

    #[test]
    fn test_splice_body() {
        let data = series(&[(0, A, Start), (10, D, Middle), (20, A, Middle), (40, U, End)]);
        // continuing neighbours on both sides: plain inclusive cut
        let open = data.splice_body(t(5), t(20), false, false);
        assert_eq!(rows(&open), vec![(10, D, Middle), (20, A, Middle)]);
        assert!(open.open_at_start());
        assert!(open.open_at_end());
        // nothing to continue: blocks are closed at the window bounds
        let closed = data.splice_body(t(5), t(30), true, true);
        assert_eq!(
            rows(&closed),
            vec![(5, A, Start), (10, D, Middle), (20, A, Middle), (30, U, End)]
        );
        closed.verify().unwrap();
        assert!(!closed.open_at_start());
        assert!(!closed.open_at_end());
    }

    #[test]
    fn test_subset_bounds() {
        let data = series(&[(0, A, Start), (10, D, Middle), (20, A, Middle), (30, U, End)]);
        let inner = data.subset(Bound::Excluded(t(0)), Bound::Included(t(20)));
        assert_eq!(rows(&inner), vec![(10, D, Middle), (20, A, Middle)]);
        let before = data.subset(Bound::Unbounded, Bound::Excluded(t(10)));
        assert_eq!(before.len(), 1);
        assert!(data.subset(Bound::Included(t(25)), Bound::Excluded(t(25))).is_empty());
    }

    #[test]
    fn test_conjunction_verify() {
        let good = ConjunctionSeries::new(vec![t(0), t(10)], vec![0.0, 180.0]).unwrap();
        good.verify().unwrap();

        let duplicate = ConjunctionSeries::new(vec![t(0), t(0)], vec![1.0, 2.0]).unwrap();
        assert!(duplicate.verify().is_err());
        let unordered = ConjunctionSeries::new(vec![t(10), t(0)], vec![1.0, 2.0]).unwrap();
        assert!(unordered.verify().is_err());
        let out_of_range = ConjunctionSeries::new(vec![t(0)], vec![180.1]).unwrap();
        assert!(out_of_range.verify().is_err());
        let nan = ConjunctionSeries::new(vec![t(0)], vec![f64::NAN]).unwrap();
        assert!(nan.verify().is_err());
        assert!(ConjunctionSeries::new(vec![t(0)], vec![]).is_err());
    }

    #[test]
    fn test_conjunction_cut_out_is_plain() {
        let data = ConjunctionSeries::new(vec![t(0), t(10), t(20)], vec![1.0, 2.0, 3.0]).unwrap();
        let cut = data.cut_out(t(5), t(20));
        assert_eq!(cut.times(), &[t(0), t(20)]);
        assert_eq!(cut.separations(), &[1.0, 3.0]);
    }

    #[test]
    fn test_samples_validation_and_join() {
        let a = OrbitSamples::new(vec![t(0), t(1)], vec![1.0, 2.0], vec![0.0; 2], vec![1.0; 2]).unwrap();
        let b = OrbitSamples::new(vec![t(2)], vec![3.0], vec![0.0], vec![1.0]).unwrap();
        let joined = OrbitSamples::join(&[&a, &b]).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.tail(2).times, vec![t(1), t(2)]);
        assert_eq!(joined.head(10).len(), 3);
        assert!(OrbitSamples::join(&[&b, &a]).is_err());
        assert!(OrbitSamples::new(vec![t(1), t(1)], vec![0.0; 2], vec![0.0; 2], vec![0.0; 2]).is_err());
        assert!(OrbitSamples::new(vec![t(1)], vec![0.0; 2], vec![0.0], vec![0.0]).is_err());
    }
}
