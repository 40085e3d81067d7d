// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Time intervals and the ordered interval index.
//!
//! This module provides:
//! - [`Interval`]: a half-open `[start, end)` span of canonical time
//! - [`complement_within`] / [`intersect_intervals`]: linear set operations
//!   over sorted, non-overlapping interval lists
//! - [`OrderedIntervals<P>`]: a sorted, disjoint, array-backed interval
//!   collection carrying one payload per interval, with whole-interval
//!   eviction on insert

use crate::error::{Error, Result};
use crate::instant::Time;
use chrono::Duration;
use std::fmt;

/// Represents a half-open interval `[start, end)` between two instants.
///
/// # Examples
///
/// ```
/// use orbit_lookup::{Interval, Time};
///
/// let start = Time::parse("2020-01-01T00:00:00Z").unwrap();
/// let end = Time::parse("2020-01-01T01:00:00Z").unwrap();
/// let interval = Interval::new(start, end);
///
/// assert_eq!(interval.duration(), chrono::Duration::hours(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: Time,
    pub end: Time,
}

impl Interval {
    /// Creates a new interval between two instants.
    pub const fn new(start: Time, end: Time) -> Self {
        Interval { start, end }
    }

    /// Creates a new interval, rejecting reversed or invalid bounds.
    pub fn checked(start: Time, end: Time) -> Result<Self> {
        if !start.is_valid() || !end.is_valid() {
            return Err(Error::invalid_input("interval bounds must be valid times"));
        }
        if start > end {
            return Err(Error::invalid_input(format!(
                "interval start {start} is after its end {end}"
            )));
        }
        Ok(Interval { start, end })
    }

    /// Returns the duration of the interval.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `true` when the interval contains no instant.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `true` when `time` lies in `[start, end)`.
    pub fn contains(&self, time: Time) -> bool {
        self.start <= time && time < self.end
    }

    /// `true` when the two half-open intervals share at least one instant.
    pub fn intersects(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns the overlapping sub-interval between `self` and `other`.
    ///
    /// Intervals are treated as half-open ranges `[start, end)`: if one
    /// interval ends exactly when the other starts, the intersection is empty
    /// and `None` is returned.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.latest(other.start);
        let end = self.end.earliest(other.end);

        if start < end {
            Some(Self::new(start, end))
        } else {
            None
        }
    }

    /// Smallest interval covering both `self` and `other`.
    pub fn hull(&self, other: &Self) -> Self {
        Self::new(self.start.earliest(other.start), self.end.latest(other.end))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Returns the gaps (complement) of `intervals` within the bounding `outer` interval.
///
/// Given a sorted, non-overlapping list of sub-intervals and a bounding
/// interval, this returns the time spans NOT covered by any sub-interval.
/// The function runs in O(n) time with a single pass.
pub fn complement_within(outer: Interval, intervals: &[Interval]) -> Vec<Interval> {
    let mut gaps = Vec::new();
    let mut cursor = outer.start;
    for interval in intervals {
        if interval.start > cursor {
            gaps.push(Interval::new(cursor, interval.start.earliest(outer.end)));
        }
        if interval.end > cursor {
            cursor = interval.end;
        }
        if cursor >= outer.end {
            break;
        }
    }
    if cursor < outer.end {
        gaps.push(Interval::new(cursor, outer.end));
    }
    gaps.retain(|gap| !gap.is_empty());
    gaps
}

/// Returns the intersection of two sorted, non-overlapping interval lists.
///
/// Uses an O(n+m) merge to find all overlapping spans.
pub fn intersect_intervals(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if let Some(overlap) = a[i].intersection(&b[j]) {
            result.push(overlap);
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

// ═══════════════════════════════════════════════════════════════════════════
// OrderedIntervals
// ═══════════════════════════════════════════════════════════════════════════

/// An interval together with the payload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalEntry<P> {
    pub interval: Interval,
    pub payload: P,
}

/// Sorted, mutually disjoint half-open intervals with one payload each.
///
/// Storage is three parallel vectors (`starts`, `ends`, `payloads`); the
/// affected index range of every insert/remove is located by binary search
/// over `starts` and `ends`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedIntervals<P> {
    starts: Vec<Time>,
    ends: Vec<Time>,
    payloads: Vec<P>,
}

impl<P> Default for OrderedIntervals<P> {
    fn default() -> Self {
        Self {
            starts: Vec::new(),
            ends: Vec::new(),
            payloads: Vec::new(),
        }
    }
}

impl<P> OrderedIntervals<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from parallel columns (e.g. decoded from a table file).
    ///
    /// The result is verified before it is returned.
    pub fn from_parts(starts: Vec<Time>, ends: Vec<Time>, payloads: Vec<P>) -> Result<Self> {
        let intervals = Self {
            starts,
            ends,
            payloads,
        };
        intervals.verify()?;
        Ok(intervals)
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn starts(&self) -> &[Time] {
        &self.starts
    }

    pub fn ends(&self) -> &[Time] {
        &self.ends
    }

    pub fn payloads(&self) -> &[P] {
        &self.payloads
    }

    /// Interval and payload at `index`.
    pub fn get(&self, index: usize) -> Option<(Interval, &P)> {
        let payload = self.payloads.get(index)?;
        Some((Interval::new(self.starts[index], self.ends[index]), payload))
    }

    /// Iterate `(interval, payload)` in ascending start order.
    pub fn iter(&self) -> impl Iterator<Item = (Interval, &P)> + '_ {
        self.starts
            .iter()
            .zip(&self.ends)
            .zip(&self.payloads)
            .map(|((&start, &end), payload)| (Interval::new(start, end), payload))
    }

    /// Intervals only.
    pub fn intervals(&self) -> Vec<Interval> {
        self.iter().map(|(interval, _)| interval).collect()
    }

    /// Index range of the intervals intersecting `[start, end)`.
    ///
    /// An empty query interval selects any interval strictly containing its
    /// instant.
    pub fn overlapping(&self, start: Time, end: Time) -> std::ops::Range<usize> {
        let first = self.ends.partition_point(|&e| e <= start);
        let last = self.starts.partition_point(|&s| s < end).max(first);
        first..last
    }

    /// Position of the first interval carrying `payload`.
    pub fn position(&self, payload: &P) -> Option<usize>
    where
        P: PartialEq,
    {
        self.payloads.iter().position(|p| p == payload)
    }

    /// Insert `[start, end)`, evicting every interval it intersects.
    ///
    /// Returns the evicted entries in ascending order.
    pub fn insert(&mut self, start: Time, end: Time, payload: P) -> Result<Vec<IntervalEntry<P>>> {
        let interval = Interval::checked(start, end)?;
        let range = self.overlapping(start, end);
        let index = range.start;
        let evicted = self.drain(range);
        self.starts.insert(index, interval.start);
        self.ends.insert(index, interval.end);
        self.payloads.insert(index, payload);
        Ok(evicted)
    }

    /// Remove every interval intersecting `[start, end)`.
    ///
    /// Returns the removed entries in ascending order.
    pub fn remove(&mut self, start: Time, end: Time) -> Result<Vec<IntervalEntry<P>>> {
        Interval::checked(start, end)?;
        let range = self.overlapping(start, end);
        Ok(self.drain(range))
    }

    /// Remove the interval at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<IntervalEntry<P>> {
        if index >= self.len() {
            return None;
        }
        self.drain(index..index + 1).pop()
    }

    fn drain(&mut self, range: std::ops::Range<usize>) -> Vec<IntervalEntry<P>> {
        let starts = self.starts.drain(range.clone());
        let ends = self.ends.drain(range.clone());
        let payloads = self.payloads.drain(range);
        starts
            .zip(ends)
            .zip(payloads)
            .map(|((start, end), payload)| IntervalEntry {
                interval: Interval::new(start, end),
                payload,
            })
            .collect()
    }

    /// Check lengths, ordering and disjointness.
    pub fn verify(&self) -> Result<()> {
        if self.starts.len() != self.ends.len() || self.starts.len() != self.payloads.len() {
            return Err(Error::integrity(format!(
                "interval columns differ in length: {} starts, {} ends, {} payloads",
                self.starts.len(),
                self.ends.len(),
                self.payloads.len()
            )));
        }
        for (index, (&start, &end)) in self.starts.iter().zip(&self.ends).enumerate() {
            if !start.is_valid() || !end.is_valid() {
                return Err(Error::integrity(format!("interval #{index} has an invalid bound")));
            }
            if start > end {
                return Err(Error::integrity(format!(
                    "interval #{index} starts after it ends ({start} > {end})"
                )));
            }
        }
        for index in 1..self.starts.len() {
            if self.ends[index - 1] > self.starts[index] {
                return Err(Error::integrity(format!(
                    "intervals #{} and #{index} overlap or are not sorted",
                    index - 1
                )));
            }
        }
        Ok(())
    }
}
