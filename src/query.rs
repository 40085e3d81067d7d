// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Read-side queries.
//!
//! | Query | Result |
//! |-------|--------|
//! | [`LookupTable::sources_in`] | source keys contributing to a time range |
//! | [`LookupTable::values_in`] | stored records with `start <= time < end` |
//! | [`LookupTable::coverage_gaps`] | parts of a range no source covers |
//! | [`direction_at`] / [`interpolate_directions`] | orbit direction, previous-value interpolation |
//! | [`MergedOrbitDirections`] | several orbit-direction tables merged by priority |
//!
//! Source ranges are widened before matching (see
//! [`buffer_source_ranges`]) so that a query falling between two
//! consecutive products still reports both of them.

use crate::config::NeighbourSettings;
use crate::error::{Error, Result};
use crate::instant::Time;
use crate::intervals::{complement_within, Interval};
use crate::merge::{resolve_overlaps, Segment};
use crate::series::{DirectionPoint, OrbitDirection, OrbitDirectionSeries, SeriesData};
use crate::storage::Columnar;
use crate::table::{LookupTable, OrbitDirectionTable, SourceKey};
use chrono::Duration;
use std::collections::BTreeSet;
use std::ops::Bound;

/// Tolerance (ms) of the neighbour-distance match.
const NEIGHBOUR_TOLERANCE_MS: f64 = 5.0;

// ═══════════════════════════════════════════════════════════════════════════
// Source ranges
// ═══════════════════════════════════════════════════════════════════════════

/// Widen provenance ranges for matching.
///
/// Two consecutive ranges separated by the neighbour distance (±5 ms) are
/// products following each other: both are widened by the overlap across
/// their common gap. Any other range end, and always the last one, is
/// extended by the neighbour distance.
pub fn buffer_source_ranges(ranges: &[Interval], neighbours: NeighbourSettings) -> Vec<Interval> {
    let distance = millis(neighbours.distance_ms);
    let overlap = millis(neighbours.overlap_ms);
    let mut buffered = ranges.to_vec();
    for index in 1..ranges.len() {
        let gap_ms = ranges[index].start.delta_seconds(ranges[index - 1].end).value() * 1e3;
        if (gap_ms - neighbours.distance_ms).abs() < NEIGHBOUR_TOLERANCE_MS {
            buffered[index - 1].end = buffered[index - 1].end + overlap;
            buffered[index].start = buffered[index].start - overlap;
        } else {
            buffered[index - 1].end = buffered[index - 1].end + distance;
        }
    }
    if let Some(last) = buffered.last_mut() {
        last.end = last.end + distance;
    }
    buffered
}

fn millis(value: f64) -> Duration {
    Duration::nanoseconds((value * 1e6).round() as i64)
}

/// Keys of the ranges with `range.end >= start` and `range.start < end`.
fn matching_sources<'a, K: Ord>(
    ranges: impl IntoIterator<Item = (Interval, &'a K)>,
    range: Interval,
) -> BTreeSet<&'a K>
where
    K: 'a,
{
    ranges
        .into_iter()
        .filter(|(source, _)| source.end >= range.start && source.start < range.end)
        .map(|(_, key)| key)
        .collect()
}

impl<S, K> LookupTable<S, K>
where
    S: SeriesData + Columnar,
    K: SourceKey,
{
    /// Provenance entries with their ranges widened by the table's
    /// neighbour settings.
    pub fn buffered_sources(&self) -> Vec<(Interval, &K)> {
        let ranges = buffer_source_ranges(&self.provenance().intervals(), self.neighbours());
        ranges.into_iter().zip(self.provenance().payloads()).collect()
    }

    /// Source keys contributing to `range`.
    pub fn sources_in(&self, range: Interval) -> BTreeSet<&K> {
        matching_sources(self.buffered_sources(), range)
    }

    /// Stored records with `range.start <= time < range.end`.
    pub fn values_in(&self, range: Interval) -> S {
        self.data()
            .subset(Bound::Included(range.start), Bound::Excluded(range.end))
    }

    /// Parts of `range` not covered by any provenance entry.
    pub fn coverage_gaps(&self, range: Interval) -> Vec<Interval> {
        complement_within(range, &self.provenance().intervals())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Orbit-direction interpolation
// ═══════════════════════════════════════════════════════════════════════════

/// The record in effect at `time`: the last one at or before it.
///
/// `None` before the first and after the last record.
pub fn point_at(series: &OrbitDirectionSeries, time: Time) -> Option<DirectionPoint> {
    let times = series.times();
    let (&first, &last) = (times.first()?, times.last()?);
    if !time.is_valid() || time < first || time > last {
        return None;
    }
    let index = times.partition_point(|&t| t <= time).checked_sub(1)?;
    series.get(index)
}

/// Orbit direction at `time`; undefined outside the data and between
/// blocks.
pub fn direction_at(series: &OrbitDirectionSeries, time: Time) -> OrbitDirection {
    point_at(series, time).map_or(OrbitDirection::Undefined, |point| point.direction)
}

/// [`direction_at`] for each of `times`.
pub fn interpolate_directions(series: &OrbitDirectionSeries, times: &[Time]) -> Vec<OrbitDirection> {
    times.iter().map(|&time| direction_at(series, time)).collect()
}

impl OrbitDirectionTable {
    pub fn direction_at(&self, time: Time) -> OrbitDirection {
        direction_at(self.data(), time)
    }

    pub fn interpolate(&self, times: &[Time]) -> Vec<OrbitDirection> {
        interpolate_directions(self.data(), times)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MergedOrbitDirections
// ═══════════════════════════════════════════════════════════════════════════

/// One block of an orbit-direction table with the sources overlapping it.
#[derive(Debug, Clone)]
struct BlockSegment {
    series: OrbitDirectionSeries,
    sources: Vec<(Interval, String)>,
    start: Time,
    end: Time,
}

impl Segment for BlockSegment {
    fn start(&self) -> Time {
        self.start
    }

    fn end(&self) -> Time {
        self.end
    }

    fn trim(&self, start: Time, end: Option<Time>) -> Self {
        let sources = self
            .sources
            .iter()
            .filter_map(|(range, key)| {
                let clipped = Interval::new(
                    range.start.latest(start),
                    end.map_or(range.end, |end| range.end.earliest(end)),
                );
                (clipped.start < clipped.end).then(|| (clipped, key.clone()))
            })
            .collect();
        Self {
            series: self.series.trim(Some(start), end),
            sources,
            start,
            end: end.unwrap_or(self.end),
        }
    }
}

fn split_blocks(table: &OrbitDirectionTable) -> Vec<BlockSegment> {
    let sources: Vec<(Interval, String)> = table
        .buffered_sources()
        .into_iter()
        .map(|(range, key)| (range, key.clone()))
        .collect();
    let series = table.data();
    series
        .blocks()
        .into_iter()
        .filter_map(|block| {
            let start = *series.times().get(block.start)?;
            let end = *series.times().get(block.end.checked_sub(1)?)?;
            let overlapping = sources
                .iter()
                .filter(|(range, _)| range.end >= start && range.start < end)
                .cloned()
                .collect();
            Some(BlockSegment {
                series: series.slice(block),
                sources: overlapping,
                start,
                end,
            })
        })
        .collect()
}

/// Orbit directions merged from several tables.
///
/// Tables are given in ascending priority: where blocks of two tables
/// overlap, the later table's block wins the overlapped time and the
/// earlier block is cut around it. Cut blocks are closed and reopened with
/// synthetic boundaries, so an END and the following START may share the
/// same instant; [`direction_at`] then reports the direction of the START.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedOrbitDirections {
    series: OrbitDirectionSeries,
    sources: Vec<(Interval, String)>,
}

impl MergedOrbitDirections {
    /// Merge `tables`, the last one taking precedence.
    ///
    /// A block cut short by a higher-priority block keeps its synthetic END
    /// at the cut instant, and the winning block starts at that same
    /// instant; no row is dropped to separate them. The result is a
    /// read-only view: its series is not strictly increasing at such cuts,
    /// so `verify` rejects it and it must not be spliced into a table.
    pub fn from_tables(tables: &[&OrbitDirectionTable]) -> Result<Self> {
        let segments: Vec<Vec<BlockSegment>> = tables.iter().map(|table| split_blocks(table)).collect();
        let mut merged = Self::default();
        for segment in resolve_overlaps(&segments) {
            if let (Some(&last), Some(&first)) =
                (merged.series.times().last(), segment.series.times().first())
            {
                if first < last {
                    return Err(Error::integrity(format!(
                        "merged blocks are not ordered in time ({first} follows {last})"
                    )));
                }
            }
            merged.series.append(&segment.series);
            for (range, key) in segment.sources {
                match merged.sources.last_mut() {
                    Some((previous, previous_key))
                        if *previous_key == key && previous.end >= range.start =>
                    {
                        previous.end = previous.end.latest(range.end);
                    }
                    _ => merged.sources.push((range, key)),
                }
            }
        }
        Ok(merged)
    }

    pub fn series(&self) -> &OrbitDirectionSeries {
        &self.series
    }

    /// Source ranges of the merged data (already buffered and clipped).
    pub fn sources(&self) -> &[(Interval, String)] {
        &self.sources
    }

    pub fn sources_in(&self, range: Interval) -> BTreeSet<&String> {
        matching_sources(self.sources.iter().map(|(r, key)| (*r, key)), range)
    }

    pub fn values_in(&self, range: Interval) -> OrbitDirectionSeries {
        self.series
            .subset(Bound::Included(range.start), Bound::Excluded(range.end))
    }

    pub fn direction_at(&self, time: Time) -> OrbitDirection {
        direction_at(&self.series, time)
    }

    pub fn interpolate(&self, times: &[Time]) -> Vec<OrbitDirection> {
        interpolate_directions(&self.series, times)
    }
}
