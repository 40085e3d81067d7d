// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Persistent, provenance-tracked lookup tables.
//!
//! A [`LookupTable`] owns one output series and one provenance index mapping
//! half-open time ranges to the source keys that produced them. Both are
//! mutated only through [`LookupTable::update`] and [`LookupTable::remove`],
//! which keep the two consistent.
//!
//! | Alias | Series | Source key |
//! |-------|--------|------------|
//! | [`OrbitDirectionTable`] | [`OrbitDirectionSeries`] | product identifier |
//! | [`ConjunctionTable`] | [`ConjunctionSeries`] | [`ProductPair`] |
//!
//! ## Update
//!
//! `update(start, end, data, key, margin_before, margin_after)` splices the
//! rows of `data` falling into the merge window
//! `[start − margin_before, end + margin_after]` into the stored series. Rows
//! stored before and after the window are kept. Where the window cuts
//! through a block of the new data and no stored block continues it, a
//! synthetic START or END closes the block at the window bound.
//!
//! Times entering a table are rounded to the resolution of its on-disk
//! encoding (1 ms for `CDF_EPOCH`, 1 ns for `CDF_TIME_TT2000`), so a saved
//! table always reads back unchanged.
//!
//! ## Persistence
//!
//! `save()` verifies the table, writes it next to its file, reads the
//! written copy back and requires it to equal the table before renaming it
//! over the previous file. `open()` treats a missing or unparsable file as
//! an empty table.

use crate::config::{Config, NeighbourSettings};
use crate::encoding::{TimeCodec, TimeEncoding};
use crate::error::{Error, Result};
use crate::instant::Time;
use crate::intervals::{Interval, IntervalEntry, OrderedIntervals};
use crate::leap_seconds::LeapSecondTable;
use crate::series::{ConjunctionSeries, OrbitDirectionSeries, SeriesData};
use crate::storage::{
    decode_time_ranges, encode_time_ranges, Column, Columnar, TableFile,
    NEIGHBOUR_DISTANCE_ATTR, NEIGHBOUR_OVERLAP_ATTR, PRODUCT_DESCRIPTION_ATTR, SOURCES_ATTR,
    SOURCE_TIME_RANGES_ATTR, TITLE_ATTR,
};
use chrono::Duration;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::ErrorKind;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Attribute listing the two spacecraft of a conjunction table.
pub const SPACECRAFTS_ATTR: &str = "SPACECRAFTS";

/// Description of the geographic orbit-direction table.
pub const GEO_DESCRIPTION: &str = "Orbit directions boundaries in geographic coordinates.";

/// Description of the quasi-dipole orbit-direction table.
pub const QD_DESCRIPTION: &str = "Orbit directions boundaries in quasi-dipole coordinates.";

const RESERVED_ATTRIBUTES: [&str; 6] = [
    TITLE_ATTR,
    PRODUCT_DESCRIPTION_ATTR,
    SOURCES_ATTR,
    SOURCE_TIME_RANGES_ATTR,
    NEIGHBOUR_DISTANCE_ATTR,
    NEIGHBOUR_OVERLAP_ATTR,
];

// ═══════════════════════════════════════════════════════════════════════════
// Source keys
// ═══════════════════════════════════════════════════════════════════════════

/// Identifier of the input that produced a provenance entry.
pub trait SourceKey: Clone + Ord + fmt::Debug + fmt::Display {
    /// Text stored in the `SOURCES` attribute.
    fn to_attribute(&self) -> String;

    /// Parse a `SOURCES` attribute entry.
    fn from_attribute(value: &str) -> Result<Self>;
}

impl SourceKey for String {
    fn to_attribute(&self) -> String {
        self.clone()
    }

    fn from_attribute(value: &str) -> Result<Self> {
        Ok(value.to_string())
    }
}

/// The two input products a conjunction range was computed from.
///
/// Stored as `"FIRST SECOND"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductPair {
    pub first: String,
    pub second: String,
}

impl ProductPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl fmt::Display for ProductPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.second)
    }
}

impl SourceKey for ProductPair {
    fn to_attribute(&self) -> String {
        self.to_string()
    }

    fn from_attribute(value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(first), Some(second), None) => Ok(Self::new(first, second)),
            _ => Err(Error::integrity(format!("malformed product pair {value:?}"))),
        }
    }
}

/// What [`LookupTable::remove`] removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<K> {
    /// The provenance entry of one source and its data range.
    Source(K),
    /// Every provenance entry intersecting the interval, and their data.
    Range(Interval),
}

// ═══════════════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════════════

/// Descriptive and encoding settings of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSettings {
    /// `TITLE` attribute; the file stem by default.
    pub title: String,
    /// `PRODUCT_DESCRIPTION` attribute.
    pub description: String,
    /// Prefix of the log messages.
    pub label: String,
    /// Source-range buffering recorded for readers.
    pub neighbours: NeighbourSettings,
    /// Encoding of the written time columns.
    pub time_encoding: TimeEncoding,
    /// Extra global attributes preserved across load and save.
    pub attributes: BTreeMap<String, Column>,
}

impl TableSettings {
    /// Settings of an orbit-direction table stored at `path`.
    pub fn orbit_direction(path: &Path, description: &str, config: &Config) -> Self {
        let title = file_stem(path);
        Self {
            label: title.clone(),
            title,
            description: description.to_string(),
            neighbours: config.orbit_direction_neighbours,
            time_encoding: config.table.time_encoding,
            attributes: BTreeMap::new(),
        }
    }

    /// Settings of the conjunction table of two spacecraft stored at `path`.
    pub fn conjunctions(path: &Path, spacecrafts: (&str, &str), config: &Config) -> Self {
        let (first, second) = spacecrafts;
        let label = format!("{first}/{second} conjunctions");
        let mut attributes = BTreeMap::new();
        attributes.insert(
            SPACECRAFTS_ATTR.to_string(),
            Column::Char(vec![first.to_string(), second.to_string()]),
        );
        Self {
            title: file_stem(path),
            description: label.clone(),
            label,
            neighbours: config.conjunction_neighbours,
            time_encoding: config.table.time_encoding,
            attributes,
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════
// LookupTable
// ═══════════════════════════════════════════════════════════════════════════

/// Provenance-tracked output series backed by one file.
#[derive(Debug, Clone)]
pub struct LookupTable<S, K> {
    path: PathBuf,
    settings: TableSettings,
    leap_seconds: Arc<LeapSecondTable>,
    provenance: OrderedIntervals<K>,
    data: S,
    dirty: bool,
}

/// Orbit-direction table keyed by product identifier.
pub type OrbitDirectionTable = LookupTable<OrbitDirectionSeries, String>;

/// Conjunction table keyed by product pair.
pub type ConjunctionTable = LookupTable<ConjunctionSeries, ProductPair>;

impl<S, K> LookupTable<S, K>
where
    S: SeriesData + Columnar,
    K: SourceKey,
{
    fn empty(path: PathBuf, settings: TableSettings, leap_seconds: Arc<LeapSecondTable>) -> Self {
        Self {
            path,
            settings,
            leap_seconds,
            provenance: OrderedIntervals::new(),
            data: S::default(),
            dirty: true,
        }
    }

    /// New empty table; nothing is read from `path`.
    pub fn create(
        path: impl Into<PathBuf>,
        settings: TableSettings,
        leap_seconds: Arc<LeapSecondTable>,
    ) -> Self {
        let table = Self::empty(path.into(), settings, leap_seconds);
        debug!("{}: table reset", table.settings.label);
        table
    }

    /// Load the table stored at `path`.
    ///
    /// A missing or unparsable file yields an empty table. A file that
    /// parses but violates the table invariants is a data-integrity error.
    pub fn open(
        path: impl Into<PathBuf>,
        settings: TableSettings,
        leap_seconds: Arc<LeapSecondTable>,
    ) -> Result<Self> {
        let path = path.into();
        let file = match TableFile::load(&path) {
            Ok(file) => file,
            Err(Error::Storage(e)) if e.kind() == ErrorKind::NotFound => {
                return Ok(Self::create(path, settings, leap_seconds));
            }
            Err(Error::Format(e)) => {
                warn!(
                    "{}: discarding unparsable table file {}: {}",
                    settings.label,
                    path.display(),
                    e
                );
                return Ok(Self::create(path, settings, leap_seconds));
            }
            Err(e) => return Err(e),
        };

        let mut table = Self::empty(path, settings, leap_seconds);
        let (provenance, data) = decode_parts(&file, &table.codec())?;
        verify_parts(&provenance, &data)?;
        table.provenance = provenance;
        table.data = data;
        table.restore_attributes(&file);
        table.dirty = false;
        debug!(
            "{}: table loaded ({} sources, {} records)",
            table.settings.label,
            table.provenance.len(),
            table.data.len()
        );
        Ok(table)
    }

    fn restore_attributes(&mut self, file: &TableFile) {
        let first_text = |name: &str| -> Option<String> {
            file.text_attribute(name).ok()?.first().cloned()
        };
        if let Some(title) = first_text(TITLE_ATTR) {
            self.settings.title = title;
        }
        if let Some(description) = first_text(PRODUCT_DESCRIPTION_ATTR) {
            self.settings.description = description;
        }
        if let (Some(distance_ms), Some(overlap_ms)) = (
            file.double_attribute(NEIGHBOUR_DISTANCE_ATTR),
            file.double_attribute(NEIGHBOUR_OVERLAP_ATTR),
        ) {
            self.settings.neighbours = NeighbourSettings {
                distance_ms,
                overlap_ms,
            };
        }
        for (name, value) in &file.attributes {
            if !RESERVED_ATTRIBUTES.contains(&name.as_str()) {
                self.settings.attributes.insert(name.clone(), value.clone());
            }
        }
    }

    fn codec(&self) -> TimeCodec<'_> {
        TimeCodec::new(self.settings.time_encoding, &self.leap_seconds)
    }

    // ── accessors ─────────────────────────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &TableSettings {
        &self.settings
    }

    pub fn title(&self) -> &str {
        &self.settings.title
    }

    pub fn neighbours(&self) -> NeighbourSettings {
        self.settings.neighbours
    }

    pub fn leap_seconds(&self) -> &LeapSecondTable {
        &self.leap_seconds
    }

    /// Stored output series.
    pub fn data(&self) -> &S {
        &self.data
    }

    /// Provenance index.
    pub fn provenance(&self) -> &OrderedIntervals<K> {
        &self.provenance
    }

    /// `(range, key)` provenance entries in time order.
    pub fn sources(&self) -> impl Iterator<Item = (Interval, &K)> + '_ {
        self.provenance.iter()
    }

    /// Source keys currently recorded.
    pub fn source_keys(&self) -> BTreeSet<K> {
        self.provenance.payloads().iter().cloned().collect()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.provenance.position(key).is_some()
    }

    /// `true` when the table changed since it was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ── mutation ──────────────────────────────────────────────────────

    /// Splice `data` into the table and record `[start, end)` as produced
    /// by `source`.
    ///
    /// A previous entry of `source` is removed first. Provenance entries
    /// intersecting `[start, end)` are evicted and returned. On error the
    /// table is left unchanged.
    pub fn update(
        &mut self,
        start: Time,
        end: Time,
        data: &S,
        source: K,
        margin_before: Duration,
        margin_after: Duration,
    ) -> Result<Vec<IntervalEntry<K>>> {
        let resolution = self.settings.time_encoding.resolution();
        let interval = Interval::checked(start.round_to(resolution), end.round_to(resolution))?;
        if margin_before < Duration::zero() || margin_after < Duration::zero() {
            return Err(Error::invalid_input(format!(
                "negative merge margin ({} ms before, {} ms after)",
                margin_before.num_milliseconds(),
                margin_after.num_milliseconds()
            )));
        }
        let data = data.rounded_to(resolution);
        data.verify()?;

        let mut provenance = self.provenance.clone();
        let mut current = self.data.clone();
        if let Some(stale) = provenance
            .position(&source)
            .and_then(|index| provenance.remove_at(index))
        {
            debug!(
                "{}: {} previously covered {}",
                self.settings.label, stale.payload, stale.interval
            );
            current = current.cut_out(stale.interval.start, stale.interval.end);
        }

        let window_start = (interval.start - margin_before).round_to(resolution);
        let window_end = (interval.end + margin_after).round_to(resolution);
        let head = current.subset(Bound::Unbounded, Bound::Excluded(window_start));
        let tail = current.subset(Bound::Excluded(window_end), Bound::Unbounded);
        let body = data.splice_body(
            window_start,
            window_end,
            !head.open_at_end(),
            !tail.open_at_start(),
        );
        S::check_splice(&head, &body, &tail)?;
        let merged = S::concat(&[&head, &body, &tail]);

        let evicted = provenance.insert(interval.start, interval.end, source.clone())?;
        verify_parts(&provenance, &merged)?;

        self.provenance = provenance;
        self.data = merged;
        self.dirty = true;
        for entry in &evicted {
            debug!(
                "{}: {} evicted from {}",
                self.settings.label, entry.payload, entry.interval
            );
        }
        info!(
            "{}: {} interval updated from {}",
            self.settings.label, interval, source
        );
        Ok(evicted)
    }

    /// Remove the selected provenance entries and cut their data out.
    ///
    /// For [`Selection::Range`] the cut spans the requested interval and
    /// every evicted entry. Unknown keys remove nothing.
    pub fn remove(&mut self, selection: Selection<K>) -> Result<Vec<IntervalEntry<K>>> {
        let (removed, cut) = match selection {
            Selection::Source(key) => {
                let entry = self
                    .provenance
                    .position(&key)
                    .and_then(|index| self.provenance.remove_at(index));
                match entry {
                    Some(entry) => {
                        let cut = entry.interval;
                        (vec![entry], cut)
                    }
                    None => return Ok(Vec::new()),
                }
            }
            Selection::Range(range) => {
                let resolution = self.settings.time_encoding.resolution();
                let range = Interval::checked(
                    range.start.round_to(resolution),
                    range.end.round_to(resolution),
                )?;
                let removed = self.provenance.remove(range.start, range.end)?;
                let cut = removed
                    .iter()
                    .fold(range, |hull, entry| hull.hull(&entry.interval));
                (removed, cut)
            }
        };

        let remaining = self.data.cut_out(cut.start, cut.end);
        if !removed.is_empty() || remaining != self.data {
            self.dirty = true;
        }
        self.data = remaining;
        for entry in &removed {
            info!(
                "{}: {} removed ({})",
                self.settings.label, entry.payload, entry.interval
            );
        }
        Ok(removed)
    }

    // ── integrity and persistence ─────────────────────────────────────

    /// Check the provenance index and the series.
    pub fn verify(&self) -> Result<()> {
        verify_parts(&self.provenance, &self.data)?;
        debug!("{}: table verified", self.settings.label);
        Ok(())
    }

    /// Container image of the table.
    pub fn to_file(&self) -> Result<TableFile> {
        let codec = self.codec();
        let description = if self.settings.description.is_empty() {
            S::DESCRIPTION
        } else {
            &self.settings.description
        };
        let mut attributes = self.settings.attributes.clone();
        attributes.insert(TITLE_ATTR.to_string(), Column::text(&self.settings.title));
        attributes.insert(PRODUCT_DESCRIPTION_ATTR.to_string(), Column::text(description));
        attributes.insert(
            SOURCES_ATTR.to_string(),
            Column::Char(
                self.provenance
                    .payloads()
                    .iter()
                    .map(K::to_attribute)
                    .collect(),
            ),
        );
        attributes.insert(
            SOURCE_TIME_RANGES_ATTR.to_string(),
            encode_time_ranges(&codec, &self.provenance.intervals())?,
        );
        attributes.insert(
            NEIGHBOUR_DISTANCE_ATTR.to_string(),
            Column::scalar(self.settings.neighbours.distance_ms),
        );
        attributes.insert(
            NEIGHBOUR_OVERLAP_ATTR.to_string(),
            Column::scalar(self.settings.neighbours.overlap_ms),
        );
        Ok(TableFile {
            attributes,
            variables: self.data.to_variables(&codec)?,
        })
    }

    /// Atomically replace the table file.
    ///
    /// On failure the previous file and the in-memory table are unchanged.
    pub fn save(&mut self) -> Result<()> {
        self.verify()?;
        let file = self.to_file()?;
        let codec = self.codec();
        file.save_atomic(&self.path, |written| {
            let (provenance, data) = decode_parts::<S, K>(written, &codec)?;
            verify_parts(&provenance, &data)?;
            if provenance != self.provenance || data != self.data {
                return Err(Error::integrity(format!(
                    "{} does not reproduce the table exactly in {}",
                    self.path.display(),
                    self.settings.time_encoding
                )));
            }
            Ok(())
        })?;
        self.dirty = false;
        info!("{}: saved to {}", self.settings.label, self.path.display());
        Ok(())
    }

    /// Human-readable listing of the sources and records.
    pub fn dump(&self) -> String {
        let header = format!("# {} ({})", self.settings.title, self.path.display());
        let sources = self
            .provenance
            .iter()
            .map(|(interval, key)| format!("# {interval} {key}"));
        let records = (0..self.data.len()).map(|index| self.data.format_row(index));
        std::iter::once(header)
            .chain(sources)
            .chain(records)
            .map(|line| line + "\n")
            .collect()
    }
}

fn decode_parts<S, K>(file: &TableFile, codec: &TimeCodec<'_>) -> Result<(OrderedIntervals<K>, S)>
where
    S: Columnar,
    K: SourceKey,
{
    let keys = file
        .text_attribute(SOURCES_ATTR)?
        .iter()
        .map(|value| K::from_attribute(value))
        .collect::<Result<Vec<_>>>()?;
    let ranges = match file.attributes.get(SOURCE_TIME_RANGES_ATTR) {
        Some(column) => decode_time_ranges(codec, column)?,
        None => Vec::new(),
    };
    if keys.len() != ranges.len() {
        return Err(Error::integrity(format!(
            "{} sources but {} source time ranges",
            keys.len(),
            ranges.len()
        )));
    }
    let starts = ranges.iter().map(|r| r.start).collect();
    let ends = ranges.iter().map(|r| r.end).collect();
    let provenance = OrderedIntervals::from_parts(starts, ends, keys)?;
    let data = S::from_variables(file, codec)?;
    Ok((provenance, data))
}

fn verify_parts<S: SeriesData, K: SourceKey>(provenance: &OrderedIntervals<K>, data: &S) -> Result<()> {
    provenance.verify()?;
    let unique: BTreeSet<&K> = provenance.payloads().iter().collect();
    if unique.len() != provenance.len() {
        return Err(Error::integrity("Non-unique source keys!"));
    }
    data.verify()
}

impl OrbitDirectionTable {
    /// Load (or start) the orbit-direction table at `path`.
    pub fn open_orbit_direction(
        path: impl Into<PathBuf>,
        description: &str,
        config: &Config,
        leap_seconds: Arc<LeapSecondTable>,
    ) -> Result<Self> {
        let path = path.into();
        let settings = TableSettings::orbit_direction(&path, description, config);
        Self::open(path, settings, leap_seconds)
    }
}

impl ConjunctionTable {
    /// Load (or start) the conjunction table of two spacecraft at `path`.
    pub fn open_conjunctions(
        path: impl Into<PathBuf>,
        spacecrafts: (&str, &str),
        config: &Config,
        leap_seconds: Arc<LeapSecondTable>,
    ) -> Result<Self> {
        let path = path.into();
        let settings = TableSettings::conjunctions(&path, spacecrafts, config);
        Self::open(path, settings, leap_seconds)
    }
}
