// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Orbit Lookup
//!
//! Provenance-tracked lookup tables of satellite orbit directions and
//! satellite conjunctions, stored with CDF-compatible time encodings.
//!
//! # Core types
//!
//! - [`Time`]: UTC instant, nanoseconds since 2000-01-01T00:00:00Z.
//! - [`TimeCodec`]: converts instants to and from `CDF_EPOCH` / `CDF_TIME_TT2000`.
//! - [`OrderedIntervals`]: non-overlapping half-open intervals with payloads.
//! - [`OrbitDirectionSeries`]: orbit-direction inversion points in START/END blocks.
//! - [`ConjunctionSeries`]: conjunction instants with angular separations.
//! - [`LookupTable`]: a series plus the provenance of every part of it.
//! - [`MergedOrbitDirections`]: several tables resolved into one view.
//!
//! # Pipelines
//!
//! | Step | Entry point |
//! |------|-------------|
//! | Extract inversion points | [`extract_orbit_directions`] |
//! | Extract conjunctions | [`extract_conjunctions`] |
//! | Splice into a table | [`LookupTable::update`] |
//! | Product-level update | [`OrbitDirectionUpdater`], [`ConjunctionUpdater`] |
//! | Query | [`LookupTable::values_in`], [`OrbitDirectionTable::direction_at`] |
//!
//! # Leap seconds
//!
//! `CDF_TIME_TT2000` counts SI seconds, so encoding needs the TAI − UTC
//! history. [`LeapSecondTable::builtin`] carries the published table; newer
//! tables are read with [`LeapSecondTable::from_file`].

pub mod config;
pub mod conjunction;
pub mod encoding;
pub mod error;
pub mod extract;
pub(crate) mod instant;
pub mod intervals;
pub mod leap_seconds;
pub mod merge;
pub mod query;
pub mod series;
pub mod storage;
pub mod table;
pub mod update;

// ── Re-exports ────────────────────────────────────────────────────────────

pub use config::{Config, ExtractorConfig, NeighbourSettings, TableConfig, UpdaterConfig};
pub use conjunction::{angular_separation, extract_conjunctions};
pub use encoding::{RawTime, TimeCodec, TimeEncoding};
pub use error::{Error, Result};
pub use extract::extract_orbit_directions;
pub use instant::Time;
pub use intervals::{complement_within, intersect_intervals, Interval, IntervalEntry, OrderedIntervals};
pub use leap_seconds::{LeapSecondRecord, LeapSecondTable};
pub use merge::{resolve_overlaps, Segment};
pub use query::{buffer_source_ranges, direction_at, interpolate_directions, MergedOrbitDirections};
pub use series::{
    BoundaryType, ConjunctionSeries, DirectionPoint, OrbitDirection, OrbitDirectionSeries,
    OrbitSamples, SeriesData,
};
pub use storage::{Column, Columnar, TableFile, Variable};
pub use table::{
    ConjunctionTable, LookupTable, OrbitDirectionTable, ProductPair, Selection, SourceKey,
    TableSettings,
};
pub use update::{
    ConjunctionUpdater, Neighbours, OrbitDirectionTables, OrbitDirectionUpdater, ProductReader,
    ProductRegistry, QuasiDipoleModel, SampleSelection,
};
