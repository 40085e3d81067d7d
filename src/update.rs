// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Table update pipelines.
//!
//! The pipelines pull input samples through three collaborator traits and
//! feed the extractors' output into the lookup tables:
//!
//! | Trait | Provides |
//! |-------|----------|
//! | [`ProductReader`] | spacecraft positions of one input product |
//! | [`ProductRegistry`] | the products immediately before and after a product |
//! | [`QuasiDipoleModel`] | quasi-dipole latitudes of a set of positions |
//!
//! ## Orbit-direction margins
//!
//! Extrema near a product boundary depend on the samples across it. The
//! orbit-direction updater therefore reads up to `input_margin` samples of
//! each neighbouring product and extracts over the joined samples. Only the
//! result within `trim_margin` samples of the product is merged:
//!
//! ```text
//! margin_before = start − head.times[len − trim_margin]        (0 without a previous product)
//! margin_after  = max(nominal, tail.times[trim_margin − 1] − end)  (nominal without a next product)
//! ```

use crate::config::{Config, ExtractorConfig, UpdaterConfig};
use crate::conjunction::extract_conjunctions;
use crate::error::{Error, Result};
use crate::extract::extract_orbit_directions;
use crate::instant::Time;
use crate::intervals::{Interval, IntervalEntry};
use crate::leap_seconds::LeapSecondTable;
use crate::series::{OrbitDirectionSeries, OrbitSamples};
use crate::storage::FileSnapshot;
use crate::table::{
    ConjunctionTable, OrbitDirectionTable, ProductPair, Selection, GEO_DESCRIPTION, QD_DESCRIPTION,
};
use chrono::Duration;
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Collaborators
// ═══════════════════════════════════════════════════════════════════════════

/// Which samples of a product to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSelection {
    All,
    First(usize),
    Last(usize),
}

impl SampleSelection {
    /// Apply the selection to already loaded samples.
    pub fn select(self, samples: &OrbitSamples) -> OrbitSamples {
        match self {
            SampleSelection::All => samples.clone(),
            SampleSelection::First(count) => samples.head(count),
            SampleSelection::Last(count) => samples.tail(count),
        }
    }
}

/// Source of input product samples.
pub trait ProductReader {
    fn read_samples(&self, product: &str, selection: SampleSelection) -> Result<OrbitSamples>;
}

/// Temporal neighbours of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbours {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Catalogue of input products.
pub trait ProductRegistry {
    fn neighbours(&self, product: &str) -> Result<Neighbours>;
}

/// Magnetic coordinate model.
pub trait QuasiDipoleModel {
    /// Quasi-dipole latitude (deg) of every sample.
    fn quasi_dipole_latitudes(&self, samples: &OrbitSamples) -> Result<Vec<f64>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// OrbitDirectionTables
// ═══════════════════════════════════════════════════════════════════════════

/// Geographic and quasi-dipole orbit-direction tables of one spacecraft,
/// updated together.
#[derive(Debug, Clone)]
pub struct OrbitDirectionTables {
    geo: OrbitDirectionTable,
    mag: OrbitDirectionTable,
}

impl OrbitDirectionTables {
    pub fn new(geo: OrbitDirectionTable, mag: OrbitDirectionTable) -> Self {
        Self { geo, mag }
    }

    /// Load (or start) both tables.
    pub fn open(
        geo_path: impl Into<PathBuf>,
        mag_path: impl Into<PathBuf>,
        config: &Config,
        leap_seconds: Arc<LeapSecondTable>,
    ) -> Result<Self> {
        Ok(Self {
            geo: OrbitDirectionTable::open_orbit_direction(
                geo_path,
                GEO_DESCRIPTION,
                config,
                Arc::clone(&leap_seconds),
            )?,
            mag: OrbitDirectionTable::open_orbit_direction(
                mag_path,
                QD_DESCRIPTION,
                config,
                leap_seconds,
            )?,
        })
    }

    pub fn geo(&self) -> &OrbitDirectionTable {
        &self.geo
    }

    pub fn mag(&self) -> &OrbitDirectionTable {
        &self.mag
    }

    /// `true` when both tables hold `product`.
    pub fn contains(&self, product: &str) -> bool {
        let key = product.to_string();
        self.geo.contains(&key) && self.mag.contains(&key)
    }

    pub fn is_dirty(&self) -> bool {
        self.geo.is_dirty() || self.mag.is_dirty()
    }

    /// Products held by either table.
    pub fn products(&self) -> BTreeSet<String> {
        let mut products = self.geo.source_keys();
        products.extend(self.mag.source_keys());
        products
    }

    /// Save both tables.
    ///
    /// When the quasi-dipole table cannot be written, the geographic file is
    /// put back as it was and both tables stay unsaved.
    pub fn save(&mut self) -> Result<()> {
        self.geo.verify()?;
        self.mag.verify()?;
        let previous = FileSnapshot::take(self.geo.path())?;
        let geo = self.geo.clone();
        self.geo.save()?;
        if let Err(error) = self.mag.save() {
            self.geo = geo;
            if let Err(restore) = previous.restore() {
                warn!(
                    "{}: previous file could not be restored: {restore}",
                    self.geo.title()
                );
            }
            return Err(error);
        }
        Ok(())
    }

    pub fn remove(&mut self, product: &str) -> Result<()> {
        let mut geo = self.geo.clone();
        let mut mag = self.mag.clone();
        geo.remove(Selection::Source(product.to_string()))?;
        mag.remove(Selection::Source(product.to_string()))?;
        self.geo = geo;
        self.mag = mag;
        info!("{product} removed from orbit direction lookup tables");
        Ok(())
    }

    /// Splice freshly extracted geographic and quasi-dipole series.
    ///
    /// Either both tables take the product or neither changes.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        product: &str,
        start: Time,
        end: Time,
        geo: &OrbitDirectionSeries,
        mag: &OrbitDirectionSeries,
        margin_before: Duration,
        margin_after: Duration,
    ) -> Result<()> {
        let mut geo_table = self.geo.clone();
        let mut mag_table = self.mag.clone();
        geo_table.update(start, end, geo, product.to_string(), margin_before, margin_after)?;
        mag_table.update(start, end, mag, product.to_string(), margin_before, margin_after)?;
        self.geo = geo_table;
        self.mag = mag_table;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Updaters
// ═══════════════════════════════════════════════════════════════════════════

/// Extracts orbit directions of one product and merges them into a table
/// pair.
pub struct OrbitDirectionUpdater<'a, R, G, Q> {
    reader: &'a R,
    registry: &'a G,
    model: &'a Q,
    extractor: ExtractorConfig,
    updater: UpdaterConfig,
}

impl<'a, R, G, Q> OrbitDirectionUpdater<'a, R, G, Q>
where
    R: ProductReader,
    G: ProductRegistry,
    Q: QuasiDipoleModel,
{
    pub fn new(reader: &'a R, registry: &'a G, model: &'a Q, config: &Config) -> Self {
        Self {
            reader,
            registry,
            model,
            extractor: config.extractor,
            updater: config.updater,
        }
    }

    /// Extract `product` with margins from its neighbours and update both
    /// tables. The provenance range runs from the first to the last sample
    /// of the product.
    pub fn update(&self, tables: &mut OrbitDirectionTables, product: &str) -> Result<()> {
        let body = self.reader.read_samples(product, SampleSelection::All)?;
        let (start, end) = match (body.times.first(), body.times.last()) {
            (Some(&start), Some(&end)) => (start, end),
            _ => {
                return Err(Error::invalid_input(format!(
                    "product {product} contains no samples"
                )))
            }
        };
        let neighbours = self.registry.neighbours(product)?;
        let nominal = self.extractor.nominal_sampling();
        let input_margin = self.updater.input_margin;
        let trim_margin = self.updater.trim_margin;

        let mut margin_before = Duration::zero();
        let head = match &neighbours.before {
            Some(previous) => {
                let head = self
                    .reader
                    .read_samples(previous, SampleSelection::Last(input_margin))?;
                if let Some(&first_kept) = head.tail(trim_margin).times.first() {
                    margin_before = start - first_kept;
                }
                head
            }
            None => OrbitSamples::default(),
        };

        let mut margin_after = nominal;
        let tail = match &neighbours.after {
            Some(next) => {
                let tail = self
                    .reader
                    .read_samples(next, SampleSelection::First(input_margin))?;
                if let Some(&last_kept) = tail.head(trim_margin).times.last() {
                    margin_after = margin_after.max(last_kept - end);
                }
                tail
            }
            None => OrbitSamples::default(),
        };

        let samples = OrbitSamples::join(&[&head, &body, &tail])?;
        let geo = extract_orbit_directions(&samples.times, &samples.latitudes, &self.extractor)?;
        let qd_latitudes = self.model.quasi_dipole_latitudes(&samples)?;
        if qd_latitudes.len() != samples.len() {
            return Err(Error::invalid_input(format!(
                "{} quasi-dipole latitudes for {} samples",
                qd_latitudes.len(),
                samples.len()
            )));
        }
        let mag = extract_orbit_directions(&samples.times, &qd_latitudes, &self.extractor)?;

        tables.update(product, start, end, &geo, &mag, margin_before, margin_after)?;
        info!("{product} orbit direction lookup tables extracted");
        Ok(())
    }
}

/// Extracts the conjunctions of two trajectories into a conjunction table.
#[derive(Debug, Clone, Copy)]
pub struct ConjunctionUpdater {
    step: Duration,
}

impl ConjunctionUpdater {
    pub fn new(config: &UpdaterConfig) -> Self {
        Self {
            step: config.conjunction_sampling(),
        }
    }

    /// Replace the conjunctions within `range` by those of the two
    /// trajectories and record `pair` as their source.
    pub fn update(
        &self,
        table: &mut ConjunctionTable,
        range: Interval,
        first: &OrbitSamples,
        second: &OrbitSamples,
        pair: ProductPair,
    ) -> Result<Vec<IntervalEntry<ProductPair>>> {
        let conjunctions = extract_conjunctions(first, second, self.step)?;
        table.update(
            range.start,
            range.end,
            &conjunctions,
            pair,
            Duration::zero(),
            Duration::zero(),
        )
    }
}
