// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Tunable parameters with TOML loading.
//!
//! Every section is optional; missing fields take their defaults. Durations
//! are integer milliseconds.
//!
//! ```toml
//! [extractor]
//! gap_threshold_ms = 10000
//! nominal_sampling_ms = 1000
//!
//! [updater]
//! input_margin = 6
//! trim_margin = 4
//!
//! [table]
//! time_encoding = "CDF_EPOCH"
//!
//! [orbit_direction_neighbours]
//! distance_ms = 1000.0
//! overlap_ms = 3000.0
//! ```

use crate::encoding::TimeEncoding;
use crate::error::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Segment-extractor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Inter-sample gap above which a new continuous run starts.
    #[serde(default = "default_gap_threshold_ms")]
    pub gap_threshold_ms: u64,
    /// Nominal input sampling step; also the distance between the last
    /// sample of a run and its END marker.
    #[serde(default = "default_nominal_sampling_ms")]
    pub nominal_sampling_ms: u64,
}

fn default_gap_threshold_ms() -> u64 {
    10_000
}

fn default_nominal_sampling_ms() -> u64 {
    1_000
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            gap_threshold_ms: default_gap_threshold_ms(),
            nominal_sampling_ms: default_nominal_sampling_ms(),
        }
    }
}

impl ExtractorConfig {
    pub fn gap_threshold(&self) -> Duration {
        millis(self.gap_threshold_ms)
    }

    pub fn nominal_sampling(&self) -> Duration {
        millis(self.nominal_sampling_ms)
    }
}

/// Updater (pipeline) settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Samples read from each neighbouring product.
    #[serde(default = "default_input_margin")]
    pub input_margin: usize,
    /// Neighbour samples whose extraction result is discarded before the
    /// merge (they are too close to the edge of the margin).
    #[serde(default = "default_trim_margin")]
    pub trim_margin: usize,
    /// Sampling step assumed by the conjunction range detection.
    #[serde(default = "default_conjunction_sampling_ms")]
    pub conjunction_sampling_ms: u64,
}

fn default_input_margin() -> usize {
    6
}

fn default_trim_margin() -> usize {
    4
}

fn default_conjunction_sampling_ms() -> u64 {
    1_000
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            input_margin: default_input_margin(),
            trim_margin: default_trim_margin(),
            conjunction_sampling_ms: default_conjunction_sampling_ms(),
        }
    }
}

impl UpdaterConfig {
    pub fn conjunction_sampling(&self) -> Duration {
        millis(self.conjunction_sampling_ms)
    }
}

/// Source-range buffering recorded in a table file and applied by readers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighbourSettings {
    /// Expected gap between consecutive products.
    pub distance_ms: f64,
    /// Overlap added around adjacent product boundaries.
    pub overlap_ms: f64,
}

impl NeighbourSettings {
    /// Orbit-direction tables.
    pub const ORBIT_DIRECTION: Self = Self {
        distance_ms: 1000.0,
        overlap_ms: 3000.0,
    };

    /// Conjunction tables.
    pub const CONJUNCTIONS: Self = Self {
        distance_ms: 1000.0,
        overlap_ms: 1000.0,
    };
}

fn default_orbit_direction_neighbours() -> NeighbourSettings {
    NeighbourSettings::ORBIT_DIRECTION
}

fn default_conjunction_neighbours() -> NeighbourSettings {
    NeighbourSettings::CONJUNCTIONS
}

/// Table file settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableConfig {
    /// Encoding of the time columns written by `save()`. Files are always
    /// read in whatever encoding they carry.
    #[serde(default)]
    pub time_encoding: TimeEncoding,
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default = "default_orbit_direction_neighbours")]
    pub orbit_direction_neighbours: NeighbourSettings,
    #[serde(default = "default_conjunction_neighbours")]
    pub conjunction_neighbours: NeighbourSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            updater: UpdaterConfig::default(),
            table: TableConfig::default(),
            orbit_direction_neighbours: NeighbourSettings::ORBIT_DIRECTION,
            conjunction_neighbours: NeighbourSettings::CONJUNCTIONS,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject settings the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.extractor.nominal_sampling_ms == 0 {
            return Err(Error::Config("nominal_sampling_ms must be positive".into()));
        }
        if self.extractor.gap_threshold_ms < self.extractor.nominal_sampling_ms {
            return Err(Error::Config(
                "gap_threshold_ms must not be shorter than nominal_sampling_ms".into(),
            ));
        }
        if self.updater.trim_margin == 0 || self.updater.trim_margin > self.updater.input_margin {
            return Err(Error::Config(format!(
                "trim_margin must lie in 1..={} (got {})",
                self.updater.input_margin, self.updater.trim_margin
            )));
        }
        if self.updater.conjunction_sampling_ms == 0 {
            return Err(Error::Config("conjunction_sampling_ms must be positive".into()));
        }
        for (name, settings) in [
            ("orbit_direction_neighbours", &self.orbit_direction_neighbours),
            ("conjunction_neighbours", &self.conjunction_neighbours),
        ] {
            if !(settings.distance_ms.is_finite() && settings.overlap_ms.is_finite()) {
                return Err(Error::Config(format!("{name} must be finite")));
            }
        }
        Ok(())
    }
}

fn millis(value: u64) -> Duration {
    Duration::milliseconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.extractor.gap_threshold(), Duration::seconds(10));
        assert_eq!(config.extractor.nominal_sampling(), Duration::seconds(1));
        assert_eq!(config.updater.input_margin, 6);
        assert_eq!(config.updater.trim_margin, 4);
        assert_eq!(config.table.time_encoding, TimeEncoding::CdfEpoch);
        assert_eq!(config.orbit_direction_neighbours.overlap_ms, 3000.0);
        assert_eq!(config.conjunction_neighbours.overlap_ms, 1000.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_document() {
        let config = Config::from_toml_str(
            r#"
            [extractor]
            gap_threshold_ms = 30000

            [table]
            time_encoding = "CDF_TIME_TT2000"
            "#,
        )
        .unwrap();
        assert_eq!(config.extractor.gap_threshold_ms, 30_000);
        assert_eq!(config.extractor.nominal_sampling_ms, 1_000);
        assert_eq!(config.table.time_encoding, TimeEncoding::CdfTt2000);
        assert_eq!(config.updater, UpdaterConfig::default());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(Config::from_toml_str("[extractor"), Err(Error::Config(_))));
        assert!(Config::from_toml_str("[updater]\ntrim_margin = 7").is_err());
        assert!(Config::from_toml_str("[extractor]\nnominal_sampling_ms = 0").is_err());
        assert!(Config::from_toml_str("[table]\ntime_encoding = \"UNIX\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookup.toml");
        std::fs::write(&path, "[updater]\ninput_margin = 8\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.updater.input_margin, 8);
        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }
}
