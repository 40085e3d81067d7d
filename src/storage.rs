// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Columnar table container.
//!
//! A [`TableFile`] holds named global attributes and named data variables;
//! every value is a typed [`Column`]. The container is stored as a JSON
//! document:
//!
//! ```json
//! {
//!   "attributes": {
//!     "SOURCES": {"type": "CDF_CHAR", "values": ["PRODUCT_A"]},
//!     "SOURCE_TIME_RANGES": {"type": "CDF_EPOCH", "values": [6.3e13, 6.3e13]}
//!   },
//!   "variables": {
//!     "Timestamp": {"column": {"type": "CDF_EPOCH", "values": [...]},
//!                   "attributes": {"UNITS": "-"}}
//!   }
//! }
//! ```
//!
//! | Name | Kind | Column type |
//! |------|------|-------------|
//! | `TITLE`, `PRODUCT_DESCRIPTION` | attribute | `CDF_CHAR` |
//! | `SOURCES` | attribute | `CDF_CHAR`, provenance keys in order |
//! | `SOURCE_TIME_RANGES` | attribute | time column, `start, end` pairs interleaved |
//! | `NEIGHBOUR_DISTANCE`, `NEIGHBOUR_OVERLAP` | attribute | `CDF_DOUBLE`, milliseconds |
//! | `Timestamp` | variable | time column |
//! | `OrbitDirection`, `BoundaryType` | variable | `CDF_INT1` |
//! | `AngularSeparation` | variable | `CDF_DOUBLE`, degrees |
//!
//! Writes are atomic: the document goes to a temporary file next to the
//! target, is read back and checked, and only then renamed over the target.

use crate::encoding::{RawTime, TimeCodec, TimeEncoding};
use crate::error::{Error, Result};
use crate::instant::Time;
use crate::intervals::Interval;
use crate::series::{BoundaryType, ConjunctionSeries, OrbitDirection, OrbitDirectionSeries, SeriesData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const TITLE_ATTR: &str = "TITLE";
pub const PRODUCT_DESCRIPTION_ATTR: &str = "PRODUCT_DESCRIPTION";
pub const SOURCES_ATTR: &str = "SOURCES";
pub const SOURCE_TIME_RANGES_ATTR: &str = "SOURCE_TIME_RANGES";
pub const NEIGHBOUR_DISTANCE_ATTR: &str = "NEIGHBOUR_DISTANCE";
pub const NEIGHBOUR_OVERLAP_ATTR: &str = "NEIGHBOUR_OVERLAP";

pub const TIMESTAMP_VAR: &str = "Timestamp";
pub const ORBIT_DIRECTION_VAR: &str = "OrbitDirection";
pub const BOUNDARY_TYPE_VAR: &str = "BoundaryType";
pub const ANGULAR_SEPARATION_VAR: &str = "AngularSeparation";

// ═══════════════════════════════════════════════════════════════════════════
// Columns
// ═══════════════════════════════════════════════════════════════════════════

/// A typed column of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum Column {
    #[serde(rename = "CDF_EPOCH")]
    Epoch(Vec<f64>),
    #[serde(rename = "CDF_TIME_TT2000")]
    Tt2000(Vec<i64>),
    #[serde(rename = "CDF_INT1")]
    Int1(Vec<i8>),
    #[serde(rename = "CDF_DOUBLE")]
    Double(Vec<f64>),
    #[serde(rename = "CDF_CHAR")]
    Char(Vec<String>),
}

impl Column {
    /// Encode instants with the codec's encoding.
    pub fn from_times(codec: &TimeCodec<'_>, times: &[Time]) -> Result<Self> {
        let raw = codec.encode_all(times)?;
        Ok(match codec.encoding() {
            TimeEncoding::CdfEpoch => Column::Epoch(
                raw.into_iter()
                    .filter_map(|value| match value {
                        RawTime::Epoch(v) => Some(v),
                        RawTime::Tt2000(_) => None,
                    })
                    .collect(),
            ),
            TimeEncoding::CdfTt2000 => Column::Tt2000(
                raw.into_iter()
                    .filter_map(|value| match value {
                        RawTime::Tt2000(v) => Some(v),
                        RawTime::Epoch(_) => None,
                    })
                    .collect(),
            ),
        })
    }

    /// Decode a time column in whichever encoding it is stored.
    pub fn to_times(&self, codec: &TimeCodec<'_>) -> Result<Vec<Time>> {
        match self {
            Column::Epoch(values) => values.iter().map(|&v| codec.decode(RawTime::Epoch(v))).collect(),
            Column::Tt2000(values) => values.iter().map(|&v| codec.decode(RawTime::Tt2000(v))).collect(),
            other => Err(Error::integrity(format!(
                "{} column is not a time column",
                other.type_label()
            ))),
        }
    }

    /// Time encoding of a time column.
    pub fn time_encoding(&self) -> Option<TimeEncoding> {
        match self {
            Column::Epoch(_) => Some(TimeEncoding::CdfEpoch),
            Column::Tt2000(_) => Some(TimeEncoding::CdfTt2000),
            _ => None,
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Column::Epoch(_) => "CDF_EPOCH",
            Column::Tt2000(_) => "CDF_TIME_TT2000",
            Column::Int1(_) => "CDF_INT1",
            Column::Double(_) => "CDF_DOUBLE",
            Column::Char(_) => "CDF_CHAR",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Epoch(values) | Column::Double(values) => values.len(),
            Column::Tt2000(values) => values.len(),
            Column::Int1(values) => values.len(),
            Column::Char(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Single text value.
    pub fn text(value: impl Into<String>) -> Self {
        Column::Char(vec![value.into()])
    }

    /// Single double value.
    pub fn scalar(value: f64) -> Self {
        Column::Double(vec![value])
    }
}

/// A data variable: a column plus descriptive attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub column: Column,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Variable {
    pub fn new(column: Column, description: &str, units: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("DESCRIPTION".to_string(), description.to_string());
        attributes.insert("UNITS".to_string(), units.to_string());
        Self { column, attributes }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TableFile
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory image of a table file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableFile {
    #[serde(default)]
    pub attributes: BTreeMap<String, Column>,
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
}

impl TableFile {
    /// Read a table file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Atomically replace `path` with this table.
    ///
    /// The document is written to a temporary file in the target directory,
    /// read back and passed to `check`; only when the check passes is the
    /// temporary file renamed over `path`. On any failure the temporary file
    /// is removed and `path` is left untouched.
    pub fn save_atomic<P, F>(&self, path: P, check: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnOnce(&TableFile) -> Result<()>,
    {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temporary = NamedTempFile::new_in(directory)?;
        {
            let mut writer = BufWriter::new(temporary.as_file());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        temporary.as_file().sync_all()?;

        let written = Self::load(temporary.path())?;
        check(&written)?;

        temporary.persist(path).map_err(|e| Error::Storage(e.error))?;
        Ok(())
    }

    /// Text attribute values.
    pub fn text_attribute(&self, name: &str) -> Result<&[String]> {
        match self.attributes.get(name) {
            Some(Column::Char(values)) => Ok(values),
            Some(other) => Err(type_mismatch(name, other, "CDF_CHAR")),
            None => Err(missing(name)),
        }
    }

    /// First value of a numeric attribute.
    pub fn double_attribute(&self, name: &str) -> Option<f64> {
        match self.attributes.get(name) {
            Some(Column::Double(values)) => values.first().copied(),
            _ => None,
        }
    }

    pub fn variable(&self, name: &str) -> Result<&Column> {
        self.variables
            .get(name)
            .map(|variable| &variable.column)
            .ok_or_else(|| missing(name))
    }

    /// Time encoding of the `Timestamp` variable, if present.
    pub fn time_encoding(&self) -> Option<TimeEncoding> {
        self.variables.get(TIMESTAMP_VAR)?.column.time_encoding()
    }
}

/// Bytes of a file taken before it is replaced, so that a multi-file save
/// can put it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    path: PathBuf,
    content: Option<Vec<u8>>,
}

impl FileSnapshot {
    /// Record the current content of `path`; a missing file is recorded as
    /// absent.
    pub fn take(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, content })
    }

    /// Atomically put the recorded content back, or remove the file if it
    /// did not exist.
    pub fn restore(&self) -> Result<()> {
        match &self.content {
            Some(bytes) => {
                let directory = match self.path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
                let mut temporary = NamedTempFile::new_in(directory)?;
                temporary.write_all(bytes)?;
                temporary.as_file().sync_all()?;
                temporary.persist(&self.path).map_err(|e| Error::Storage(e.error))?;
                Ok(())
            }
            None => match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            },
        }
    }
}

fn missing(name: &str) -> Error {
    Error::integrity(format!("{name} is missing from the table file"))
}

fn type_mismatch(name: &str, column: &Column, expected: &str) -> Error {
    Error::integrity(format!(
        "{name} has type {} instead of {expected}",
        column.type_label()
    ))
}

/// Encode provenance ranges as interleaved `start, end` values.
pub fn encode_time_ranges(codec: &TimeCodec<'_>, ranges: &[Interval]) -> Result<Column> {
    let flat: Vec<Time> = ranges.iter().flat_map(|r| [r.start, r.end]).collect();
    Column::from_times(codec, &flat)
}

/// Decode interleaved `start, end` values.
pub fn decode_time_ranges(codec: &TimeCodec<'_>, column: &Column) -> Result<Vec<Interval>> {
    let flat = column.to_times(codec)?;
    if flat.len() % 2 != 0 {
        return Err(Error::integrity(format!(
            "{SOURCE_TIME_RANGES_ATTR} holds an odd number of values ({})",
            flat.len()
        )));
    }
    Ok(flat
        .chunks_exact(2)
        .map(|pair| Interval::new(pair[0], pair[1]))
        .collect())
}

// ═══════════════════════════════════════════════════════════════════════════
// Columnar series
// ═══════════════════════════════════════════════════════════════════════════

/// Conversion of an output series to and from data variables.
pub trait Columnar: Sized {
    /// Attribute/variable description stored in `PRODUCT_DESCRIPTION` when
    /// the table has none of its own.
    const DESCRIPTION: &'static str;

    fn to_variables(&self, codec: &TimeCodec<'_>) -> Result<BTreeMap<String, Variable>>;

    fn from_variables(table: &TableFile, codec: &TimeCodec<'_>) -> Result<Self>;
}

fn int1_values(table: &TableFile, name: &str) -> Result<Vec<i8>> {
    match table.variable(name)? {
        Column::Int1(values) => Ok(values.clone()),
        other => Err(type_mismatch(name, other, "CDF_INT1")),
    }
}

impl Columnar for OrbitDirectionSeries {
    const DESCRIPTION: &'static str = "Orbit direction boundaries.";

    fn to_variables(&self, codec: &TimeCodec<'_>) -> Result<BTreeMap<String, Variable>> {
        let mut variables = BTreeMap::new();
        variables.insert(
            TIMESTAMP_VAR.to_string(),
            Variable::new(Column::from_times(codec, self.times())?, "Time stamp", "-"),
        );
        variables.insert(
            BOUNDARY_TYPE_VAR.to_string(),
            Variable::new(
                Column::Int1(self.boundaries().iter().map(|&b| i8::from(b)).collect()),
                "Boundary type (regular 0, block start 1, block end -1)",
                "-",
            ),
        );
        variables.insert(
            ORBIT_DIRECTION_VAR.to_string(),
            Variable::new(
                Column::Int1(self.directions().iter().map(|&d| i8::from(d)).collect()),
                "Orbit direction after this point. (ascending 1, descending -1, undefined 0)",
                "-",
            ),
        );
        Ok(variables)
    }

    fn from_variables(table: &TableFile, codec: &TimeCodec<'_>) -> Result<Self> {
        let times = table.variable(TIMESTAMP_VAR)?.to_times(codec)?;
        let directions = int1_values(table, ORBIT_DIRECTION_VAR)?
            .into_iter()
            .map(OrbitDirection::try_from)
            .collect::<Result<Vec<_>>>()?;
        let boundaries = int1_values(table, BOUNDARY_TYPE_VAR)?
            .into_iter()
            .map(BoundaryType::try_from)
            .collect::<Result<Vec<_>>>()?;
        OrbitDirectionSeries::new(times, directions, boundaries)
            .map_err(|e| Error::integrity(e.to_string()))
    }
}

impl Columnar for ConjunctionSeries {
    const DESCRIPTION: &'static str = "Spacecraft conjunctions.";

    fn to_variables(&self, codec: &TimeCodec<'_>) -> Result<BTreeMap<String, Variable>> {
        let mut variables = BTreeMap::new();
        variables.insert(
            TIMESTAMP_VAR.to_string(),
            Variable::new(Column::from_times(codec, self.times())?, "Timestamp", "-"),
        );
        variables.insert(
            ANGULAR_SEPARATION_VAR.to_string(),
            Variable::new(
                Column::Double(self.separations().to_vec()),
                "Spacecrafts' great-circle distance.",
                "deg",
            ),
        );
        Ok(variables)
    }

    fn from_variables(table: &TableFile, codec: &TimeCodec<'_>) -> Result<Self> {
        let times = table.variable(TIMESTAMP_VAR)?.to_times(codec)?;
        let separations = match table.variable(ANGULAR_SEPARATION_VAR)? {
            Column::Double(values) => values.clone(),
            other => return Err(type_mismatch(ANGULAR_SEPARATION_VAR, other, "CDF_DOUBLE")),
        };
        ConjunctionSeries::new(times, separations).map_err(|e| Error::integrity(e.to_string()))
    }
}
