/*
    telescope-align, track reconstruction and alignment for pixel telescope test-beam data
    Copyright (c) 2024 the telescope-align contributors

    Permission is hereby granted, free of charge, to any person obtaining a copy
    of this software and associated documentation files (the "Software"), to deal
    in the Software without restriction, including without limitation the rights
    to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
    copies of the Software, and to permit persons to whom the Software is
    furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
    OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
    SOFTWARE.
*/

//! Error types for every fallible subsystem. Numeric issues that should not
//! abort processing (e.g. a shaky angle-extraction residual) are logged via
//! [`log::warn!`] at their detection site instead of being modeled here.

use snafu::Snafu;

use crate::linalg::SensorId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("missing required key `{key}` in {document}"))]
    MissingKey { document: String, key: String },

    #[snafu(display("key `{key}` in {document} has the wrong type: {detail}"))]
    WrongType {
        document: String,
        key: String,
        detail: String,
    },

    #[snafu(display("value `{key}` in {document} is out of range: {detail}"))]
    OutOfRange {
        document: String,
        key: String,
        detail: String,
    },

    #[snafu(display("{document} is internally inconsistent: {detail}"))]
    Inconsistent { document: String, detail: String },

    #[snafu(display("failed to parse TOML: {source}"))]
    Toml { source: toml::de::Error },

    #[snafu(display("failed to serialize TOML: {source}"))]
    TomlSer { source: toml::ser::Error },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IoError {
    #[snafu(display("failed to open {path}: {source}"))]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to read {path}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {path}: {source}"))]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("corrupt record in {path}: {detail}"))]
    Corrupt { path: String, detail: String },

    #[snafu(display("parquet error reading/writing {path}: {source}"))]
    Parquet {
        path: String,
        source: parquet::errors::ParquetError,
    },

    #[snafu(display(
        "merged readers disagree on event count: {name_a} has {count_a}, {name_b} has {count_b}"
    ))]
    MergeLengthMismatch {
        name_a: String,
        count_a: u64,
        name_b: String,
        count_b: u64,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GeometryError {
    #[snafu(display("unknown sensor id {sensor_id}"))]
    UnknownSensor { sensor_id: SensorId },

    #[snafu(display("singular rotation for sensor {sensor_id}: {detail}"))]
    SingularRotation { sensor_id: SensorId, detail: String },

    #[snafu(display("beam parameters are inconsistent: {detail}"))]
    InconsistentBeam { detail: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InvariantError {
    #[snafu(display("cluster {cluster_index} on sensor {sensor_id} already owned by a track"))]
    ClusterAlreadyOwned {
        sensor_id: SensorId,
        cluster_index: usize,
    },

    #[snafu(display("alignable sensor set is not a subset of the input sensor set"))]
    AlignSetNotSubset,

    #[snafu(display("fixed/reference sensor set is empty"))]
    EmptyFixedSet,

    #[snafu(display("track finder requires at least {min} sensors, got {got}"))]
    TooFewSensors { min: usize, got: usize },

    #[snafu(display("regions on sensor {sensor_id} overlap: {detail}"))]
    OverlappingRegions { sensor_id: SensorId, detail: String },
}

/// Crate-wide error type threading the per-subsystem errors through a single
/// `Result` alias used at component boundaries and in the CLI binaries.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AlignError {
    #[snafu(display("{source}"))]
    Config { source: ConfigError },

    #[snafu(display("{source}"))]
    Io { source: IoError },

    #[snafu(display("{source}"))]
    Geometry { source: GeometryError },

    #[snafu(display("{source}"))]
    Invariant { source: InvariantError },
}

impl From<ConfigError> for AlignError {
    fn from(source: ConfigError) -> Self {
        AlignError::Config { source }
    }
}

impl From<IoError> for AlignError {
    fn from(source: IoError) -> Self {
        AlignError::Io { source }
    }
}

impl From<GeometryError> for AlignError {
    fn from(source: GeometryError) -> Self {
        AlignError::Geometry { source }
    }
}

impl From<InvariantError> for AlignError {
    fn from(source: InvariantError) -> Self {
        AlignError::Invariant { source }
    }
}

pub type Result<T, E = AlignError> = std::result::Result<T, E>;
