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

use serde::{Deserialize, Serialize};

/// How a sensor reports a hit's amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// A single bit per pixel: hit or no hit.
    PixelBinary,
    /// Time-over-threshold amplitude per pixel.
    PixelTot,
    /// CCPDv4-style binary readout with its own timestamp quantisation.
    Ccpdv4Binary,
}

/// A named, rectangular sub-range of pixels. Regions on one sensor are
/// exclusive by construction: validated at device-construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub col_min: i32,
    pub col_max: i32,
    pub row_min: i32,
    pub row_max: i32,
}

impl Region {
    pub fn contains(&self, col: i32, row: i32) -> bool {
        (self.col_min..self.col_max).contains(&col) && (self.row_min..self.row_max).contains(&row)
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.col_min < other.col_max
            && other.col_min < self.col_max
            && self.row_min < other.row_max
            && other.row_min < self.row_max
    }
}

/// Immutable geometric and electrical description of a pixel sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub name: String,
    pub measurement: MeasurementKind,
    pub cols: i32,
    pub rows: i32,
    pub pitch_col: f64,
    pub pitch_row: f64,
    pub pitch_timestamp: f64,
    pub timestamp_min: i64,
    /// Exclusive upper bound, after the config's inclusive value is widened
    /// by one at load time.
    pub timestamp_max: i64,
    pub value_max: i64,
    pub x_x0: f64,
    pub regions: Vec<Region>,
}

impl Sensor {
    /// Index of the region containing `(col, row)`, if any.
    pub fn region_of(&self, col: i32, row: i32) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(col, row))
    }

    pub fn num_pixels(&self) -> i64 {
        self.cols as i64 * self.rows as i64
    }

    pub fn min_pitch(&self) -> f64 {
        self.pitch_col.min(self.pitch_row)
    }

    /// The sensor's active rectangle in its own local frame, as
    /// `(u_min, u_max, v_min, v_max)`. Pixel `(0, 0)` sits at the local
    /// origin; `(col, row)` maps to `(col * pitch_col, row * pitch_row)`.
    pub fn sensitive_area(&self) -> (f64, f64, f64, f64) {
        (
            0.0,
            self.cols as f64 * self.pitch_col,
            0.0,
            self.rows as f64 * self.pitch_row,
        )
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:?}] {}x{} px, pitch ({:.4}, {:.4}) mm, {} region(s)",
            self.name,
            self.measurement,
            self.cols,
            self.rows,
            self.pitch_col,
            self.pitch_row,
            self.regions.len()
        )
    }
}
