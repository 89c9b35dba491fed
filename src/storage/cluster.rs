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

use crate::linalg::{SymMatrix3, Vec4, Mat4};

/// A group of connected, unmasked hits on one sensor, reduced to a single
/// weighted position/time estimate by the clusterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub col: f64,
    pub row: f64,
    pub timestamp: f64,
    pub value: f64,
    /// Covariance of `(col, row, timestamp)`.
    pub cov_col_row_ts: SymMatrix3,
    /// Local `(u, v, w, s)` position, populated once a geometry has been
    /// applied to this sensor event.
    pub local: Vec4,
    pub cov_local: Mat4,
    /// Indices into the owning sensor event's hit list.
    pub hits: Vec<usize>,
    pub region: Option<usize>,
    /// Index of the track this cluster has been assigned to, if any.
    pub track: Option<usize>,
    /// Index of the track state matched to this cluster during fitting.
    pub matched_state: Option<usize>,
}

impl Cluster {
    pub fn new() -> Self {
        Cluster {
            col: 0.0,
            row: 0.0,
            timestamp: 0.0,
            value: 0.0,
            cov_col_row_ts: SymMatrix3::zeros(),
            local: Vec4::zeros(),
            cov_local: Mat4::zeros(),
            hits: Vec::new(),
            region: None,
            track: None,
            matched_state: None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.track.is_some()
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}
