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

use std::collections::BTreeMap;

use crate::linalg::SensorId;
use crate::storage::TrackState;

/// A reconstructed straight-line track: one global state plus a goodness of
/// fit, and the set of per-sensor clusters (by sensor id) it was built
/// from. Per-sensor local states live on the owning [`Event`](super::Event)'s
/// sensor events, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub global_state: TrackState,
    pub chi2: f64,
    pub dof: usize,
    /// sensor id -> index of the cluster on that sensor's [`SensorEvent`](super::SensorEvent).
    pub clusters: BTreeMap<SensorId, usize>,
}

impl Track {
    pub fn new(global_state: TrackState, chi2: f64, dof: usize) -> Self {
        Track {
            global_state,
            chi2,
            dof,
            clusters: BTreeMap::new(),
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn reduced_chi2(&self) -> f64 {
        if self.dof == 0 {
            f64::INFINITY
        } else {
            self.chi2 / self.dof as f64
        }
    }
}
