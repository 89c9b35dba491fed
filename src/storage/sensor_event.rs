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

use crate::storage::{Cluster, Hit, TrackState};

/// All hits, clusters and fitted local states for one sensor, for one
/// read-out window.
#[derive(Debug, Clone, Default)]
pub struct SensorEvent {
    pub frame: u64,
    pub timestamp: u64,
    pub hits: Vec<Hit>,
    pub clusters: Vec<Cluster>,
    pub local_states: Vec<TrackState>,
}

impl SensorEvent {
    pub fn new(frame: u64, timestamp: u64) -> Self {
        SensorEvent {
            frame,
            timestamp,
            hits: Vec::new(),
            clusters: Vec::new(),
            local_states: Vec::new(),
        }
    }

    pub fn add_hit(&mut self, hit: Hit) -> usize {
        self.hits.push(hit);
        self.hits.len() - 1
    }

    pub fn add_cluster(&mut self, cluster: Cluster) -> usize {
        let idx = self.clusters.len();
        for &hit_idx in &cluster.hits {
            self.hits[hit_idx].cluster = Some(idx);
        }
        self.clusters.push(cluster);
        idx
    }

    /// Unassigned clusters, i.e. not yet owned by any track.
    pub fn free_clusters(&self) -> impl Iterator<Item = usize> + '_ {
        self.clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_assigned())
            .map(|(i, _)| i)
    }

    /// Every hit's cluster back-reference must resolve inside this sensor
    /// event's cluster list, as required by the data model's ownership
    /// invariant.
    pub fn hit_cluster_refs_valid(&self) -> bool {
        self.hits
            .iter()
            .all(|h| h.cluster.map_or(true, |c| c < self.clusters.len()))
    }
}
