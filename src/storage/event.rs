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

use crate::errors::InvariantError;
use crate::linalg::SensorId;
use crate::storage::{SensorEvent, Track};

/// One fixed-size window of data: one [`SensorEvent`] per configured
/// sensor, plus any [`Track`]s reconstructed across them.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub frame: u64,
    pub timestamp: u64,
    pub sensors: Vec<SensorEvent>,
    pub tracks: Vec<Track>,
}

impl Event {
    pub fn new(frame: u64, timestamp: u64, n_sensors: usize) -> Self {
        Event {
            frame,
            timestamp,
            sensors: (0..n_sensors)
                .map(|_| SensorEvent::new(frame, timestamp))
                .collect(),
            tracks: Vec::new(),
        }
    }

    pub fn sensor(&self, sensor_id: SensorId) -> &SensorEvent {
        &self.sensors[sensor_id]
    }

    pub fn sensor_mut(&mut self, sensor_id: SensorId) -> &mut SensorEvent {
        &mut self.sensors[sensor_id]
    }

    /// Add a track and flip every cluster it claims to point back at it,
    /// failing if any of those clusters is already owned by another track.
    pub fn add_track(&mut self, track: Track) -> Result<usize, InvariantError> {
        for (&sensor_id, &cluster_idx) in &track.clusters {
            let cluster = &self.sensors[sensor_id].clusters[cluster_idx];
            if cluster.is_assigned() {
                return Err(InvariantError::ClusterAlreadyOwned {
                    sensor_id,
                    cluster_index: cluster_idx,
                });
            }
        }
        let track_idx = self.tracks.len();
        for (&sensor_id, &cluster_idx) in &track.clusters {
            self.sensors[sensor_id].clusters[cluster_idx].track = Some(track_idx);
        }
        self.tracks.push(track);
        Ok(track_idx)
    }

    /// Every `track.clusters[sid]` must resolve inside `sensors[sid].clusters`.
    pub fn cluster_refs_valid(&self) -> bool {
        self.tracks.iter().all(|t| {
            t.clusters
                .iter()
                .all(|(&sid, &cidx)| sid < self.sensors.len() && cidx < self.sensors[sid].clusters.len())
        })
    }

    /// Drop tracks that fail `keep`, freeing their clusters back up and
    /// renumbering the survivors' back-references. Must be called before
    /// [`crate::processors::populate_local_states`], which is the only
    /// other place a track index is cached.
    pub fn retain_tracks(&mut self, mut keep: impl FnMut(&Track) -> bool) {
        let mut remap = vec![None; self.tracks.len()];
        let mut survivors = Vec::with_capacity(self.tracks.len());
        for (old_idx, track) in self.tracks.drain(..).enumerate() {
            if keep(&track) {
                remap[old_idx] = Some(survivors.len());
                survivors.push(track);
            }
        }
        for sensor_event in &mut self.sensors {
            for cluster in &mut sensor_event.clusters {
                cluster.track = cluster.track.and_then(|t| remap[t]);
            }
        }
        self.tracks = survivors;
    }
}
