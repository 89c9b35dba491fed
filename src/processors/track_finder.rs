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

//! Seed-and-extend track finder: seeds candidates on the first sensors in
//! tracking order, extends them sensor by sensor with ambiguity
//! bifurcation, then globally selects a conflict-free set.

use std::collections::BTreeMap;

use crate::device::Device;
use crate::errors::InvariantError;
use crate::linalg::SensorId;
use crate::storage::{Event, Track};

#[derive(Debug, Clone)]
struct Candidate {
    /// `(sensor_id, cluster_index)` in the order clusters were added.
    members: Vec<(SensorId, usize)>,
}

impl Candidate {
    fn last_sensor_cluster(&self) -> (SensorId, usize) {
        *self.members.last().expect("candidate always has >= 1 member")
    }
}

pub struct TrackFinder {
    seeding: Vec<SensorId>,
    tracking: Vec<SensorId>,
    clusters_min: usize,
    search_spatial_sigma_max: f64,
}

impl TrackFinder {
    pub fn new(
        sensors: Vec<SensorId>,
        clusters_min: usize,
        search_spatial_sigma_max: f64,
    ) -> Result<Self, InvariantError> {
        if sensors.len() < 2 || sensors.len() < clusters_min {
            return Err(InvariantError::TooFewSensors {
                min: clusters_min.max(2),
                got: sensors.len(),
            });
        }
        let seed_sensors = 1 + sensors.len() - clusters_min;
        let seeding = sensors[..seed_sensors].to_vec();
        Ok(TrackFinder {
            seeding,
            tracking: sensors,
            clusters_min,
            search_spatial_sigma_max,
        })
    }

    pub fn process(&self, device: &Device, event: &mut Event) -> Result<(), InvariantError> {
        for &seed in &self.seeding {
            let mut candidates: Vec<Candidate> = event
                .sensor(seed)
                .free_clusters()
                .map(|cidx| Candidate {
                    members: vec![(seed, cidx)],
                })
                .collect();

            for &sid in &self.tracking {
                if sid == seed {
                    continue;
                }
                self.search_sensor(device, event, sid, &mut candidates);
            }

            self.select_tracks(device, event, candidates)?;
        }
        Ok(())
    }

    fn search_sensor(
        &self,
        device: &Device,
        event: &Event,
        sensor_id: SensorId,
        candidates: &mut Vec<Candidate>,
    ) {
        let beam_slope = device.geometry().beam_slope();
        let n_initial = candidates.len();

        let mut extensions: Vec<Candidate> = Vec::new();
        for candidate in candidates.iter_mut().take(n_initial) {
            let (last_sid, last_cidx) = candidate.last_sensor_cluster();
            let last = &event.sensor(last_sid).clusters[last_cidx];
            let last_plane = device
                .geometry()
                .get_plane(last_sid)
                .expect("seeded sensor has a plane");
            let last_global = last_plane.to_global(&last.local);

            let mut matched: Option<usize> = None;
            for cidx in event.sensor(sensor_id).free_clusters() {
                let curr = &event.sensor(sensor_id).clusters[cidx];
                let curr_plane = device
                    .geometry()
                    .get_plane(sensor_id)
                    .expect("tracking sensor has a plane");
                let curr_global = curr_plane.to_global(&curr.local);

                // local (u, v) variance as a proxy for the global position
                // uncertainty, matching the per-axis (not full covariance)
                // distance used here.
                let err_x = (curr.cov_local[(0, 0)] + last.cov_local[(0, 0)]).sqrt();
                let err_y = (curr.cov_local[(1, 1)] + last.cov_local[(1, 1)]).sqrt();

                let delta = curr_global - last_global;
                let dx = delta.x - delta.z * beam_slope.x;
                let dy = delta.y - delta.z * beam_slope.y;
                let sigma = ((dx / err_x).powi(2) + (dy / err_y).powi(2)).sqrt();

                if self.search_spatial_sigma_max < sigma {
                    continue;
                }

                match matched {
                    None => matched = Some(cidx),
                    Some(_) => {
                        let mut bifurcated = candidate.clone();
                        bifurcated.members.push((sensor_id, cidx));
                        extensions.push(bifurcated);
                    }
                }
            }
            if let Some(cidx) = matched {
                candidate.members.push((sensor_id, cidx));
            }
        }
        candidates.append(&mut extensions);
    }

    fn select_tracks(
        &self,
        device: &Device,
        event: &mut Event,
        mut candidates: Vec<Candidate>,
    ) -> Result<(), InvariantError> {
        let mut fitted: Vec<(Candidate, Track)> = candidates
            .drain(..)
            .map(|c| {
                let clusters: BTreeMap<SensorId, usize> = c.members.iter().copied().collect();
                let track = crate::processors::track_fitter::fit_global(event, device.geometry(), &clusters);
                (c, track)
            })
            .collect();

        fitted.sort_by(|(_, a), (_, b)| {
            b.n_clusters()
                .cmp(&a.n_clusters())
                .then(a.reduced_chi2().partial_cmp(&b.reduced_chi2()).unwrap_or(std::cmp::Ordering::Equal))
        });

        for (candidate, track) in fitted {
            if candidate.members.len() < self.clusters_min {
                continue;
            }
            let all_free = candidate
                .members
                .iter()
                .all(|&(sid, cidx)| !event.sensor(sid).clusters[cidx].is_assigned());
            if !all_free {
                continue;
            }
            event.add_track(track)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MeasurementKind, Sensor};
    use crate::geometry::{Geometry, Plane};
    use crate::linalg::{Mat4, SymMatrix3, Vec3};
    use crate::storage::Cluster;

    fn plain_sensor() -> Sensor {
        Sensor {
            name: "s".into(),
            measurement: MeasurementKind::PixelBinary,
            cols: 100,
            rows: 100,
            pitch_col: 0.02,
            pitch_row: 0.02,
            pitch_timestamp: 25.0,
            timestamp_min: 0,
            timestamp_max: 16,
            value_max: 1,
            x_x0: 0.001,
            regions: vec![],
        }
    }

    fn device_with_planes(zs: &[f64]) -> Device {
        device_with_planes_and_slope(zs, (0.1, 0.0))
    }

    fn device_with_planes_and_slope(zs: &[f64], slope: (f64, f64)) -> Device {
        let mut device = Device::new(zs.iter().map(|_| plain_sensor()).collect()).unwrap();
        let mut geo = Geometry::new();
        for (sid, &z) in zs.iter().enumerate() {
            geo.insert_plane(sid, Plane::from_angles_321(0.0, 0.0, 0.0, Vec3::new(0.0, 0.0, z)));
        }
        geo.set_beam_slope(crate::linalg::Vec2::new(slope.0, slope.1));
        device.set_geometry(geo);
        device
    }

    fn cluster_at(x: f64, y: f64, sigma: f64) -> Cluster {
        let mut c = Cluster::new();
        c.local = crate::linalg::Vec4::new(x, y, 0.0, 0.0);
        c.cov_local = Mat4::identity() * (sigma * sigma);
        c.cov_col_row_ts = SymMatrix3::identity();
        c
    }

    #[test]
    fn three_sensor_straight_line_is_one_track() {
        let device = device_with_planes(&[0.0, 10.0, 20.0]);
        let mut event = Event::new(0, 0, 3);
        event.sensor_mut(0).add_cluster(cluster_at(0.0, 0.0, 0.01));
        event.sensor_mut(1).add_cluster(cluster_at(1.0, 0.0, 0.01));
        event.sensor_mut(2).add_cluster(cluster_at(2.0, 0.0, 0.01));

        let finder = TrackFinder::new(vec![0, 1, 2], 3, 5.0).unwrap();
        finder.process(&device, &mut event).unwrap();

        assert_eq!(event.tracks.len(), 1);
        let track = &event.tracks[0];
        assert_eq!(track.n_clusters(), 3);
        // slope in x should be (2-0)/(20-0) = 0.1
        assert!((track.global_state.params[2] - 0.1).abs() < 1e-6);
        assert!(track.reduced_chi2() < 1e-3);
    }

    #[test]
    fn ambiguous_extension_bifurcates_and_selects_the_closer_one() {
        let device = device_with_planes(&[0.0, 10.0, 20.0]);
        let mut event = Event::new(0, 0, 3);
        event.sensor_mut(0).add_cluster(cluster_at(0.0, 0.0, 0.01));
        // two candidate extensions on sensor 1: the consistent one at (1, 0)
        // and a decoy at (1, 0.5) with much looser uncertainty.
        event.sensor_mut(1).add_cluster(cluster_at(1.0, 0.0, 0.01));
        event.sensor_mut(1).add_cluster(cluster_at(1.0, 0.5, 0.1));
        event.sensor_mut(2).add_cluster(cluster_at(2.0, 0.0, 0.01));

        let finder = TrackFinder::new(vec![0, 1, 2], 3, 5.0).unwrap();
        finder.process(&device, &mut event).unwrap();

        assert_eq!(event.tracks.len(), 1);
        let track = &event.tracks[0];
        assert_eq!(track.n_clusters(), 3);
        assert!(track.reduced_chi2() < 1.0);
        // the straight-line cluster, not the decoy, must be the one used.
        assert_eq!(track.clusters[&1], 0);
    }

    #[test]
    fn selected_tracks_share_no_cluster() {
        let device = device_with_planes(&[0.0, 10.0, 20.0]);
        let mut event = Event::new(0, 0, 3);
        event.sensor_mut(0).add_cluster(cluster_at(0.0, 0.0, 0.01));
        event.sensor_mut(0).add_cluster(cluster_at(0.0, 5.0, 0.01));
        event.sensor_mut(1).add_cluster(cluster_at(1.0, 0.0, 0.01));
        event.sensor_mut(1).add_cluster(cluster_at(1.0, 5.0, 0.01));
        event.sensor_mut(2).add_cluster(cluster_at(2.0, 0.0, 0.01));
        event.sensor_mut(2).add_cluster(cluster_at(2.0, 5.0, 0.01));

        let finder = TrackFinder::new(vec![0, 1, 2], 3, 5.0).unwrap();
        finder.process(&device, &mut event).unwrap();

        assert_eq!(event.tracks.len(), 2);
        for (i, a) in event.tracks.iter().enumerate() {
            for b in event.tracks.iter().skip(i + 1) {
                for (&sid, &cidx) in &a.clusters {
                    assert!(b.clusters.get(&sid) != Some(&cidx));
                }
            }
        }
    }

    #[test]
    fn too_few_sensors_is_a_configuration_error() {
        assert!(TrackFinder::new(vec![0], 3, 5.0).is_err());
    }
}
