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

//! Regenerates each sensor's per-track local state: the fitted `(u, v)`
//! intercept (and its propagated covariance) of every track, evaluated at
//! every sensor in the device -- not just the sensors the track was built
//! from. This is what residuals and efficiency analyzers read; it must be
//! rebuilt whenever a track is (re)fit or the geometry changes.

use crate::device::Device;
use crate::storage::Event;

use super::track_fitter::fit_local;

/// Clear and refill `local_states` on every sensor event, one state per
/// track per sensor.
pub fn populate_local_states(device: &Device, event: &mut Event) {
    for sensor_event in &mut event.sensors {
        sensor_event.local_states.clear();
    }

    for track_idx in 0..event.tracks.len() {
        let clusters = event.tracks[track_idx].clusters.clone();
        for &sensor_id in device.sensor_ids() {
            let mut state = fit_local(event, device.geometry(), &clusters, sensor_id, false);
            state.track = Some(track_idx);
            state.cluster = clusters.get(&sensor_id).copied();

            let sensor_event = event.sensor_mut(sensor_id);
            let state_idx = sensor_event.local_states.len();
            if let Some(cluster_idx) = state.cluster {
                sensor_event.clusters[cluster_idx].matched_state = Some(state_idx);
            }
            sensor_event.local_states.push(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, Plane};
    use crate::storage::Cluster;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::collections::BTreeMap;

    fn straight_device_event() -> (Device, Event) {
        let mut geo = Geometry::new();
        for i in 0..3 {
            geo.insert_plane(
                i,
                Plane::from_angles_321(0.0, 0.0, 0.0, Vector3::new(0.0, 0.0, i as f64 * 10.0)),
            );
        }
        let sensor = crate::device::Sensor {
            name: "s".into(),
            measurement: crate::device::MeasurementKind::PixelBinary,
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
        };
        let mut device = Device::new(vec![sensor.clone(), sensor.clone(), sensor]).unwrap();
        device.set_geometry(geo);

        let mut event = Event::new(0, 0, 3);
        for i in 0..3 {
            let mut c = Cluster::new();
            c.local = crate::linalg::Vec4::new(1.0 + i as f64 * 0.1, 2.0, 0.0, 0.0);
            c.cov_local[(0, 0)] = 1e-4;
            c.cov_local[(1, 1)] = 1e-4;
            c.cov_local[(2, 2)] = 1e-4;
            c.cov_local[(3, 3)] = 1e-4;
            event.sensor_mut(i).add_cluster(c);
        }
        (device, event)
    }

    #[test]
    fn every_sensor_gets_one_local_state_per_track() {
        let (device, mut event) = straight_device_event();
        let clusters: BTreeMap<_, _> = (0..3).map(|i| (i, 0)).collect();
        let track = crate::processors::track_fitter::fit_global(&event, device.geometry(), &clusters);
        event.add_track(track).unwrap();

        populate_local_states(&device, &mut event);

        for sid in 0..3 {
            assert_eq!(event.sensor(sid).local_states.len(), 1);
            assert_eq!(event.sensor(sid).local_states[0].cluster, Some(0));
        }
        assert_eq!(event.sensor(0).clusters[0].matched_state, Some(0));
    }

    #[test]
    fn biased_state_matches_straight_line() {
        let (device, mut event) = straight_device_event();
        let clusters: BTreeMap<_, _> = (0..3).map(|i| (i, 0)).collect();
        let track = crate::processors::track_fitter::fit_global(&event, device.geometry(), &clusters);
        event.add_track(track).unwrap();

        populate_local_states(&device, &mut event);
        assert_relative_eq!(event.sensor(1).local_states[0].u(), 1.1, epsilon = 1e-6);
    }
}
