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

//! Coarse, track-free alignment: correct each sensor's global offset by the
//! running sum of mean cluster-position differences between it and its
//! neighbour, chained from a fixed reference sensor.

use std::collections::BTreeMap;

use log::info;

use crate::device::Device;
use crate::errors::{AlignSetNotSubsetSnafu, EmptyFixedSetSnafu, InvariantError};
use crate::geometry::{sorted_along_beam, Geometry};
use crate::linalg::SensorId;
use crate::storage::Event;

use super::{Aligner, RunningMean};

pub struct CorrelationAligner {
    /// Consecutive pairs to correlate, in chain order starting at the fixed
    /// reference sensor.
    chain: Vec<SensorId>,
    diffs: BTreeMap<(SensorId, SensorId), (RunningMean, RunningMean)>,
}

impl CorrelationAligner {
    pub fn new(
        device: &Device,
        fixed_ids: &[SensorId],
        align_ids: Vec<SensorId>,
    ) -> Result<Self, InvariantError> {
        if fixed_ids.is_empty() {
            return EmptyFixedSetSnafu.fail();
        }
        if !align_ids.iter().all(|id| device.sensor_ids().contains(id)) {
            return AlignSetNotSubsetSnafu.fail();
        }

        let mut chain = vec![fixed_ids[0]];
        chain.extend(sorted_along_beam(device.geometry(), &align_ids));

        Ok(CorrelationAligner {
            chain,
            diffs: BTreeMap::new(),
        })
    }

    fn mean_global_position(device: &Device, event: &Event, sensor_id: SensorId) -> Option<(f64, f64)> {
        let plane = device.geometry().get_plane(sensor_id).ok()?;
        let clusters = &event.sensor(sensor_id).clusters;
        if clusters.is_empty() {
            return None;
        }
        let (mut sx, mut sy) = (0.0, 0.0);
        for cluster in clusters {
            let global = plane.to_global(&cluster.local);
            sx += global.x;
            sy += global.y;
        }
        let n = clusters.len() as f64;
        Some((sx / n, sy / n))
    }
}

impl Aligner for CorrelationAligner {
    fn name(&self) -> &str {
        "CorrelationAligner"
    }

    fn execute(&mut self, device: &Device, event: &Event) {
        for pair in self.chain.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let (Some((xa, ya)), Some((xb, yb))) = (
                Self::mean_global_position(device, event, a),
                Self::mean_global_position(device, event, b),
            ) else {
                continue;
            };
            let entry = self.diffs.entry((a, b)).or_default();
            entry.0.add(xb - xa);
            entry.1.add(yb - ya);
        }
    }

    fn updated_geometry(&self, device: &Device) -> Geometry {
        let mut geo = device.geometry().clone();
        let mut delta_x = 0.0;
        let mut delta_y = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;

        for pair in self.chain.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let Some((dx, dy)) = self.diffs.get(&(a, b)) else {
                continue;
            };
            delta_x -= dx.mean();
            delta_y -= dy.mean();
            var_x += dx.mean_error() * dx.mean_error();
            var_y += dy.mean_error() * dy.mean_error();

            info!(
                "{} alignment correction: delta x {delta_x:.6} +- {:.6}, delta y {delta_y:.6} +- {:.6}",
                device.sensor(b).name,
                var_x.sqrt(),
                var_y.sqrt()
            );
            let _ = geo.correct_global_offset(b, delta_x, delta_y, 0.0);
        }
        geo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MeasurementKind, Sensor};
    use crate::geometry::Plane;
    use crate::linalg::Vec3;
    use crate::storage::{Cluster, Event};
    use approx::assert_relative_eq;

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

    fn cluster_at_local(x: f64, y: f64) -> Cluster {
        let mut c = Cluster::new();
        c.local = crate::linalg::Vec4::new(x, y, 0.0, 0.0);
        c
    }

    #[test]
    fn correction_cancels_the_mean_global_offset() {
        let device = Device::new(vec![plain_sensor(), plain_sensor()]).unwrap();
        let mut geo = Geometry::new();
        geo.insert_plane(0, Plane::from_angles_321(0.0, 0.0, 0.0, Vec3::new(0.0, 0.0, 0.0)));
        // sensor 1 is misaligned by (0.5, 0.3) in global x/y relative to its
        // nominal position.
        geo.insert_plane(1, Plane::from_angles_321(0.0, 0.0, 0.0, Vec3::new(0.5, 0.3, 10.0)));
        let mut device = device;
        device.set_geometry(geo);

        let mut event = Event::new(0, 0, 2);
        event.sensor_mut(0).add_cluster(cluster_at_local(0.0, 0.0));
        event.sensor_mut(1).add_cluster(cluster_at_local(0.0, 0.0));

        let mut aligner = CorrelationAligner::new(&device, &[0], vec![1]).unwrap();
        aligner.execute(&device, &event);
        let updated = aligner.updated_geometry(&device);

        let new_origin = updated.get_plane(1).unwrap().origin();
        assert_relative_eq!(new_origin.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(new_origin.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_fixed_set_is_rejected() {
        let device = Device::new(vec![plain_sensor()]).unwrap();
        assert!(CorrelationAligner::new(&device, &[], vec![0]).is_err());
    }

    #[test]
    fn align_set_must_be_a_device_subset() {
        let device = Device::new(vec![plain_sensor()]).unwrap();
        assert!(CorrelationAligner::new(&device, &[0], vec![99]).is_err());
    }
}
