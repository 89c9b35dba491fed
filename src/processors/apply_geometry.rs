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

//! Converts each cluster's raw `(col, row, timestamp)` pixel coordinates
//! into its sensor's local physical frame, ready for the track finder and
//! fitter to transform through the geometry.

use nalgebra::Matrix4;

use crate::device::Device;
use crate::linalg::Vec4;
use crate::storage::Event;

pub fn apply_geometry(device: &Device, event: &mut Event) {
    for sensor_id in 0..device.num_sensors() {
        let sensor = device.sensor(sensor_id);
        let scale_pitch = Matrix4::from_diagonal(&Vec4::new(
            sensor.pitch_col,
            sensor.pitch_row,
            1.0,
            sensor.pitch_timestamp,
        ));

        for cluster in &mut event.sensor_mut(sensor_id).clusters {
            let mut cov = Matrix4::zeros();
            cov[(0, 0)] = cluster.cov_col_row_ts[(0, 0)];
            cov[(0, 1)] = cluster.cov_col_row_ts[(0, 1)];
            cov[(1, 0)] = cluster.cov_col_row_ts[(1, 0)];
            cov[(1, 1)] = cluster.cov_col_row_ts[(1, 1)];
            cov[(3, 3)] = cluster.cov_col_row_ts[(2, 2)];

            cluster.local = Vec4::new(cluster.col, cluster.row, 0.0, cluster.timestamp);
            cluster.local = scale_pitch * cluster.local;
            cluster.cov_local = crate::linalg::transform_covariance4(&scale_pitch, &cov);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MeasurementKind, Sensor};
    use crate::storage::Cluster;
    use approx::assert_relative_eq;

    #[test]
    fn pitch_scales_pixel_units_to_physical_units() {
        let sensor = Sensor {
            name: "s".into(),
            measurement: MeasurementKind::PixelBinary,
            cols: 100,
            rows: 100,
            pitch_col: 0.02,
            pitch_row: 0.025,
            pitch_timestamp: 1.0,
            timestamp_min: 0,
            timestamp_max: 16,
            value_max: 1,
            x_x0: 0.001,
            regions: vec![],
        };
        let device = Device::new(vec![sensor]).unwrap();
        let mut event = Event::new(0, 0, 1);
        let mut c = Cluster::new();
        c.col = 10.0;
        c.row = 20.0;
        c.timestamp = 3.0;
        c.cov_col_row_ts[(0, 0)] = 1.0;
        event.sensor_mut(0).add_cluster(c);

        apply_geometry(&device, &mut event);

        let local = event.sensor(0).clusters[0].local;
        assert_relative_eq!(local.x, 0.2, epsilon = 1e-12);
        assert_relative_eq!(local.y, 0.5, epsilon = 1e-12);
    }
}
