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

//! Noise scan: estimate each pixel's expected hit rate from its
//! neighbourhood via kernel density smoothing, and flag pixels whose
//! occupancy departs from that estimate by an absolute or local-relative
//! cut.

use log::info;
use std::f64::consts::SQRT_2;

use crate::device::{PixelMask, Sensor};
use crate::linalg::SensorId;
use crate::storage::Event;

/// Inclusive pixel rectangle, as configured; widened to half-open `[min,
/// max)` once at construction.
#[derive(Debug, Clone, Copy)]
pub struct Roi {
    pub col_min: i32,
    pub col_max: i32,
    pub row_min: i32,
    pub row_max: i32,
}

impl Roi {
    fn clamp_to(&self, sensor: &Sensor) -> Roi {
        Roi {
            col_min: self.col_min.max(0),
            col_max: self.col_max.min(sensor.cols),
            row_min: self.row_min.max(0),
            row_max: self.row_max.min(sensor.rows),
        }
    }

    fn cols(&self) -> usize {
        (self.col_max - self.col_min).max(0) as usize
    }

    fn rows(&self) -> usize {
        (self.row_max - self.row_min).max(0) as usize
    }
}

/// Dense occupancy/density/significance/mask grids over one sensor's ROI,
/// and the finished [`PixelMask`].
pub struct NoiseScan {
    sensor_id: SensorId,
    roi: Roi,
    bandwidth_col: f64,
    bandwidth_row: f64,
    sigma_max: f64,
    rate_max: f64,
    num_events: u64,
    occupancy: Vec<f64>,
    mask_absolute: Vec<bool>,
    density: Vec<f64>,
    significance: Vec<f64>,
    mask_relative: Vec<bool>,
}

impl NoiseScan {
    pub fn new(sensor: &Sensor, bandwidth: f64, sigma_max: f64, rate_max: f64, roi: Roi, sensor_id: SensorId) -> Self {
        let roi = roi.clamp_to(sensor);
        let n = roi.cols() * roi.rows();

        // adjust per-axis bandwidth for pixel pitch so the covered area is
        // approximately circular in metric coordinates.
        let scale = sensor.pitch_col.hypot(sensor.pitch_row) / SQRT_2;
        let bandwidth_col = bandwidth * scale / sensor.pitch_col;
        let bandwidth_row = bandwidth * scale / sensor.pitch_row;

        NoiseScan {
            sensor_id,
            roi,
            bandwidth_col,
            bandwidth_row,
            sigma_max,
            rate_max,
            num_events: 0,
            occupancy: vec![0.0; n],
            mask_absolute: vec![false; n],
            density: vec![0.0; n],
            significance: vec![0.0; n],
            mask_relative: vec![false; n],
        }
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if (self.roi.col_min..self.roi.col_max).contains(&col)
            && (self.roi.row_min..self.roi.row_max).contains(&row)
        {
            let c = (col - self.roi.col_min) as usize;
            let r = (row - self.roi.row_min) as usize;
            Some(r * self.roi.cols() + c)
        } else {
            None
        }
    }

    pub fn execute(&mut self, event: &Event) {
        for hit in &event.sensor(self.sensor_id).hits {
            if let Some(idx) = self.index(hit.col, hit.row) {
                self.occupancy[idx] += 1.0;
            }
        }
        self.num_events += 1;
    }

    /// Epanechnikov-kernel density estimate at `(icol, irow)`, skipping the
    /// point itself and any point already absolute-masked.
    fn estimate_density_at(&self, icol: i32, irow: i32) -> f64 {
        let imin = (icol as f64 - self.bandwidth_col).floor() as i32;
        let imax = (icol as f64 + self.bandwidth_col).ceil() as i32;
        let jmin = (irow as f64 - self.bandwidth_row).floor() as i32;
        let jmax = (irow as f64 + self.bandwidth_row).ceil() as i32;

        let mut sum_weights = 0.0;
        let mut sum_values = 0.0;
        for i in imin.max(self.roi.col_min)..=imax.min(self.roi.col_max - 1) {
            for j in jmin.max(self.roi.row_min)..=jmax.min(self.roi.row_max - 1) {
                if i == icol && j == irow {
                    continue;
                }
                let idx = self.index(i, j).expect("clamped to roi bounds");
                if self.mask_absolute[idx] {
                    continue;
                }
                let ui = (i - icol) as f64 / self.bandwidth_col;
                let uj = (j - irow) as f64 / self.bandwidth_row;
                let u2 = ui * ui + uj * uj;
                if u2 > 1.0 {
                    continue;
                }
                let w = 3.0 * (1.0 - u2) / 4.0;
                sum_weights += w;
                sum_values += w * self.occupancy[self.index(i, j).unwrap()];
            }
        }
        sum_values / sum_weights
    }

    pub fn finalize(&mut self) {
        let entries_max = self.num_events as f64 * self.rate_max;
        let mut masked_absolute = 0;
        for idx in 0..self.occupancy.len() {
            if self.occupancy[idx] > entries_max {
                self.mask_absolute[idx] = true;
                masked_absolute += 1;
            }
        }

        for r in self.roi.row_min..self.roi.row_max {
            for c in self.roi.col_min..self.roi.col_max {
                let idx = self.index(c, r).unwrap();
                self.density[idx] = self.estimate_density_at(c, r);
            }
        }

        let mut masked_relative = 0;
        for idx in 0..self.occupancy.len() {
            let obs = self.occupancy[idx];
            let exp = self.density[idx];
            let sig = (obs - exp) / exp.sqrt();
            self.significance[idx] = sig;
            if sig > self.sigma_max {
                self.mask_relative[idx] = true;
                masked_relative += 1;
            }
        }

        info!(
            "noise scan sensor {}: {} events, {masked_absolute} pixels masked (absolute), {masked_relative} masked (relative)",
            self.sensor_id, self.num_events
        );
    }

    /// Union of the absolute and relative masks as a [`PixelMask`].
    pub fn construct_masks(&self) -> PixelMask {
        let mut mask = PixelMask::new();
        for r in self.roi.row_min..self.roi.row_max {
            for c in self.roi.col_min..self.roi.col_max {
                let idx = self.index(c, r).unwrap();
                if self.mask_absolute[idx] || self.mask_relative[idx] {
                    mask.mask_pixel(self.sensor_id, c, r);
                }
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MeasurementKind;
    use crate::storage::Hit;

    fn sensor() -> Sensor {
        Sensor {
            name: "s".into(),
            measurement: MeasurementKind::PixelBinary,
            cols: 20,
            rows: 20,
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

    #[test]
    fn hot_pixel_is_absolute_masked() {
        let roi = Roi {
            col_min: 0,
            col_max: 20,
            row_min: 0,
            row_max: 20,
        };
        let mut scan = NoiseScan::new(&sensor(), 2.0, 5.0, 0.1, roi, 0);
        for f in 0..10 {
            let mut event = Event::new(f, f, 1);
            event.sensor_mut(0).add_hit(Hit::new(10, 10, 0, 1));
            scan.execute(&event);
        }
        scan.finalize();
        let mask = scan.construct_masks();
        assert!(mask.is_masked(0, 10, 10));
    }

    #[test]
    fn uniform_background_not_masked_when_sigma_cut_is_loose() {
        let roi = Roi {
            col_min: 0,
            col_max: 20,
            row_min: 0,
            row_max: 20,
        };
        // rate_max = 1.0 (hits/pixel/event) means 50 hits over 10 events is
        // well under the absolute cut, and a generous sigma_max keeps a
        // uniform background below the relative cut too.
        let mut scan = NoiseScan::new(&sensor(), 2.0, 1000.0, 1.0, roi, 0);
        for f in 0..10 {
            let mut event = Event::new(f, f, 1);
            for col in 0..20 {
                for row in 0..20 {
                    event.sensor_mut(0).add_hit(Hit::new(col, row, 0, 1));
                }
            }
            scan.execute(&event);
        }
        scan.finalize();
        let mask = scan.construct_masks();
        assert!(!mask.is_masked(0, 10, 10));
    }
}
