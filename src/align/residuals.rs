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

//! Fine, track-based alignment: derive per-sensor `(du, dv, dgamma)`
//! corrections from unbiased residuals and apply them damped, to avoid
//! oscillation between iterations.

use std::collections::BTreeMap;

use log::info;

use crate::device::Device;
use crate::geometry::Geometry;
use crate::linalg::{Mat6, SensorId, Vec6};
use crate::processors::track_fitter;
use crate::storage::Event;

use super::{Aligner, RunningMean};

/// Least-norm solution of the under-determined system `ru = du - dgamma*v,
/// rv = dv + dgamma*u` (pseudo-inverse), given the unbiased track intercept
/// `(u, v)` and the unbiased residuals `(ru, rv)`.
fn alignment_correction(u: f64, v: f64, ru: f64, rv: f64) -> (f64, f64, f64) {
    let f = 1.0 + u * u + v * v;
    let du = (ru + ru * u * u + rv * u * v) / f;
    let dv = (rv + rv * v * v + ru * u * v) / f;
    let dgamma = (rv * u - ru * v) / f;
    (du, dv, dgamma)
}

pub struct ResidualsAligner {
    align_ids: Vec<SensorId>,
    damping: f64,
    track_slope: (RunningMean, RunningMean),
    corrections: BTreeMap<SensorId, (RunningMean, RunningMean, RunningMean)>,
}

impl ResidualsAligner {
    pub fn new(align_ids: Vec<SensorId>, damping: f64) -> Self {
        ResidualsAligner {
            align_ids,
            damping,
            track_slope: (RunningMean::default(), RunningMean::default()),
            corrections: BTreeMap::new(),
        }
    }
}

impl Aligner for ResidualsAligner {
    fn name(&self) -> &str {
        "ResidualsAligner"
    }

    fn execute(&mut self, device: &Device, event: &Event) {
        for track in &event.tracks {
            // global fit layout is [x, y, dx/dz, dy/dz, t, dt/dz]
            self.track_slope.0.add(track.global_state.params[2]);
            self.track_slope.1.add(track.global_state.params[3]);
        }

        for &sensor_id in &self.align_ids {
            for cluster in &event.sensor(sensor_id).clusters {
                let Some(track_idx) = cluster.track else {
                    continue;
                };
                let track = &event.tracks[track_idx];

                let state = track_fitter::fit_local(
                    event,
                    device.geometry(),
                    &track.clusters,
                    sensor_id,
                    true,
                );
                let u = state.u();
                let v = state.v();
                // residual = measurement - prediction, with the prediction
                // from the unbiased fit (sensor's own cluster excluded).
                let ru = cluster.local.x - u;
                let rv = cluster.local.y - v;

                let (du, dv, dgamma) = alignment_correction(u, v, ru, rv);

                let entry = self.corrections.entry(sensor_id).or_default();
                entry.0.add(du);
                entry.1.add(dv);
                entry.2.add(dgamma);
            }
        }
    }

    fn updated_geometry(&self, device: &Device) -> Geometry {
        let mut geo = device.geometry().clone();

        let slope_x = self.track_slope.0.mean();
        let slope_y = self.track_slope.1.mean();
        geo.set_beam_slope(crate::linalg::Vec2::new(slope_x, slope_y));
        info!(
            "mean track slope: x {slope_x:.6} +- {:.6}, y {slope_y:.6} +- {:.6}",
            self.track_slope.0.mean_error(),
            self.track_slope.1.mean_error()
        );

        for &sensor_id in &self.align_ids {
            let Some((du, dv, dgamma)) = self.corrections.get(&sensor_id) else {
                continue;
            };

            let mut delta = Vec6::zeros();
            delta[0] = self.damping * du.mean();
            delta[1] = self.damping * dv.mean();
            delta[5] = self.damping * dgamma.mean();

            let mut cov = Mat6::zeros();
            cov[(0, 0)] = du.mean_error() * du.mean_error();
            cov[(1, 1)] = dv.mean_error() * dv.mean_error();
            cov[(5, 5)] = dgamma.mean_error() * dgamma.mean_error();

            info!(
                "{} alignment corrections: u {:.6}, v {:.6}, gamma {:.6}",
                device.sensor(sensor_id).name,
                delta[0],
                delta[1],
                delta[5]
            );
            let _ = geo.correct_local(sensor_id, &delta, &cov);
        }
        geo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_intercept_passes_residuals_through_unchanged() {
        let (du, dv, dgamma) = alignment_correction(0.0, 0.0, 0.1, 0.2);
        assert_relative_eq!(du, 0.1, epsilon = 1e-12);
        assert_relative_eq!(dv, 0.2, epsilon = 1e-12);
        assert_relative_eq!(dgamma, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn nonzero_intercept_mixes_residuals_into_a_rotation() {
        let (du, dv, dgamma) = alignment_correction(1.0, 0.0, 0.0, 0.1);
        assert_relative_eq!(du, 0.0, epsilon = 1e-12);
        assert_relative_eq!(dv, 0.05, epsilon = 1e-12);
        assert_relative_eq!(dgamma, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn correction_satisfies_the_underdetermined_residual_equations() {
        let (u, v, ru, rv) = (0.3, -0.4, 0.07, -0.02);
        let (du, dv, dgamma) = alignment_correction(u, v, ru, rv);
        assert_relative_eq!(du - dgamma * v, ru, epsilon = 1e-9);
        assert_relative_eq!(dv + dgamma * u, rv, epsilon = 1e-9);
    }
}
