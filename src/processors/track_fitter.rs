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

//! Straight-line track fitting: a closed-form weighted least-squares line
//! fit per axis, combined into a global fit (for goodness-of-fit and
//! candidate ranking) and a per-sensor local fit (for the state consumed by
//! analyzers and aligners).
//!
//! Both fits reuse the same 6-parameter layout `[p0, p1, dp0/dz, dp1/dz, p2,
//! dp2/dz]`: the global fit runs it over `(x, y, t)` as a function of `z`,
//! the local fit runs it over `(u, v, s)` as a function of `w`.

use std::collections::BTreeMap;

use crate::geometry::Geometry;
use crate::linalg::{Mat6, SensorId, Vec4, Vec6};
use crate::storage::{Event, Track, TrackState};

/// Closed-form weighted linear regression `y = offset + slope*x`, following
/// the standard Numerical-Recipes weighted-least-squares sums.
#[derive(Debug, Clone, Copy, Default)]
struct LineFitter {
    s: f64,
    sx: f64,
    sy: f64,
    sxx: f64,
    sxy: f64,
    syy: f64,
    cxx: f64,
}

impl LineFitter {
    fn add_point(&mut self, x: f64, y: f64, weight: f64) {
        self.s += weight;
        self.sx += weight * x;
        self.sy += weight * y;
        self.sxx += weight * x * x;
        self.sxy += weight * x * y;
        self.syy += weight * y * y;
    }

    fn fit(&mut self) {
        self.cxx = self.s * self.sxx - self.sx * self.sx;
    }

    fn offset(&self) -> f64 {
        (self.sy * self.sxx - self.sx * self.sxy) / self.cxx
    }
    fn slope(&self) -> f64 {
        (self.s * self.sxy - self.sx * self.sy) / self.cxx
    }
    fn var_offset(&self) -> f64 {
        self.sxx / self.cxx
    }
    fn var_slope(&self) -> f64 {
        self.s / self.cxx
    }
    fn cov_offset_slope(&self) -> f64 {
        -self.sx / self.cxx
    }
    fn chi2(&self) -> f64 {
        self.syy + (self.sxy * (2.0 * self.sx * self.sy - self.s * self.sxy) - self.sxx * self.sy * self.sy) / self.cxx
    }
}

/// Fit independent-vs-2-dependents lines, producing the 6-parameter
/// `[offset0, offset1, slope0, slope1, 0, 0]` state used by both the global
/// and local fits (the third dependent -- time -- is filled in separately
/// by the 4D variant; the 3D variant leaves it zero).
struct LineFitter3 {
    independent: usize,
    dependents: [usize; 2],
    lines: [LineFitter; 2],
    n_points: usize,
}

impl LineFitter3 {
    fn new(independent: usize, dependents: [usize; 2]) -> Self {
        LineFitter3 {
            independent,
            dependents,
            lines: [LineFitter::default(); 2],
            n_points: 0,
        }
    }

    fn add_point(&mut self, point: &Vec4, weight: &Vec4) {
        for (i, &d) in self.dependents.iter().enumerate() {
            self.lines[i].add_point(point[self.independent], point[d], weight[d]);
        }
        self.n_points += 1;
    }

    fn fit(&mut self) {
        for l in &mut self.lines {
            l.fit();
        }
    }

    fn chi2(&self) -> f64 {
        self.lines.iter().map(|l| l.chi2()).sum()
    }

    fn dof(&self) -> i64 {
        2 * self.n_points as i64 - 4
    }

    /// Output order `[p0, p1, dp0, dp1, 0, 0]` matching the track-state
    /// layout's position/slope indices `{0,1}`/`{2,3}`.
    fn params(&self) -> Vec6 {
        Vec6::new(
            self.lines[0].offset(),
            self.lines[1].offset(),
            self.lines[0].slope(),
            self.lines[1].slope(),
            0.0,
            0.0,
        )
    }

    fn cov(&self) -> Mat6 {
        let mut cov = Mat6::zeros();
        cov[(0, 0)] = self.lines[0].var_offset();
        cov[(2, 2)] = self.lines[0].var_slope();
        cov[(0, 2)] = self.lines[0].cov_offset_slope();
        cov[(2, 0)] = self.lines[0].cov_offset_slope();
        cov[(1, 1)] = self.lines[1].var_offset();
        cov[(3, 3)] = self.lines[1].var_slope();
        cov[(1, 3)] = self.lines[1].cov_offset_slope();
        cov[(3, 1)] = self.lines[1].cov_offset_slope();
        cov
    }
}

const AXIS_X: usize = 0;
const AXIS_Y: usize = 1;
const AXIS_Z: usize = 2;

/// Global straight-line fit of all of `clusters`' global positions against
/// `z`, producing the track's common goodness-of-fit.
pub fn fit_global(event: &Event, geo: &Geometry, clusters: &BTreeMap<SensorId, usize>) -> Track {
    let mut fitter = LineFitter3::new(AXIS_Z, [AXIS_X, AXIS_Y]);
    for (&sensor_id, &cluster_idx) in clusters {
        let source = geo.get_plane(sensor_id).expect("clustered sensor has a plane");
        let cluster = &event.sensor(sensor_id).clusters[cluster_idx];
        let global = source.to_global(&cluster.local);
        let cov_global = crate::linalg::transform_covariance4(source.linear_to_global(), &cluster.cov_local);
        let weight = Vec4::new(
            1.0 / cov_global[(0, 0)],
            1.0 / cov_global[(1, 1)],
            1.0 / cov_global[(2, 2)],
            1.0 / cov_global[(3, 3)],
        );
        fitter.add_point(&global, &weight);
    }
    fitter.fit();

    let global_state = TrackState::new(fitter.params(), fitter.cov());
    let mut track = Track::new(global_state, fitter.chi2(), fitter.dof().max(0) as usize);
    track.clusters = clusters.clone();
    track
}

/// Per-sensor local fit: transport every cluster (optionally excluding the
/// target sensor's own, for the unbiased variant) into the target's local
/// frame and fit `(u, v)` against `w`.
pub fn fit_local(
    event: &Event,
    geo: &Geometry,
    clusters: &BTreeMap<SensorId, usize>,
    target_sensor: SensorId,
    unbiased: bool,
) -> TrackState {
    const AXIS_U: usize = 0;
    const AXIS_V: usize = 1;
    const AXIS_W: usize = 2;

    let target = geo.get_plane(target_sensor).expect("target sensor has a plane");
    let mut fitter = LineFitter3::new(AXIS_W, [AXIS_U, AXIS_V]);

    for (&sensor_id, &cluster_idx) in clusters {
        if unbiased && sensor_id == target_sensor {
            continue;
        }
        let source = geo.get_plane(sensor_id).expect("clustered sensor has a plane");
        let cluster = &event.sensor(sensor_id).clusters[cluster_idx];
        let local = target.to_local(&source.to_global(&cluster.local));
        let jac = target.linear_to_local() * source.linear_to_global();
        let cov_local = crate::linalg::transform_covariance4(&jac, &cluster.cov_local);
        let weight = Vec4::new(
            1.0 / cov_local[(0, 0)],
            1.0 / cov_local[(1, 1)],
            1.0 / cov_local[(2, 2)],
            1.0 / cov_local[(3, 3)],
        );
        fitter.add_point(&local, &weight);
    }
    fitter.fit();
    TrackState::new(fitter.params(), fitter.cov())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Plane;
    use crate::storage::Cluster;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn straight_event() -> (Event, Geometry) {
        let mut geo = Geometry::new();
        for i in 0..3 {
            geo.insert_plane(i, Plane::from_angles_321(0.0, 0.0, 0.0, Vector3::new(0.0, 0.0, i as f64 * 10.0)));
        }
        let mut event = Event::new(0, 0, 3);
        for i in 0..3 {
            let mut c = Cluster::new();
            c.local = Vec4::new(1.0 + i as f64 * 0.1, 2.0 + i as f64 * 0.2, 0.0, 0.0);
            c.cov_local[(0, 0)] = 1e-4;
            c.cov_local[(1, 1)] = 1e-4;
            c.cov_local[(2, 2)] = 1e-4;
            c.cov_local[(3, 3)] = 1e-4;
            event.sensor_mut(i).add_cluster(c);
        }
        (event, geo)
    }

    #[test]
    fn global_fit_recovers_straight_line() {
        let (event, geo) = straight_event();
        let clusters: BTreeMap<SensorId, usize> = (0..3).map(|i| (i, 0)).collect();
        let track = fit_global(&event, &geo, &clusters);
        assert_relative_eq!(track.global_state.params[2], 0.01, epsilon = 1e-6);
        assert_relative_eq!(track.global_state.params[3], 0.02, epsilon = 1e-6);
    }

    #[test]
    fn unbiased_local_fit_excludes_target_cluster() {
        let (mut event, geo) = straight_event();
        // perturb sensor 1's own cluster; unbiased fit on sensor 1 must
        // ignore it and still land on the unperturbed line.
        event.sensor_mut(1).clusters[0].local.x += 5.0;
        let clusters: BTreeMap<SensorId, usize> = (0..3).map(|i| (i, 0)).collect();
        let state = fit_local(&event, &geo, &clusters, 1, true);
        assert_relative_eq!(state.u(), 1.1, epsilon = 1e-6);
    }
}
