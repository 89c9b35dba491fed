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

//! Track-state transport between sensor planes: the slope-only Jacobian
//! used for beam-slope covariance transport, the full 6-parameter state
//! Jacobian, and `propagate_to` itself.
//!
//! Track state parameters are ordered `[u, v, du, dv, s, ds]` (position and
//! slope interleaved), so the position-like indices are `{0, 1,
//! 4}` and the slope-like indices are `{2, 3, 5}` -- unlike a layout that
//! groups all positions before all slopes, the block structure below is
//! built by explicit index placement rather than contiguous sub-blocks.

use crate::geometry::Plane;
use crate::linalg::{Mat2, Mat3, Mat4, Mat6, SymMatrix6, Vec4, Vec6};
use crate::storage::TrackState;

const POS_IDX: [usize; 3] = [0, 1, 4];
const SLOPE_IDX: [usize; 3] = [2, 3, 5];

/// Jacobian mapping a change in the source local slope `(du, dv)` to the
/// corresponding change in the target local slope, given the source
/// tangent (in slope parametrisation, i.e. `tangent.w == 1`) and the
/// source-to-target linear map.
pub fn jacobian_slope_slope(tangent: &Vec4, to_target: &Mat4) -> Mat2 {
    let mut r = nalgebra::Matrix4x2::<f64>::zeros();
    r.set_column(0, &to_target.column(0));
    r.set_column(1, &to_target.column(1));

    let s = to_target * tangent * (1.0 / tangent[2]);

    let mut f = nalgebra::Matrix2x4::<f64>::zeros();
    f[(0, 0)] = 1.0 / s[2];
    f[(1, 1)] = 1.0 / s[2];
    f[(0, 2)] = -s[0] / (s[2] * s[2]);
    f[(1, 2)] = -s[1] / (s[2] * s[2]);

    f * r
}

/// Full 6x6 transport Jacobian from the source state parametrisation to the
/// target one, given the initial tangent (slope-parametrised), the
/// source-to-target linear map and `w0`, the initial distance to the
/// target plane along its normal.
pub fn jacobian_state(tangent: &Vec4, to_target: &Mat4, w0: f64) -> Mat6 {
    let mut r = nalgebra::Matrix4x3::<f64>::zeros();
    r.set_column(0, &to_target.column(0));
    r.set_column(1, &to_target.column(1));
    r.set_column(2, &to_target.column(3));

    let s = to_target * tangent * (1.0 / tangent[2]);

    let mut f = nalgebra::Matrix3x4::<f64>::zeros();
    f[(0, 0)] = 1.0;
    f[(1, 1)] = 1.0;
    f[(2, 3)] = 1.0;
    f[(0, 2)] = -s[0] / s[2];
    f[(1, 2)] = -s[1] / s[2];
    f[(2, 2)] = -s[3] / s[2];

    let m: Mat3 = f * r;
    let mut jac = Mat6::zeros();
    for (oi, &out_i) in POS_IDX.iter().enumerate() {
        for (oj, &out_j) in POS_IDX.iter().enumerate() {
            jac[(out_i, out_j)] = m[(oi, oj)];
        }
        for (oj, &slope_j) in SLOPE_IDX.iter().enumerate() {
            jac[(out_i, slope_j)] = (-w0 / s[2]) * m[(oi, oj)];
        }
    }
    for (oi, &slope_i) in SLOPE_IDX.iter().enumerate() {
        for (oj, &slope_j) in SLOPE_IDX.iter().enumerate() {
            jac[(slope_i, slope_j)] = (1.0 / s[2]) * m[(oi, oj)];
        }
    }
    jac
}

fn tangent_of(state: &Vec6) -> Vec4 {
    Vec4::new(state[SLOPE_IDX[0]], state[SLOPE_IDX[1]], 1.0, state[SLOPE_IDX[2]])
}

fn position_of(state: &Vec6) -> Vec4 {
    Vec4::new(state[POS_IDX[0]], state[POS_IDX[1]], 0.0, state[POS_IDX[2]])
}

/// Propagate `state` (defined on `source`) to `target`, returning the new
/// state parameters and the transported covariance.
pub fn propagate_to(state: &TrackState, source: &Plane, target: &Plane) -> TrackState {
    let to_target = target.linear_to_local() * source.linear_to_global();

    let pos_global = source.to_global(&position_of(&state.params));
    let mut pos = target.to_local(&pos_global);
    let tangent_src = tangent_of(&state.params);
    let mut tan = to_target * tangent_src;

    let jac = jacobian_state(&tangent_src, &to_target, pos[2]);

    tan /= tan[2];
    pos -= tan * pos[2];

    let mut params = Vec6::zeros();
    params[POS_IDX[0]] = pos[0];
    params[POS_IDX[1]] = pos[1];
    params[POS_IDX[2]] = pos[3];
    params[SLOPE_IDX[0]] = tan[0];
    params[SLOPE_IDX[1]] = tan[1];
    params[SLOPE_IDX[2]] = tan[3];

    let cov = crate::linalg::transform_covariance6(&jac, &state.cov);
    TrackState {
        params,
        cov,
        track: None,
        cluster: None,
    }
}

#[allow(dead_code)]
pub(crate) fn identity_jacobian() -> SymMatrix6 {
    Mat6::identity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Plane;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn propagate_identity_to_identity_is_noop() {
        let plane = Plane::identity();
        let state = TrackState {
            params: Vec6::new(1.0, 2.0, 0.1, -0.2, 5.0, 0.0),
            cov: Mat6::identity(),
            track: None,
            cluster: None,
        };
        let out = propagate_to(&state, &plane, &plane);
        assert_relative_eq!(out.params, state.params, epsilon = 1e-9);
    }

    #[test]
    fn propagate_across_translated_plane_shifts_position() {
        let source = Plane::identity();
        let target = Plane::from_angles_321(0.0, 0.0, 0.0, Vector3::new(0.0, 0.0, 10.0));
        let state = TrackState {
            params: Vec6::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            cov: Mat6::identity(),
            track: None,
            cluster: None,
        };
        let out = propagate_to(&state, &source, &target);
        assert_relative_eq!(out.params[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(out.params[1], 0.0, epsilon = 1e-9);
    }
}
