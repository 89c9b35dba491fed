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

//! The [`Plane`] type: a local-to-global linear map plus origin, with the
//! 3-2-1 Euler angle parametrisation used for I/O and reporting.
//!
//! The rotation matrix in 3-2-1 convention mapping local spatial axes
//! `(u, v, w)` to global axes `(x, y, z)` is
//!
//! ```text
//! Q = R1(alpha) * R2(beta) * R3(gamma)
//! ```
//!
//! with `alpha`, `beta`, `gamma` right-handed rotations about the first,
//! second and third *current* axis respectively. Time is carried as a
//! fourth coordinate on both sides and is never rotated.

use log::warn;
use nalgebra::SVD;

use crate::linalg::{Mat3, Mat4, Vec3, Vec4, Vec6, EPS};

/// A 2D plane embedded in 3+1D spacetime: an origin and an orthonormal
/// (on its spatial 3x3 block) local-to-global linear map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    origin: Vec4,
    linear: Mat4,
}

fn make_rotation_321(alpha: f64, beta: f64, gamma: f64) -> Mat4 {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let (sg, cg) = gamma.sin_cos();

    let mut q = Mat4::zeros();
    // unit u
    q[(0, 0)] = cb * cg;
    q[(1, 0)] = sa * sb * cg + ca * sg;
    q[(2, 0)] = sa * sg - ca * sb * cg;
    // unit v
    q[(0, 1)] = -cb * sg;
    q[(1, 1)] = -sa * sb * sg + ca * cg;
    q[(2, 1)] = sa * cg + ca * sb * sg;
    // unit w
    q[(0, 2)] = sb;
    q[(1, 2)] = -sa * cb;
    q[(2, 2)] = ca * cb;
    // time is not rotated
    q[(3, 3)] = 1.0;
    q
}

/// Extract 3-2-1 angles from a rotation matrix whose spatial block is
/// orthonormal. Unstable for beta near +/-pi/2; only used for reporting, so
/// a mismatch just emits a warning rather than failing.
fn extract_angles_321(q: &Mat4) -> Vec3 {
    let alpha = (-q[(1, 2)]).atan2(q[(2, 2)]);
    let beta = q[(0, 2)].clamp(-1.0, 1.0).asin();
    let gamma = (-q[(0, 1)]).atan2(q[(0, 0)]);

    let q_angles = make_rotation_321(alpha, beta, gamma);
    let norm = (Mat4::identity() - q_angles.transpose() * q).norm();
    if 8.0 * EPS < norm {
        warn!(
            "angle extraction residual {norm:.3e} exceeds 8*eps; alpha={alpha:.6} beta={beta:.6} gamma={gamma:.6}"
        );
    }
    Vec3::new(alpha, beta, gamma)
}

/// Jacobian mapping small rotation corrections `[dalpha, dbeta, dgamma]` to
/// changes in the full 3-2-1 angles, given `Q' = Q * dQ(dalpha, dbeta,
/// dgamma)`. Used when transporting a correction's covariance into the
/// geometry's angle-parametrised covariance.
pub(crate) fn jacobian_corrections_to_angles(q: &Mat4) -> Mat3 {
    let mut jac = Mat3::zeros();
    let f0 = q[(1, 2)] * q[(1, 2)] + q[(2, 2)] * q[(2, 2)];
    jac[(0, 0)] = (q[(1, 1)] * q[(2, 2)] - q[(1, 2)] * q[(2, 1)]) / f0;
    jac[(0, 1)] = (q[(1, 2)] * q[(2, 0)] - q[(1, 0)] * q[(2, 2)]) / f0;

    let f1 = (1.0 - q[(0, 2)] * q[(0, 2)]).sqrt();
    jac[(1, 0)] = -q[(0, 1)] / f1;
    jac[(1, 1)] = q[(0, 0)] / f1;

    let f2 = q[(0, 0)] * q[(0, 0)] + q[(0, 1)] * q[(0, 1)];
    jac[(0, 2)] = -q[(0, 0)] * q[(0, 2)] / f2;
    jac[(1, 2)] = -q[(0, 1)] * q[(0, 2)] / f2;
    jac[(2, 2)] = 1.0;
    jac
}

/// Build the full 6x6 Jacobian from global `[dx, dy, dz, dalpha, dbeta,
/// dgamma]` corrections to `[x, y, z, alpha, beta, gamma]` geometry
/// parameters.
pub(crate) fn jacobian_corrections_to_params_global(q: &Mat4) -> crate::linalg::Mat6 {
    block_diag_jac(Mat3::identity(), jacobian_corrections_to_angles(q))
}

/// Build the full 6x6 Jacobian from local `[du, dv, dw, dalpha, dbeta,
/// dgamma]` corrections to `[x, y, z, alpha, beta, gamma]` geometry
/// parameters.
pub(crate) fn jacobian_corrections_to_params_local(q: &Mat4) -> crate::linalg::Mat6 {
    let top_left = q.fixed_view::<3, 3>(0, 0).into_owned();
    block_diag_jac(top_left, jacobian_corrections_to_angles(q))
}

fn block_diag_jac(top_left: Mat3, bottom_right: Mat3) -> crate::linalg::Mat6 {
    let mut jac = crate::linalg::Mat6::zeros();
    jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&top_left);
    jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&bottom_right);
    jac
}

impl Plane {
    /// The identity plane: origin at the global origin, local axes aligned
    /// with the global ones.
    pub fn identity() -> Self {
        Plane {
            origin: Vec4::zeros(),
            linear: Mat4::identity(),
        }
    }

    /// Construct a plane by composing the 3-2-1 elementary rotations, then
    /// reorthonormalising the spatial block against round-off.
    pub fn from_angles_321(alpha: f64, beta: f64, gamma: f64, origin: Vec3) -> Self {
        let mut r0 = Vec4::zeros();
        r0.x = origin.x;
        r0.y = origin.y;
        r0.z = origin.z;
        Self::new(r0, make_rotation_321(alpha, beta, gamma))
    }

    /// Construct a plane from the two local in-plane unit directions; the
    /// normal is their cross product. Reorthonormalised like every other
    /// constructor.
    pub fn from_directions(dir_u: Vec3, dir_v: Vec3, origin: Vec3) -> Self {
        let mut r0 = Vec4::zeros();
        r0.x = origin.x;
        r0.y = origin.y;
        r0.z = origin.z;

        let normal = dir_u.cross(&dir_v);
        let mut q = Mat4::zeros();
        q.fixed_view_mut::<3, 1>(0, 0).copy_from(&dir_u);
        q.fixed_view_mut::<3, 1>(0, 1).copy_from(&dir_v);
        q.fixed_view_mut::<3, 1>(0, 2).copy_from(&normal);
        q[(3, 3)] = 1.0;
        Self::new(r0, q)
    }

    /// Private constructor used by every public one: reorthonormalise the
    /// linear map via the nearest-orthogonal-matrix SVD construction.
    fn new(origin: Vec4, linear: Mat4) -> Self {
        let svd = SVD::new(linear, true, true);
        let u = svd.u.expect("full SVD requested");
        let v_t = svd.v_t.expect("full SVD requested");
        Plane {
            origin,
            linear: u * v_t,
        }
    }

    pub fn origin(&self) -> Vec4 {
        self.origin
    }

    pub fn linear_to_global(&self) -> &Mat4 {
        &self.linear
    }

    pub fn linear_to_local(&self) -> Mat4 {
        self.linear.transpose()
    }

    pub fn to_global(&self, local: &Vec4) -> Vec4 {
        self.origin + self.linear * local
    }

    pub fn to_local(&self, global: &Vec4) -> Vec4 {
        self.linear.transpose() * (global - self.origin)
    }

    /// Corrected plane from global `[dx, dy, dz, dalpha, dbeta, dgamma]`:
    /// the offset moves in the global frame, the rotation correction is
    /// applied on the right, `Q <- Q * dQ`.
    pub fn corrected_global(&self, delta: &Vec6) -> Self {
        let dr = Vec4::new(delta[0], delta[1], delta[2], 0.0);
        let d_rot = make_rotation_321(delta[3], delta[4], delta[5]);
        Self::new(self.origin + dr, self.linear * d_rot)
    }

    /// Corrected plane from local `[du, dv, dw, dalpha, dbeta, dgamma]`:
    /// the offset is expressed in the local frame before being added.
    pub fn corrected_local(&self, delta: &Vec6) -> Self {
        let dr = Vec4::new(delta[0], delta[1], delta[2], 0.0);
        let d_rot = make_rotation_321(delta[3], delta[4], delta[5]);
        Self::new(self.origin + self.linear * dr, self.linear * d_rot)
    }

    /// Minimal parameters `[x0, y0, z0, alpha, beta, gamma]`.
    pub fn as_params(&self) -> Vec6 {
        let angles = extract_angles_321(&self.linear);
        Vec6::new(
            self.origin.x,
            self.origin.y,
            self.origin.z,
            angles.x,
            angles.y,
            angles.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_6;

    #[test]
    fn identity_has_zero_params() {
        let p = Plane::identity();
        assert_relative_eq!(p.as_params(), Vec6::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn angles_roundtrip_through_plane() {
        let origin = Vec3::new(1.0, -2.0, 300.0);
        let p = Plane::from_angles_321(FRAC_PI_6, -0.2, 0.05, origin);
        let params = p.as_params();
        assert_relative_eq!(params[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(params[1], -2.0, epsilon = 1e-9);
        assert_relative_eq!(params[2], 300.0, epsilon = 1e-9);
        assert_relative_eq!(params[3], FRAC_PI_6, epsilon = 1e-9);
        assert_relative_eq!(params[4], -0.2, epsilon = 1e-9);
        assert_relative_eq!(params[5], 0.05, epsilon = 1e-9);
    }

    #[test]
    fn global_local_roundtrip() {
        let p = Plane::from_angles_321(0.3, -0.1, 0.2, Vec3::new(10.0, -5.0, 2.0));
        let local = Vec4::new(1.5, -0.7, 0.0, 3.0);
        let global = p.to_global(&local);
        let back = p.to_local(&global);
        assert_relative_eq!(back, local, epsilon = 1e-9);
    }

    #[test]
    fn linear_map_stays_orthonormal_after_correction() {
        let p = Plane::identity().corrected_local(&Vec6::new(0.0, 0.0, 0.0, 0.01, 0.02, -0.03));
        let q = p.linear_to_global();
        let spatial = q.fixed_view::<3, 3>(0, 0).into_owned();
        let gram = spatial.transpose() * spatial;
        assert_relative_eq!(gram, Mat3::identity(), epsilon = 1e-9);
    }
}
