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

//! Shared vector/matrix type aliases and small numerical helpers used across
//! the geometry, tracking and alignment modules.

use nalgebra::{Matrix2, Matrix3, Matrix4, Matrix6, SMatrix, Vector2, Vector3, Vector4, Vector6};

pub type Scalar = f64;

pub type Vec2 = Vector2<Scalar>;
pub type Vec3 = Vector3<Scalar>;
pub type Vec4 = Vector4<Scalar>;
pub type Vec6 = Vector6<Scalar>;

pub type Mat2 = Matrix2<Scalar>;
pub type Mat3 = Matrix3<Scalar>;
pub type Mat4 = Matrix4<Scalar>;
pub type Mat6 = Matrix6<Scalar>;

/// A symmetric 2x2 matrix, stored densely; callers are responsible for
/// keeping it symmetric (see [`symmetrize2`]).
pub type SymMatrix2 = Mat2;
/// A symmetric 3x3 matrix, stored densely.
pub type SymMatrix3 = SMatrix<Scalar, 3, 3>;
/// A symmetric 6x6 matrix, stored densely.
pub type SymMatrix6 = Mat6;

/// Sensor identifier. Sensors are addressed by a small dense index, matching
/// their position in the device's sensor list.
pub type SensorId = usize;

/// Force exact symmetry on a matrix that is only symmetric up to floating
/// point round-off, by averaging it with its own transpose.
pub fn symmetrize2(m: &Mat2) -> SymMatrix2 {
    (m + m.transpose()) * 0.5
}

pub fn symmetrize6(m: &Mat6) -> SymMatrix6 {
    (m + m.transpose()) * 0.5
}

/// Transport a covariance matrix through a linear map `jac`, i.e. compute
/// `jac * cov * jac^T`, symmetrising the result to guard against the
/// round-off asymmetry that repeated transport accumulates.
pub fn transform_covariance6(jac: &Mat6, cov: &SymMatrix6) -> SymMatrix6 {
    symmetrize6(&(jac * cov * jac.transpose()))
}

pub fn transform_covariance2(jac: &Mat2, cov: &SymMatrix2) -> SymMatrix2 {
    symmetrize2(&(jac * cov * jac.transpose()))
}

pub fn symmetrize4(m: &Mat4) -> Mat4 {
    (m + m.transpose()) * 0.5
}

/// Transport a 4x4 local/global position+time covariance through `jac`.
pub fn transform_covariance4(jac: &Mat4, cov: &Mat4) -> Mat4 {
    symmetrize4(&(jac * cov * jac.transpose()))
}

/// Machine epsilon for `f64`, used for the orthogonality sanity checks in
/// the geometry module.
pub const EPS: Scalar = Scalar::EPSILON;
