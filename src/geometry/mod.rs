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

//! Sensor plane geometry: local/global transforms, the 3-2-1 Euler angle
//! parametrisation, parameter corrections, and the per-setup [`Geometry`]
//! container that owns one [`Plane`] and one transient covariance per
//! sensor plus the beam parameters.
//!
//! The axis convention follows the rest of the crate: global coordinates are
//! `(x, y, z, t)` at indices `0..4`, local coordinates are `(u, v, w, s)` at
//! the same indices. `Q` is the local-to-global linear map; its columns are
//! the global components of the local unit vectors.

mod plane;

pub use plane::Plane;

use std::collections::BTreeMap;

use log::debug;

use crate::errors::{GeometryError, InconsistentBeamSnafu};
use crate::linalg::{
    symmetrize6, transform_covariance2, transform_covariance6, Mat2, Mat6, SensorId, SymMatrix2,
    SymMatrix6, Vec2, Vec4, Vec6,
};

/// The beam's nominal energy (in the same energy unit throughout the
/// configuration), or its momentum and particle mass instead. Exactly one
/// representation is populated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeamEnergy {
    Energy(f64),
    MomentumMass { momentum: f64, mass: f64 },
}

/// Geometric description of a telescope setup: one plane per sensor, a
/// transient parameter covariance per sensor (populated by the alignment
/// engine, never persisted), and the beam parameters used by the track
/// finder's search window and by per-sensor beam-slope reporting.
#[derive(Debug, Clone)]
pub struct Geometry {
    planes: BTreeMap<SensorId, Plane>,
    covs: BTreeMap<SensorId, SymMatrix6>,
    beam_slope: Vec2,
    beam_slope_stdev: Vec2,
    beam_energy: Option<BeamEnergy>,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            planes: BTreeMap::new(),
            covs: BTreeMap::new(),
            beam_slope: Vec2::zeros(),
            beam_slope_stdev: Vec2::zeros(),
            beam_energy: None,
        }
    }
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plane(&mut self, sensor_id: SensorId, plane: Plane) {
        self.planes.insert(sensor_id, plane);
    }

    pub fn sensor_ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.planes.keys().copied()
    }

    pub fn get_plane(&self, sensor_id: SensorId) -> Result<&Plane, GeometryError> {
        self.planes
            .get(&sensor_id)
            .ok_or(GeometryError::UnknownSensor { sensor_id })
    }

    pub fn params(&self, sensor_id: SensorId) -> Result<Vec6, GeometryError> {
        Ok(self.get_plane(sensor_id)?.as_params())
    }

    pub fn params_cov(&self, sensor_id: SensorId) -> SymMatrix6 {
        self.covs.get(&sensor_id).copied().unwrap_or_else(Mat6::zeros)
    }

    pub fn set_beam_slope(&mut self, slope: Vec2) {
        self.beam_slope = slope;
    }

    pub fn set_beam_divergence(&mut self, divergence: Vec2) {
        self.beam_slope_stdev = divergence;
    }

    pub fn set_beam_energy(&mut self, energy: BeamEnergy) {
        self.beam_energy = Some(energy);
    }

    pub fn beam_energy(&self) -> Option<BeamEnergy> {
        self.beam_energy
    }

    /// Beam slope in the global coordinate system.
    pub fn beam_slope(&self) -> Vec2 {
        self.beam_slope
    }

    pub fn beam_slope_covariance(&self) -> SymMatrix2 {
        Mat2::new(
            self.beam_slope_stdev.x * self.beam_slope_stdev.x,
            0.0,
            0.0,
            self.beam_slope_stdev.y * self.beam_slope_stdev.y,
        )
    }

    fn beam_tangent(&self) -> Vec4 {
        Vec4::new(self.beam_slope.x, self.beam_slope.y, 1.0, 0.0)
    }

    /// Beam direction in the local coordinate system of `sensor_id`.
    pub fn get_beam_slope(&self, sensor_id: SensorId) -> Result<Vec2, GeometryError> {
        let plane = self.get_plane(sensor_id)?;
        let tangent_local = plane.linear_to_local() * self.beam_tangent();
        let slope = Vec2::new(
            tangent_local[0] / tangent_local[2],
            tangent_local[1] / tangent_local[2],
        );
        debug!("sensor {sensor_id} beam slope: [{}, {}]", slope.x, slope.y);
        Ok(slope)
    }

    pub fn get_beam_slope_covariance(&self, sensor_id: SensorId) -> Result<SymMatrix2, GeometryError> {
        let plane = self.get_plane(sensor_id)?;
        let jac = crate::processors::propagation::jacobian_slope_slope(
            &self.beam_tangent(),
            plane.linear_to_global(),
        );
        Ok(transform_covariance2(&jac, &self.beam_slope_covariance()))
    }

    /// Change the global offset by small values. Does not update the
    /// associated parameter covariance.
    pub fn correct_global_offset(
        &mut self,
        sensor_id: SensorId,
        dx: f64,
        dy: f64,
        dz: f64,
    ) -> Result<(), GeometryError> {
        let plane = self.get_plane(sensor_id)?;
        let delta = Vec6::new(dx, dy, dz, 0.0, 0.0, 0.0);
        let corrected = plane.corrected_global(&delta);
        self.planes.insert(sensor_id, corrected);
        Ok(())
    }

    /// Apply `[dx, dy, dz, dalpha, dbeta, dgamma]` in the global frame and
    /// transport `cov` into the new parameter covariance.
    pub fn correct_global(
        &mut self,
        sensor_id: SensorId,
        delta: &Vec6,
        cov: &SymMatrix6,
    ) -> Result<(), GeometryError> {
        let plane = self.get_plane(sensor_id)?.clone();
        let jac = plane::jacobian_corrections_to_params_global(plane.linear_to_global());
        self.planes.insert(sensor_id, plane.corrected_global(delta));
        self.covs
            .insert(sensor_id, transform_covariance6(&jac, cov));
        Ok(())
    }

    /// Apply `[du, dv, dw, dalpha, dbeta, dgamma]` in the local frame and
    /// transport `cov` into the new parameter covariance.
    pub fn correct_local(
        &mut self,
        sensor_id: SensorId,
        delta: &Vec6,
        cov: &SymMatrix6,
    ) -> Result<(), GeometryError> {
        let plane = self.get_plane(sensor_id)?.clone();
        let jac = plane::jacobian_corrections_to_params_local(plane.linear_to_global());
        self.planes.insert(sensor_id, plane.corrected_local(delta));
        self.covs
            .insert(sensor_id, transform_covariance6(&jac, cov));
        Ok(())
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Geometry: {} plane(s)", self.planes.len())?;
        for (&sensor_id, plane) in &self.planes {
            let p = plane.as_params();
            writeln!(
                f,
                "  [{sensor_id}] x0=({:.4}, {:.4}, {:.4}) angles=({:.5}, {:.5}, {:.5})",
                p[0], p[1], p[2], p[3], p[4], p[5]
            )?;
        }
        write!(
            f,
            "  beam slope: ({:.6}, {:.6})",
            self.beam_slope.x, self.beam_slope.y
        )?;
        if let Some(energy) = self.beam_energy {
            match energy {
                BeamEnergy::Energy(e) => write!(f, ", energy={e:.3}")?,
                BeamEnergy::MomentumMass { momentum, mass } => {
                    write!(f, ", momentum={momentum:.3}, mass={mass:.3}")?
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_beam_energy(
    energy: Option<f64>,
    momentum: Option<f64>,
    mass: Option<f64>,
) -> Result<BeamEnergy, GeometryError> {
    match (energy, momentum, mass) {
        (Some(e), None, None) => Ok(BeamEnergy::Energy(e)),
        (None, Some(p), Some(m)) => Ok(BeamEnergy::MomentumMass {
            momentum: p,
            mass: m,
        }),
        _ => InconsistentBeamSnafu {
            detail: "exactly one of `energy` or (`momentum` and `mass`) must be set",
        }
        .fail(),
    }
}

/// Sort sensor indices by their position along the beam direction.
///
/// This uses the sensor's global z-origin as a proxy for the true
/// beam-direction ordering; a setup whose beam is not roughly aligned with
/// z would need the full tangent-projection sort instead.
pub fn sort_along_beam(geo: &Geometry, sensor_ids: &mut [SensorId]) {
    sensor_ids.sort_by(|&a, &b| {
        let za = geo.get_plane(a).map(|p| p.origin().z).unwrap_or(0.0);
        let zb = geo.get_plane(b).map(|p| p.origin().z).unwrap_or(0.0);
        za.partial_cmp(&zb).unwrap_or(std::cmp::Ordering::Equal)
    });
}

pub fn sorted_along_beam(geo: &Geometry, sensor_ids: &[SensorId]) -> Vec<SensorId> {
    let mut sorted = sensor_ids.to_vec();
    sort_along_beam(geo, &mut sorted);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn beam_energy_xor_momentum_mass() {
        assert!(validate_beam_energy(Some(5.0), None, None).is_ok());
        assert!(validate_beam_energy(None, Some(1.0), Some(2.0)).is_ok());
        assert!(validate_beam_energy(Some(5.0), Some(1.0), Some(2.0)).is_err());
        assert!(validate_beam_energy(None, None, None).is_err());
    }

    #[test]
    fn identity_plane_roundtrips_params() {
        let mut geo = Geometry::new();
        geo.insert_plane(0, Plane::identity());
        let params = geo.params(0).unwrap();
        assert_relative_eq!(params, Vec6::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn unknown_sensor_is_an_error() {
        let geo = Geometry::new();
        assert!(geo.get_plane(42).is_err());
    }
}
