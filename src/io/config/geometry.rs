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

//! TOML geometry configuration: beam parameters and one plane per sensor,
//! either as direction vectors or as 3-2-1 angles. Direction vectors are
//! preferred on write.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::geometry::{validate_beam_energy, Geometry, Plane};
use crate::linalg::{SensorId, Vec2, Vec3};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BeamToml {
    slope: [f64; 2],
    #[serde(default)]
    divergence: Option<[f64; 2]>,
    #[serde(default)]
    energy: Option<f64>,
    #[serde(default)]
    momentum: Option<f64>,
    #[serde(default)]
    mass: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PlaneToml {
    Directions {
        id: SensorId,
        offset: [f64; 3],
        unit_u: [f64; 3],
        unit_v: [f64; 3],
    },
    Angles {
        id: SensorId,
        offset_x: f64,
        offset_y: f64,
        offset_z: f64,
        rotation_x: f64,
        rotation_y: f64,
        rotation_z: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeometryConfigToml {
    beam: BeamToml,
    sensors: Vec<PlaneToml>,
}

/// Parse a geometry configuration document into a [`Geometry`].
pub fn load_geometry(document: &str) -> Result<Geometry, ConfigError> {
    let parsed: GeometryConfigToml =
        toml::from_str(document).map_err(|source| ConfigError::Toml { source })?;

    let mut geo = Geometry::new();
    geo.set_beam_slope(Vec2::new(parsed.beam.slope[0], parsed.beam.slope[1]));
    if let Some(div) = parsed.beam.divergence {
        if div[0] < 0.0 || div[1] < 0.0 {
            return Err(ConfigError::OutOfRange {
                document: "geometry config".to_string(),
                key: "beam.divergence".to_string(),
                detail: "divergence must be non-negative".to_string(),
            });
        }
        geo.set_beam_divergence(Vec2::new(div[0], div[1]));
    }
    let energy = validate_beam_energy(parsed.beam.energy, parsed.beam.momentum, parsed.beam.mass)
        .map_err(|source| ConfigError::Inconsistent {
            document: "geometry config".to_string(),
            detail: source.to_string(),
        })?;
    geo.set_beam_energy(energy);

    for entry in parsed.sensors {
        let (id, plane) = match entry {
            PlaneToml::Directions {
                id,
                offset,
                unit_u,
                unit_v,
            } => {
                let dir_u = Vec3::new(unit_u[0], unit_u[1], unit_u[2]);
                let dir_v = Vec3::new(unit_v[0], unit_v[1], unit_v[2]);
                if dir_u.dot(&dir_v).abs() > 1e-9 {
                    warn!("sensor {id}: unit_u, unit_v are not orthogonal; orthonormalising");
                }
                (
                    id,
                    Plane::from_directions(
                        dir_u,
                        dir_v,
                        Vec3::new(offset[0], offset[1], offset[2]),
                    ),
                )
            }
            PlaneToml::Angles {
                id,
                offset_x,
                offset_y,
                offset_z,
                rotation_x,
                rotation_y,
                rotation_z,
            } => (
                id,
                Plane::from_angles_321(
                    rotation_x,
                    rotation_y,
                    rotation_z,
                    Vec3::new(offset_x, offset_y, offset_z),
                ),
            ),
        };
        geo.insert_plane(id, plane);
    }

    Ok(geo)
}

/// Serialise a geometry to its TOML representation, using the
/// direction-vector form for each plane.
pub fn save_geometry(geo: &Geometry) -> Result<String, ConfigError> {
    let beam_slope = geo.beam_slope();
    let divergence = geo.beam_slope_covariance();
    let beam = BeamToml {
        slope: [beam_slope.x, beam_slope.y],
        divergence: Some([divergence[(0, 0)].sqrt(), divergence[(1, 1)].sqrt()]),
        energy: match geo.beam_energy() {
            Some(crate::geometry::BeamEnergy::Energy(e)) => Some(e),
            _ => None,
        },
        momentum: match geo.beam_energy() {
            Some(crate::geometry::BeamEnergy::MomentumMass { momentum, .. }) => Some(momentum),
            _ => None,
        },
        mass: match geo.beam_energy() {
            Some(crate::geometry::BeamEnergy::MomentumMass { mass, .. }) => Some(mass),
            _ => None,
        },
    };

    let mut sensors = Vec::new();
    for id in geo.sensor_ids() {
        let plane = geo.get_plane(id).expect("sensor_ids() only yields known ids");
        let linear = plane.linear_to_global();
        let origin = plane.origin();
        sensors.push(PlaneToml::Directions {
            id,
            offset: [origin.x, origin.y, origin.z],
            unit_u: [linear[(0, 0)], linear[(1, 0)], linear[(2, 0)]],
            unit_v: [linear[(0, 1)], linear[(1, 1)], linear[(2, 1)]],
        });
    }

    toml::to_string_pretty(&GeometryConfigToml { beam, sensors })
        .map_err(|source| ConfigError::TomlSer { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = r#"
[beam]
slope = [0.001, -0.0005]
energy = 120.0

[[sensors]]
id = 0
offset = [0.0, 0.0, 0.0]
unit_u = [1.0, 0.0, 0.0]
unit_v = [0.0, 1.0, 0.0]

[[sensors]]
id = 1
offset_x = 0.0
offset_y = 0.0
offset_z = 150.0
rotation_x = 0.0
rotation_y = 0.0
rotation_z = 0.0
"#;

    #[test]
    fn loads_both_plane_forms() {
        let geo = load_geometry(SAMPLE).unwrap();
        assert_eq!(geo.sensor_ids().count(), 2);
        assert_relative_eq!(geo.params(1).unwrap()[2], 150.0, epsilon = 1e-9);
    }

    #[test]
    fn round_trips_params() {
        let geo = load_geometry(SAMPLE).unwrap();
        let saved = save_geometry(&geo).unwrap();
        let reloaded = load_geometry(&saved).unwrap();
        for id in geo.sensor_ids() {
            assert_relative_eq!(
                geo.params(id).unwrap(),
                reloaded.params(id).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn energy_and_momentum_together_is_rejected() {
        let bad = SAMPLE.replace("energy = 120.0", "energy = 120.0\nmomentum = 1.0\nmass = 1.0");
        assert!(load_geometry(&bad).is_err());
    }
}
