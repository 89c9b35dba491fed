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

//! [`Device`]: the owning container for sensors, their current geometry and
//! their current pixel masks.

mod pixel_mask;
mod sensor;

pub use pixel_mask::{ColumnRow, PixelMask};
pub use sensor::{MeasurementKind, Region, Sensor};

use log::debug;

use crate::errors::InvariantError;
use crate::geometry::Geometry;
use crate::linalg::SensorId;

#[derive(Debug, Clone)]
pub struct Device {
    sensor_ids: Vec<SensorId>,
    sensors: Vec<Sensor>,
    geometry: Geometry,
    pixel_masks: PixelMask,
}

impl Device {
    pub fn new(sensors: Vec<Sensor>) -> Result<Self, InvariantError> {
        for (sid, sensor) in sensors.iter().enumerate() {
            for i in 0..sensor.regions.len() {
                for j in (i + 1)..sensor.regions.len() {
                    if sensor.regions[i].overlaps(&sensor.regions[j]) {
                        return Err(InvariantError::OverlappingRegions {
                            sensor_id: sid,
                            detail: format!(
                                "regions `{}` and `{}` overlap",
                                sensor.regions[i].name, sensor.regions[j].name
                            ),
                        });
                    }
                }
            }
        }
        Ok(Device {
            sensor_ids: (0..sensors.len()).collect(),
            sensors,
            geometry: Geometry::new(),
            pixel_masks: PixelMask::new(),
        })
    }

    pub fn sensor_ids(&self) -> &[SensorId] {
        &self.sensor_ids
    }

    pub fn num_sensors(&self) -> usize {
        self.sensors.len()
    }

    pub fn sensor(&self, id: SensorId) -> &Sensor {
        &self.sensors[id]
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Store the geometry; sensors reference it by id, so no further
    /// propagation into `Sensor` is needed.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        debug!("geometry updated for {} sensors", self.sensors.len());
        self.geometry = geometry;
    }

    pub fn pixel_masks(&self) -> &PixelMask {
        &self.pixel_masks
    }

    /// Merge `masks` into the current masks.
    pub fn apply_pixel_masks(&mut self, masks: &PixelMask) {
        self.pixel_masks.merge(masks);
        debug!(
            "{} pixels masked after merge",
            self.pixel_masks.num_masked_pixels()
        );
    }

    /// The smallest pixel pitch over all sensors, along each axis.
    pub fn minimum_pitch(&self) -> (f64, f64) {
        self.sensors.iter().fold((f64::INFINITY, f64::INFINITY), |(mc, mr), s| {
            (mc.min(s.pitch_col), mr.min(s.pitch_row))
        })
    }

    /// Axis-aligned global-frame box enclosing every sensor's sensitive
    /// area, used to size noise-scan ROIs and the ASCII device summary.
    /// `None` if no sensor has a plane in the current geometry.
    pub fn bounding_box(&self) -> Option<(crate::linalg::Vec3, crate::linalg::Vec3)> {
        let mut lo = crate::linalg::Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut hi = crate::linalg::Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut any = false;

        for &sensor_id in &self.sensor_ids {
            let Ok(plane) = self.geometry.get_plane(sensor_id) else {
                continue;
            };
            let (u_min, u_max, v_min, v_max) = self.sensors[sensor_id].sensitive_area();
            for &(u, v) in &[
                (u_min, v_min),
                (u_min, v_max),
                (u_max, v_min),
                (u_max, v_max),
            ] {
                let global = plane.to_global(&crate::linalg::Vec4::new(u, v, 0.0, 0.0));
                lo.x = lo.x.min(global.x);
                lo.y = lo.y.min(global.y);
                lo.z = lo.z.min(global.z);
                hi.x = hi.x.max(global.x);
                hi.y = hi.y.max(global.y);
                hi.z = hi.z.max(global.z);
                any = true;
            }
        }

        any.then_some((lo, hi))
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Device: {} sensor(s)", self.sensors.len())?;
        for (sid, sensor) in self.sensors.iter().enumerate() {
            writeln!(f, "  [{sid}] {sensor}")?;
        }
        if let Some((lo, hi)) = self.bounding_box() {
            write!(
                f,
                "  bounding box: ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
                lo.x, lo.y, lo.z, hi.x, hi.y, hi.z
            )?;
        } else {
            write!(f, "  bounding box: unavailable (no geometry)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor::{MeasurementKind, Region};

    fn sensor_with_regions(regions: Vec<Region>) -> Sensor {
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
            regions,
        }
    }

    #[test]
    fn overlapping_regions_rejected() {
        let r1 = Region {
            name: "a".into(),
            col_min: 0,
            col_max: 50,
            row_min: 0,
            row_max: 50,
        };
        let r2 = Region {
            name: "b".into(),
            col_min: 25,
            col_max: 75,
            row_min: 25,
            row_max: 75,
        };
        let device = Device::new(vec![sensor_with_regions(vec![r1, r2])]);
        assert!(device.is_err());
    }

    #[test]
    fn disjoint_regions_accepted() {
        let r1 = Region {
            name: "a".into(),
            col_min: 0,
            col_max: 50,
            row_min: 0,
            row_max: 100,
        };
        let r2 = Region {
            name: "b".into(),
            col_min: 50,
            col_max: 100,
            row_min: 0,
            row_max: 100,
        };
        let device = Device::new(vec![sensor_with_regions(vec![r1, r2])]);
        assert!(device.is_ok());
    }

    #[test]
    fn bounding_box_spans_every_plane() {
        use crate::geometry::{Geometry, Plane};

        let mut device = Device::new(vec![sensor_with_regions(vec![])]).unwrap();
        let mut geo = Geometry::new();
        geo.insert_plane(0, Plane::identity());
        device.set_geometry(geo);

        let (lo, hi) = device.bounding_box().unwrap();
        assert_eq!(lo.x, 0.0);
        assert_eq!(lo.y, 0.0);
        assert_eq!(hi.x, 100.0 * 0.02);
        assert_eq!(hi.y, 100.0 * 0.02);
    }

    #[test]
    fn bounding_box_empty_without_geometry() {
        let device = Device::new(vec![sensor_with_regions(vec![])]).unwrap();
        assert!(device.bounding_box().is_none());
    }
}
