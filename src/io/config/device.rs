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

//! TOML device configuration: sensor types, the ordered sensor list, and
//! the region sub-ranges inside each sensor. Upper bounds are inclusive on
//! disk and widened to the crate's internal half-open convention on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::{Device, MeasurementKind, Region, Sensor};
use crate::errors::{ConfigError, MissingKeySnafu};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegionToml {
    name: String,
    col_min: i32,
    /// Inclusive on disk.
    col_max: i32,
    row_min: i32,
    /// Inclusive on disk.
    row_max: i32,
}

impl RegionToml {
    fn into_region(self) -> Region {
        Region {
            name: self.name,
            col_min: self.col_min,
            col_max: self.col_max + 1,
            row_min: self.row_min,
            row_max: self.row_max + 1,
        }
    }

    fn from_region(region: &Region) -> Self {
        RegionToml {
            name: region.name.clone(),
            col_min: region.col_min,
            col_max: region.col_max - 1,
            row_min: region.row_min,
            row_max: region.row_max - 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SensorTypeToml {
    measurement: MeasurementKind,
    cols: i32,
    rows: i32,
    pitch_col: f64,
    pitch_row: f64,
    pitch_timestamp: f64,
    timestamp_min: i64,
    /// Inclusive on disk.
    timestamp_max: i64,
    /// Inclusive on disk.
    value_max: i64,
    x_x0: f64,
    #[serde(default)]
    regions: Vec<RegionToml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SensorEntryToml {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceConfigToml {
    sensor_types: BTreeMap<String, SensorTypeToml>,
    sensors: Vec<SensorEntryToml>,
}

/// Parse a device configuration document into a constructed [`Device`].
///
/// Sensors are assigned an implicit ordinal id equal to their position in
/// the `sensors` array, matching the reconstruction order used everywhere
/// else in the crate.
pub fn load_device(document: &str) -> Result<Device, ConfigError> {
    let parsed: DeviceConfigToml =
        toml::from_str(document).map_err(|source| ConfigError::Toml { source })?;

    let mut sensors = Vec::with_capacity(parsed.sensors.len());
    for (ordinal, entry) in parsed.sensors.into_iter().enumerate() {
        let kind = parsed
            .sensor_types
            .get(&entry.type_name)
            .ok_or_else(|| {
                MissingKeySnafu {
                    document: "device config".to_string(),
                    key: format!("sensor_types.{}", entry.type_name),
                }
                .build()
            })?
            .clone();

        let name = entry
            .name
            .unwrap_or_else(|| format!("{}_{ordinal}", entry.type_name));

        sensors.push(Sensor {
            name,
            measurement: kind.measurement,
            cols: kind.cols,
            rows: kind.rows,
            pitch_col: kind.pitch_col,
            pitch_row: kind.pitch_row,
            pitch_timestamp: kind.pitch_timestamp,
            timestamp_min: kind.timestamp_min,
            timestamp_max: kind.timestamp_max + 1,
            value_max: kind.value_max + 1,
            x_x0: kind.x_x0,
            regions: kind.regions.into_iter().map(RegionToml::into_region).collect(),
        });
    }

    Device::new(sensors).map_err(|source| ConfigError::Inconsistent {
        document: "device config".to_string(),
        detail: source.to_string(),
    })
}

/// Serialise a device back to its TOML representation. Each distinct
/// sensor produces its own `sensor_types` entry named after the sensor
/// itself, since the crate does not track which sensors originally shared
/// a type.
pub fn save_device(device: &Device) -> Result<String, ConfigError> {
    let mut sensor_types = BTreeMap::new();
    let mut sensors = Vec::with_capacity(device.num_sensors());

    for &id in device.sensor_ids() {
        let sensor = device.sensor(id);
        sensor_types.insert(
            sensor.name.clone(),
            SensorTypeToml {
                measurement: sensor.measurement,
                cols: sensor.cols,
                rows: sensor.rows,
                pitch_col: sensor.pitch_col,
                pitch_row: sensor.pitch_row,
                pitch_timestamp: sensor.pitch_timestamp,
                timestamp_min: sensor.timestamp_min,
                timestamp_max: sensor.timestamp_max - 1,
                value_max: sensor.value_max - 1,
                x_x0: sensor.x_x0,
                regions: sensor.regions.iter().map(RegionToml::from_region).collect(),
            },
        );
        sensors.push(SensorEntryToml {
            name: Some(sensor.name.clone()),
            type_name: sensor.name.clone(),
        });
    }

    toml::to_string_pretty(&DeviceConfigToml {
        sensor_types,
        sensors,
    })
    .map_err(|source| ConfigError::TomlSer { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[sensor_types.mimosa]
measurement = "pixel_binary"
cols = 1152
rows = 576
pitch_col = 0.0184
pitch_row = 0.0184
pitch_timestamp = 4000.0
timestamp_min = 0
timestamp_max = 15
value_max = 1
x_x0 = 0.00075

[[sensors]]
name = "plane0"
type = "mimosa"

[[sensors]]
type = "mimosa"
"#;

    #[test]
    fn loads_inclusive_ranges_as_half_open() {
        let device = load_device(SAMPLE).unwrap();
        assert_eq!(device.num_sensors(), 2);
        assert_eq!(device.sensor(0).timestamp_max, 16);
        assert_eq!(device.sensor(0).value_max, 2);
        assert_eq!(device.sensor(0).name, "plane0");
        assert_eq!(device.sensor(1).name, "mimosa_1");
    }

    #[test]
    fn missing_sensor_type_is_an_error() {
        let bad = SAMPLE.replace("type = \"mimosa\"", "type = \"nope\"");
        assert!(load_device(&bad).is_err());
    }

    #[test]
    fn roundtrips_through_save() {
        let device = load_device(SAMPLE).unwrap();
        let saved = save_device(&device).unwrap();
        let reloaded = load_device(&saved).unwrap();
        assert_eq!(reloaded.num_sensors(), device.num_sensors());
        assert_eq!(reloaded.sensor(0).timestamp_max, device.sensor(0).timestamp_max);
    }
}
