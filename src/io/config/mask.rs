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

//! TOML pixel-mask configuration: `-m PATH` on the CLI may be given
//! repeatedly, each file merged into the device's running mask.

use serde::{Deserialize, Serialize};

use crate::device::PixelMask;
use crate::errors::ConfigError;
use crate::linalg::SensorId;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MaskEntryToml {
    id: SensorId,
    masked_pixels: Vec<[i32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MaskConfigToml {
    sensors: Vec<MaskEntryToml>,
}

pub fn load_mask(document: &str) -> Result<PixelMask, ConfigError> {
    let parsed: MaskConfigToml =
        toml::from_str(document).map_err(|source| ConfigError::Toml { source })?;

    let mut mask = PixelMask::new();
    for entry in parsed.sensors {
        for pixel in entry.masked_pixels {
            mask.mask_pixel(entry.id, pixel[0], pixel[1]);
        }
    }
    Ok(mask)
}

pub fn save_mask(mask: &PixelMask, sensor_ids: &[SensorId]) -> Result<String, ConfigError> {
    let sensors = sensor_ids
        .iter()
        .map(|&id| MaskEntryToml {
            id,
            masked_pixels: mask.masked_pixels(id).iter().map(|&(c, r)| [c, r]).collect(),
        })
        .collect();

    toml::to_string_pretty(&MaskConfigToml { sensors })
        .map_err(|source| ConfigError::TomlSer { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[sensors]]
id = 0
masked_pixels = [[3, 5], [10, 2]]

[[sensors]]
id = 2
masked_pixels = []
"#;

    #[test]
    fn loads_masked_pixels_per_sensor() {
        let mask = load_mask(SAMPLE).unwrap();
        assert!(mask.is_masked(0, 3, 5));
        assert!(mask.is_masked(0, 10, 2));
        assert!(!mask.is_masked(0, 0, 0));
        assert_eq!(mask.num_masked_pixels(), 2);
    }

    #[test]
    fn round_trips_through_save() {
        let mask = load_mask(SAMPLE).unwrap();
        let saved = save_mask(&mask, &[0, 2]).unwrap();
        let reloaded = load_mask(&saved).unwrap();
        assert_eq!(reloaded, mask);
    }
}
