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

use std::collections::{BTreeMap, BTreeSet};

use crate::linalg::SensorId;

/// A masked pixel address.
pub type ColumnRow = (i32, i32);

/// Masked pixels per sensor. Merging two masks is a plain set-union.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelMask {
    masked: BTreeMap<SensorId, BTreeSet<ColumnRow>>,
}

impl PixelMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask_pixel(&mut self, sensor_id: SensorId, col: i32, row: i32) {
        self.masked.entry(sensor_id).or_default().insert((col, row));
    }

    pub fn masked_pixels(&self, sensor_id: SensorId) -> &BTreeSet<ColumnRow> {
        static EMPTY: BTreeSet<ColumnRow> = BTreeSet::new();
        self.masked.get(&sensor_id).unwrap_or(&EMPTY)
    }

    pub fn is_masked(&self, sensor_id: SensorId, col: i32, row: i32) -> bool {
        self.masked
            .get(&sensor_id)
            .is_some_and(|s| s.contains(&(col, row)))
    }

    pub fn num_masked_pixels(&self) -> usize {
        self.masked.values().map(|s| s.len()).sum()
    }

    /// Merge masked pixels from `other` into `self`.
    pub fn merge(&mut self, other: &PixelMask) {
        for (&sensor_id, pixels) in &other.masked {
            self.masked
                .entry(sensor_id)
                .or_default()
                .extend(pixels.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_set_union() {
        let mut a = PixelMask::new();
        a.mask_pixel(0, 1, 1);
        let mut b = PixelMask::new();
        b.mask_pixel(0, 1, 1);
        b.mask_pixel(0, 2, 2);
        a.merge(&b);
        assert_eq!(a.num_masked_pixels(), 2);
        assert!(a.is_masked(0, 2, 2));
    }
}
