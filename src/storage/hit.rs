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

/// A single pixel hit read out on one sensor for one event.
///
/// Owned by the [`SensorEvent`](super::SensorEvent) that read it out; the
/// `cluster` back-reference is set once the clusterizer assigns this hit to
/// a cluster, and resolves to an index into that same sensor event's
/// cluster list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub col: i32,
    pub row: i32,
    pub timestamp: i64,
    pub value: i64,
    /// Index into the sensor's configured region list, if the pixel falls
    /// inside one.
    pub region: Option<usize>,
    /// Index into the owning sensor event's cluster list.
    pub cluster: Option<usize>,
}

impl Hit {
    pub fn new(col: i32, row: i32, timestamp: i64, value: i64) -> Self {
        Hit {
            col,
            row,
            timestamp,
            value,
            region: None,
            cluster: None,
        }
    }

    /// Are `self` and `other` edge-adjacent, i.e. sharing exactly one edge
    /// of the pixel grid (or the same pixel)?
    pub fn is_adjacent(&self, other: &Hit) -> bool {
        let dcol = (self.col - other.col).abs();
        let drow = (self.row - other.row).abs();
        (dcol == 0 && drow <= 1) || (dcol <= 1 && drow == 0)
    }
}
