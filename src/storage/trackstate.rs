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

use crate::linalg::{SymMatrix6, Vec6};

/// A fitted local track state `[u, v, du, dv, s, ds]` with its 6x6
/// covariance, belonging to one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    pub params: Vec6,
    pub cov: SymMatrix6,
    /// Index of the owning track, once assigned by the fitter.
    pub track: Option<usize>,
    /// Index of the cluster this state was matched to on its sensor.
    pub cluster: Option<usize>,
}

impl TrackState {
    pub fn new(params: Vec6, cov: SymMatrix6) -> Self {
        TrackState {
            params,
            cov,
            track: None,
            cluster: None,
        }
    }

    pub fn u(&self) -> f64 {
        self.params[0]
    }
    pub fn v(&self) -> f64 {
        self.params[1]
    }
    pub fn du(&self) -> f64 {
        self.params[2]
    }
    pub fn dv(&self) -> f64 {
        self.params[3]
    }
    pub fn s(&self) -> f64 {
        self.params[4]
    }
    pub fn ds(&self) -> f64 {
        self.params[5]
    }
}
