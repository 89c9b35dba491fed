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

//! Per-event processing stages: pixel-to-local conversion, clusterization,
//! track propagation, finding and fitting.

pub mod apply_geometry;
pub mod clusterizer;
pub mod local_states;
pub mod propagation;
pub mod track_finder;
pub mod track_fitter;

pub use apply_geometry::apply_geometry;
pub use clusterizer::{clusterize, default_kind_for, ClusterizerKind};
pub use local_states::populate_local_states;
pub use track_finder::TrackFinder;
