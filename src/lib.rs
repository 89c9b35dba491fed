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

//! Track reconstruction and geometric alignment for pixel-sensor telescope
//! test-beam data.
//!
//! The crate is organised bottom-up: [`linalg`] and [`errors`] are shared
//! leaves; [`geometry`] and [`device`] describe a telescope setup;
//! [`storage`] is the per-event data model; [`processors`] turns raw hits
//! into fitted tracks; [`align`] and [`noise`] consume reconstructed events
//! to produce a new geometry or a pixel mask; [`analyzers`] books
//! diagnostic summaries alongside them; [`io`] adapts all of the above to
//! TOML configuration and Parquet event streams.

pub mod align;
pub mod analyzers;
pub mod cli;
pub mod device;
pub mod errors;
pub mod geometry;
pub mod io;
pub mod linalg;
pub mod noise;
pub mod processors;
pub mod storage;

pub use errors::{AlignError, Result};
