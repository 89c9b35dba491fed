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

//! Diagnostic analyzers: per-sensor residual and efficiency bookkeeping,
//! consumed by the aligners' step monitoring and by summary reports.
//! Unlike an [`crate::align::Aligner`], an analyzer never emits a new
//! geometry -- it only accumulates statistics over the events it sees.

mod efficiency;
mod residuals;

pub use efficiency::EfficiencyAnalyzer;
pub use residuals::ResidualsAnalyzer;

use crate::storage::Event;

/// Shared interface for the diagnostic analyzers run after the
/// reconstruction chain and before (or alongside) the aligners, per the
/// sequential event loop's `reader -> processors -> analyzers -> writers`
/// ordering.
pub trait Analyzer {
    fn name(&self) -> &str;
    fn execute(&mut self, event: &Event);
    fn finalize(&mut self) {}
}
