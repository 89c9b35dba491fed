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

//! Iterative geometric alignment: a coarse cluster-correlation aligner that
//! needs no tracks, and a fine residuals aligner that refines alignable
//! sensors from unbiased track residuals. Both share the same interface so
//! the iteration driver ([`run_iterations`]) can swap between them.

mod correlation;
mod residuals;

pub use correlation::CorrelationAligner;
pub use residuals::ResidualsAligner;

use log::info;

use crate::device::Device;
use crate::errors::Result;
use crate::geometry::Geometry;
use crate::storage::Event;

/// Online mean/standard-error accumulator (Welford's algorithm), used
/// everywhere a histogram mean and its error would have been read off a
/// `TH1D` in the reference tool.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RunningMean {
    n: u64,
    mean: f64,
    m2: f64,
}

impl RunningMean {
    pub fn add(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }

    /// Standard error of the mean: `sqrt(Var[x] / n)`.
    pub fn mean_error(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            (self.variance() / self.n as f64).sqrt()
        }
    }
}

/// Shared interface for both alignment strategies, matching the reference
/// tool's `Aligner`: accumulate per-event statistics, then derive a new
/// geometry from them.
pub trait Aligner {
    fn name(&self) -> &str;
    fn execute(&mut self, device: &Device, event: &Event);
    fn finalize(&mut self) {}
    fn updated_geometry(&self, device: &Device) -> Geometry;
}

/// One entry in the alignment parameter trajectory: the geometry after
/// iteration `step` (`step == 0` is the pre-alignment geometry).
#[derive(Debug, Clone)]
pub struct TrajectoryPoint {
    pub step: usize,
    pub geometry: Geometry,
}

/// Drive `num_steps` of reconstruct-then-align over `device`. `read_events`
/// re-opens the input (fresh each step, since the geometry it reconstructs
/// against has just changed) and yields the events for that step;
/// `reconstruct` runs the per-event chain (clusterize -> apply geometry ->
/// find tracks -> fit, as configured by the caller) in place on each event
/// before it reaches the aligner.
///
/// Returns the full parameter trajectory, starting with the pre-alignment
/// geometry as step 0.
pub fn run_iterations<A>(
    device: &mut Device,
    num_steps: usize,
    mut build_aligner: impl FnMut(&Device) -> A,
    mut read_events: impl FnMut() -> Vec<Event>,
    mut reconstruct: impl FnMut(&Device, &mut Event),
) -> Result<Vec<TrajectoryPoint>>
where
    A: Aligner,
{
    let mut trajectory = vec![TrajectoryPoint {
        step: 0,
        geometry: device.geometry().clone(),
    }];

    for step in 1..=num_steps {
        let mut aligner = build_aligner(device);
        info!("alignment step {step}/{num_steps} using {}", aligner.name());

        for mut event in read_events() {
            reconstruct(device, &mut event);
            aligner.execute(device, &event);
        }
        aligner.finalize();

        let updated = aligner.updated_geometry(device);
        device.set_geometry(updated.clone());
        trajectory.push(TrajectoryPoint {
            step,
            geometry: updated,
        });
    }

    Ok(trajectory)
}
