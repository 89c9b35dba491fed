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

//! Per-sensor residual bookkeeping: `(ru, rv) = measurement - prediction`
//! for every matched cluster, using the already-populated local states
//! (see [`crate::processors::populate_local_states`]) rather than
//! recomputing a fit of its own.

use std::collections::BTreeMap;

use log::info;

use crate::align::RunningMean;
use crate::linalg::SensorId;
use crate::storage::Event;

use super::Analyzer;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResidualSummary {
    pub mean_u: f64,
    pub mean_u_error: f64,
    pub mean_v: f64,
    pub mean_v_error: f64,
    pub rms_u: f64,
    pub rms_v: f64,
    pub n: u64,
}

pub struct ResidualsAnalyzer {
    sensor_ids: Vec<SensorId>,
    residuals: BTreeMap<SensorId, (RunningMean, RunningMean)>,
}

impl ResidualsAnalyzer {
    pub fn new(sensor_ids: Vec<SensorId>) -> Self {
        ResidualsAnalyzer {
            sensor_ids,
            residuals: BTreeMap::new(),
        }
    }

    pub fn summary(&self, sensor_id: SensorId) -> Option<ResidualSummary> {
        let (ru, rv) = self.residuals.get(&sensor_id)?;
        Some(ResidualSummary {
            mean_u: ru.mean(),
            mean_u_error: ru.mean_error(),
            mean_v: rv.mean(),
            mean_v_error: rv.mean_error(),
            rms_u: ru.variance().sqrt(),
            rms_v: rv.variance().sqrt(),
            n: ru.count(),
        })
    }
}

impl Analyzer for ResidualsAnalyzer {
    fn name(&self) -> &str {
        "ResidualsAnalyzer"
    }

    fn execute(&mut self, event: &Event) {
        for &sensor_id in &self.sensor_ids {
            let sensor_event = event.sensor(sensor_id);
            for cluster in &sensor_event.clusters {
                let Some(state_idx) = cluster.matched_state else {
                    continue;
                };
                let state = &sensor_event.local_states[state_idx];
                let ru = cluster.local.x - state.u();
                let rv = cluster.local.y - state.v();

                let entry = self.residuals.entry(sensor_id).or_default();
                entry.0.add(ru);
                entry.1.add(rv);
            }
        }
    }

    fn finalize(&mut self) {
        for &sensor_id in &self.sensor_ids {
            if let Some(summary) = self.summary(sensor_id) {
                info!(
                    "sensor {sensor_id} residuals: u {:.6} +- {:.6}, v {:.6} +- {:.6}",
                    summary.mean_u, summary.mean_u_error, summary.mean_v, summary.mean_v_error
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Cluster, TrackState};

    #[test]
    fn residual_is_measurement_minus_prediction() {
        let mut event = Event::new(0, 0, 1);
        let mut state = TrackState::new(crate::linalg::Vec6::zeros(), crate::linalg::Mat6::zeros());
        state.params[0] = 1.0;
        state.params[1] = 2.0;
        event.sensor_mut(0).local_states.push(state);

        let mut c = Cluster::new();
        c.local.x = 1.1;
        c.local.y = 2.2;
        c.matched_state = Some(0);
        event.sensor_mut(0).add_cluster(c);

        let mut analyzer = ResidualsAnalyzer::new(vec![0]);
        analyzer.execute(&event);
        let summary = analyzer.summary(0).unwrap();
        assert!((summary.mean_u - 0.1).abs() < 1e-9);
        assert!((summary.mean_v - 0.2).abs() < 1e-9);
    }

    #[test]
    fn unmatched_clusters_are_skipped() {
        let mut event = Event::new(0, 0, 1);
        let c = Cluster::new();
        event.sensor_mut(0).add_cluster(c);

        let mut analyzer = ResidualsAnalyzer::new(vec![0]);
        analyzer.execute(&event);
        assert!(analyzer.summary(0).is_none());
    }
}
