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

//! Per-sensor detection efficiency: of the tracks predicted to cross a
//! sensor's sensitive area, what fraction left a matched cluster there.
//! Reads the local states [`crate::processors::populate_local_states`]
//! fills in, which is why it must run after that processor, not before.

use std::collections::BTreeMap;

use log::info;

use crate::device::Device;
use crate::linalg::SensorId;
use crate::storage::Event;

use super::Analyzer;

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    expected: u64,
    matched: u64,
}

impl Counts {
    fn efficiency(&self) -> f64 {
        if self.expected == 0 {
            f64::NAN
        } else {
            self.matched as f64 / self.expected as f64
        }
    }
}

pub struct EfficiencyAnalyzer {
    sensor_ids: Vec<SensorId>,
    sensitive_areas: BTreeMap<SensorId, (f64, f64, f64, f64)>,
    counts: BTreeMap<SensorId, Counts>,
}

impl EfficiencyAnalyzer {
    pub fn new(device: &Device, sensor_ids: Vec<SensorId>) -> Self {
        let sensitive_areas = sensor_ids
            .iter()
            .map(|&sid| (sid, device.sensor(sid).sensitive_area()))
            .collect();
        EfficiencyAnalyzer {
            sensor_ids,
            sensitive_areas,
            counts: BTreeMap::new(),
        }
    }

    /// `None` if the sensor never had a track predicted through it.
    pub fn efficiency(&self, sensor_id: SensorId) -> Option<f64> {
        let counts = self.counts.get(&sensor_id)?;
        if counts.expected == 0 {
            None
        } else {
            Some(counts.efficiency())
        }
    }
}

impl Analyzer for EfficiencyAnalyzer {
    fn name(&self) -> &str {
        "EfficiencyAnalyzer"
    }

    fn execute(&mut self, event: &Event) {
        for &sensor_id in &self.sensor_ids {
            let Some(&(u_min, u_max, v_min, v_max)) = self.sensitive_areas.get(&sensor_id) else {
                continue;
            };
            let sensor_event = event.sensor(sensor_id);

            for state in &sensor_event.local_states {
                let inside = (u_min..u_max).contains(&state.u()) && (v_min..v_max).contains(&state.v());
                if !inside {
                    continue;
                }
                let counts = self.counts.entry(sensor_id).or_default();
                counts.expected += 1;
                if state.cluster.is_some() {
                    counts.matched += 1;
                }
            }
        }
    }

    fn finalize(&mut self) {
        for &sensor_id in &self.sensor_ids {
            if let Some(eff) = self.efficiency(sensor_id) {
                info!("sensor {sensor_id} efficiency: {:.4}", eff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MeasurementKind, Sensor};
    use crate::storage::{Cluster, TrackState};

    fn device() -> Device {
        let sensor = Sensor {
            name: "s".into(),
            measurement: MeasurementKind::PixelBinary,
            cols: 100,
            rows: 100,
            pitch_col: 0.02,
            pitch_row: 0.02,
            pitch_timestamp: 25.0,
            timestamp_min: 0,
            timestamp_max: 16,
            value_max: 1,
            x_x0: 0.001,
            regions: vec![],
        };
        Device::new(vec![sensor]).unwrap()
    }

    #[test]
    fn tracks_through_sensor_without_a_cluster_reduce_efficiency() {
        let device = device();
        let mut analyzer = EfficiencyAnalyzer::new(&device, vec![0]);

        let mut event = Event::new(0, 0, 1);

        let mut matched = TrackState::new(crate::linalg::Vec6::zeros(), crate::linalg::Mat6::zeros());
        matched.params[0] = 1.0;
        matched.params[1] = 1.0;
        matched.cluster = Some(0);
        event.sensor_mut(0).local_states.push(matched);
        event.sensor_mut(0).add_cluster(Cluster::new());

        let mut missed = TrackState::new(crate::linalg::Vec6::zeros(), crate::linalg::Mat6::zeros());
        missed.params[0] = 1.5;
        missed.params[1] = 1.0;
        missed.cluster = None;
        event.sensor_mut(0).local_states.push(missed);

        analyzer.execute(&event);
        assert_eq!(analyzer.efficiency(0), Some(0.5));
    }

    #[test]
    fn tracks_outside_the_sensitive_area_are_not_counted() {
        let device = device();
        let mut analyzer = EfficiencyAnalyzer::new(&device, vec![0]);

        let mut event = Event::new(0, 0, 1);
        let mut outside = TrackState::new(crate::linalg::Vec6::zeros(), crate::linalg::Mat6::zeros());
        outside.params[0] = -5.0;
        outside.params[1] = 1.0;
        event.sensor_mut(0).local_states.push(outside);

        analyzer.execute(&event);
        assert_eq!(analyzer.efficiency(0), None);
    }
}
