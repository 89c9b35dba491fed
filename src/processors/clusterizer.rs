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

//! Per-sensor clusterization: group edge-connected, unmasked, same-region
//! hits and reduce each group to a single weighted position/time estimate.

use crate::device::{MeasurementKind, PixelMask, Sensor};
use crate::linalg::{SensorId, SymMatrix3};
use crate::storage::{Cluster, SensorEvent};

/// Scaling from a uniform distribution's width to the equivalent Gaussian
/// variance: `Var[Uniform(0,1)] = 1/12`.
const K_VAR: f64 = 1.0 / 12.0;

/// The three interchangeable centroid policies sharing the same
/// connectivity-grouping skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterizerKind {
    /// Unweighted mean position; fastest hit gives the timestamp.
    Binary,
    /// Hit-value-weighted mean position; fastest hit gives the timestamp.
    ValueWeighted,
    /// Position and timestamp taken entirely from the fastest hit.
    FastestHit,
}

/// The centroid policy a sensor uses by default, chosen from how it reports
/// amplitude: a binary sensor has no weight to contribute, a ToT sensor's
/// amplitude is worth weighting by.
pub fn default_kind_for(measurement: MeasurementKind) -> ClusterizerKind {
    match measurement {
        MeasurementKind::PixelBinary | MeasurementKind::Ccpdv4Binary => ClusterizerKind::Binary,
        MeasurementKind::PixelTot => ClusterizerKind::ValueWeighted,
    }
}

/// Group connected hits on `sensor_event` into clusters and append them,
/// setting each consumed hit's `cluster` back-reference.
pub fn clusterize(
    kind: ClusterizerKind,
    sensor_id: SensorId,
    sensor: &Sensor,
    mask: &PixelMask,
    sensor_event: &mut SensorEvent,
) {
    let n = sensor_event.hits.len();
    let mut order: Vec<usize> = (0..n).collect();

    // resolve each hit's region from the sensor's configured rectangles
    // before grouping, since connectivity is region-scoped.
    for hit in &mut sensor_event.hits {
        hit.region = sensor.region_of(hit.col, hit.row);
    }

    // move masked hits to the back
    let mut split = 0;
    for i in 0..order.len() {
        let hit = sensor_event.hits[order[i]];
        if !mask.is_masked(sensor_id, hit.col, hit.row) {
            order.swap(split, i);
            split += 1;
        }
    }
    let active = &mut order[..split];

    let mut start = 0;
    while start < active.len() {
        let mut end = start + 1;
        loop {
            // partition [end, active.len()) into hits connected to the
            // current cluster [start, end) first, keep iterating until a
            // pass adds nothing new.
            let mut write = end;
            for read in end..active.len() {
                let candidate = sensor_event.hits[active[read]];
                let is_connected = active[start..end].iter().any(|&idx| {
                    let member = sensor_event.hits[idx];
                    member.region == candidate.region && member.is_adjacent(&candidate)
                });
                if is_connected {
                    active.swap(write, read);
                    write += 1;
                }
            }
            if write == end {
                break;
            }
            end = write;
        }

        let mut members: Vec<usize> = active[start..end].to_vec();
        // sort by value desc, timestamp asc -- a strict weak ordering.
        members.sort_by(|&a, &b| {
            let ha = sensor_event.hits[a];
            let hb = sensor_event.hits[b];
            hb.value
                .cmp(&ha.value)
                .then(ha.timestamp.cmp(&hb.timestamp))
        });

        let cluster = make_cluster(kind, sensor_event, &members);
        sensor_event.add_cluster(cluster);
        let cluster_idx = sensor_event.clusters.len() - 1;
        for &hit_idx in &members {
            sensor_event.hits[hit_idx].cluster = Some(cluster_idx);
        }
        sensor_event.clusters[cluster_idx].hits = members;

        start = end;
    }
}

fn make_cluster(kind: ClusterizerKind, sensor_event: &SensorEvent, members: &[usize]) -> Cluster {
    let hits: Vec<_> = members.iter().map(|&i| sensor_event.hits[i]).collect();
    let region = hits.first().and_then(|h| h.region);

    let (col, row, timestamp, value, col_var, row_var) = match kind {
        ClusterizerKind::Binary => {
            let n = hits.len() as f64;
            let col = hits.iter().map(|h| h.col as f64).sum::<f64>() / n;
            let row = hits.iter().map(|h| h.row as f64).sum::<f64>() / n;
            let ts = hits.iter().map(|h| h.timestamp).min().unwrap_or(0);
            let value = hits.len() as i64;
            let span_col = (hits.iter().map(|h| h.col).max().unwrap_or(0)
                - hits.iter().map(|h| h.col).min().unwrap_or(0)
                + 1) as f64;
            let span_row = (hits.iter().map(|h| h.row).max().unwrap_or(0)
                - hits.iter().map(|h| h.row).min().unwrap_or(0)
                + 1) as f64;
            (col, row, ts as f64, value as f64, K_VAR / span_col, K_VAR / span_row)
        }
        ClusterizerKind::ValueWeighted => {
            let total: f64 = hits.iter().map(|h| h.value as f64).sum();
            let col = hits.iter().map(|h| h.value as f64 * h.col as f64).sum::<f64>() / total;
            let row = hits.iter().map(|h| h.value as f64 * h.row as f64).sum::<f64>() / total;
            let ts = hits.iter().map(|h| h.timestamp).min().unwrap_or(0);
            let span_col = (hits.iter().map(|h| h.col).max().unwrap_or(0)
                - hits.iter().map(|h| h.col).min().unwrap_or(0)
                + 1) as f64;
            let span_row = (hits.iter().map(|h| h.row).max().unwrap_or(0)
                - hits.iter().map(|h| h.row).min().unwrap_or(0)
                + 1) as f64;
            (col, row, ts as f64, total, K_VAR / span_col, K_VAR / span_row)
        }
        ClusterizerKind::FastestHit => {
            let fastest = hits.iter().min_by_key(|h| h.timestamp).expect("non-empty cluster");
            (
                fastest.col as f64,
                fastest.row as f64,
                fastest.timestamp as f64,
                fastest.value as f64,
                K_VAR,
                K_VAR,
            )
        }
    };

    let mut cluster = Cluster::new();
    cluster.col = col;
    cluster.row = row;
    cluster.timestamp = timestamp;
    cluster.value = value;
    cluster.region = region;
    cluster.cov_col_row_ts = SymMatrix3::from_diagonal(&nalgebra::Vector3::new(col_var, row_var, K_VAR));
    cluster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MeasurementKind;
    use crate::storage::Hit;

    fn sensor() -> Sensor {
        Sensor {
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
        }
    }

    #[test]
    fn adjacent_hits_form_one_cluster() {
        let mut ev = SensorEvent::new(0, 0);
        ev.add_hit(Hit::new(5, 5, 0, 1));
        ev.add_hit(Hit::new(5, 6, 0, 1));
        ev.add_hit(Hit::new(6, 5, 1, 1));
        let mask = PixelMask::new();
        clusterize(ClusterizerKind::Binary, 0, &sensor(), &mask, &mut ev);
        assert_eq!(ev.clusters.len(), 1);
        assert_eq!(ev.clusters[0].hits.len(), 3);
    }

    #[test]
    fn disjoint_hits_form_separate_clusters() {
        let mut ev = SensorEvent::new(0, 0);
        ev.add_hit(Hit::new(0, 0, 0, 1));
        ev.add_hit(Hit::new(50, 50, 0, 1));
        let mask = PixelMask::new();
        clusterize(ClusterizerKind::Binary, 0, &sensor(), &mask, &mut ev);
        assert_eq!(ev.clusters.len(), 2);
    }

    #[test]
    fn masked_hits_excluded() {
        let mut ev = SensorEvent::new(0, 0);
        ev.add_hit(Hit::new(5, 5, 0, 1));
        ev.add_hit(Hit::new(6, 5, 1, 1));
        let mut mask = PixelMask::new();
        mask.mask_pixel(0, 6, 5);
        clusterize(ClusterizerKind::Binary, 0, &sensor(), &mask, &mut ev);
        assert_eq!(ev.clusters.len(), 1);
        assert_eq!(ev.clusters[0].hits.len(), 1);
    }

    #[test]
    fn different_regions_stay_separate() {
        use crate::device::Region;

        let mut sensor_with_regions = sensor();
        sensor_with_regions.regions = vec![
            Region {
                name: "a".into(),
                col_min: 0,
                col_max: 6,
                row_min: 0,
                row_max: 100,
            },
            Region {
                name: "b".into(),
                col_min: 6,
                col_max: 100,
                row_min: 0,
                row_max: 100,
            },
        ];

        let mut ev = SensorEvent::new(0, 0);
        ev.add_hit(Hit::new(5, 5, 0, 1));
        ev.add_hit(Hit::new(6, 5, 1, 1));
        let mask = PixelMask::new();
        clusterize(ClusterizerKind::Binary, 0, &sensor_with_regions, &mask, &mut ev);
        assert_eq!(ev.clusters.len(), 2);
    }

    #[test]
    fn value_weighted_centroid_favours_larger_value() {
        let mut ev = SensorEvent::new(0, 0);
        ev.add_hit(Hit::new(0, 0, 0, 1));
        ev.add_hit(Hit::new(1, 0, 0, 9));
        let mask = PixelMask::new();
        clusterize(ClusterizerKind::ValueWeighted, 0, &sensor(), &mask, &mut ev);
        assert_eq!(ev.clusters.len(), 1);
        assert!(ev.clusters[0].col > 0.5);
    }
}
