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

//! Combines several single- (or multi-) sensor [`Reader`]s into one reader
//! over the union of their sensors, advancing them in lockstep.

use log::warn;

use crate::errors::IoError;
use crate::storage::Event;

use super::Reader;

/// Side-by-side composition of readers, each contributing a contiguous
/// range of sensor slots to the merged event. Readers are assumed to be
/// synchronised frame-for-frame; a length disagreement beyond a warning is
/// an error rather than a silent truncation.
pub struct Merger {
    readers: Vec<Box<dyn Reader>>,
    sensor_offsets: Vec<usize>,
    num_sensors: usize,
}

impl Merger {
    pub fn new(readers: Vec<Box<dyn Reader>>) -> Self {
        let mut sensor_offsets = Vec::with_capacity(readers.len());
        let mut num_sensors = 0;
        for reader in &readers {
            sensor_offsets.push(num_sensors);
            num_sensors += reader.num_sensors();
        }

        if let Some(first) = readers.first() {
            for other in &readers[1..] {
                if let (Some(a), Some(b)) = (first.num_events(), other.num_events()) {
                    if a != b {
                        warn!(
                            "merged readers disagree on event count: {} has {a}, {} has {b}",
                            first.name(),
                            other.name()
                        );
                    }
                }
            }
        }

        Merger {
            readers,
            sensor_offsets,
            num_sensors,
        }
    }

    fn check_lengths(&self) -> Result<(), IoError> {
        let counted: Vec<_> = self
            .readers
            .iter()
            .filter_map(|r| r.num_events().map(|n| (r.name().to_string(), n)))
            .collect();
        for pair in counted.windows(2) {
            let (name_a, count_a) = &pair[0];
            let (name_b, count_b) = &pair[1];
            if count_a != count_b {
                return Err(IoError::MergeLengthMismatch {
                    name_a: name_a.clone(),
                    count_a: *count_a,
                    name_b: name_b.clone(),
                    count_b: *count_b,
                });
            }
        }
        Ok(())
    }
}

impl Reader for Merger {
    fn name(&self) -> &str {
        "merged"
    }

    fn num_events(&self) -> Option<u64> {
        self.readers.iter().find_map(|r| r.num_events())
    }

    fn num_sensors(&self) -> usize {
        self.num_sensors
    }

    fn skip(&mut self, n: u64) -> Result<(), IoError> {
        for reader in &mut self.readers {
            reader.skip(n)?;
        }
        Ok(())
    }

    fn read(&mut self, event: &mut Event) -> Result<bool, IoError> {
        self.check_lengths()?;

        let mut any_read = false;
        let mut frame = event.frame;
        let mut timestamp = event.timestamp;

        for (reader, &offset) in self.readers.iter_mut().zip(&self.sensor_offsets) {
            let mut sub_event = Event::new(frame, timestamp, reader.num_sensors());
            let read_ok = reader.read(&mut sub_event)?;
            if !read_ok {
                if any_read {
                    // one reader ran dry while another still had data; the
                    // disagreement should already have been caught above,
                    // but guard against a reader whose num_events() lied.
                    return Err(IoError::MergeLengthMismatch {
                        name_a: reader.name().to_string(),
                        count_a: 0,
                        name_b: "earlier reader in this merge".to_string(),
                        count_b: 1,
                    });
                }
                return Ok(false);
            }
            any_read = true;
            frame = sub_event.frame;
            timestamp = sub_event.timestamp;

            for (i, sensor_event) in sub_event.sensors.into_iter().enumerate() {
                event.sensors[offset + i] = sensor_event;
            }
        }

        event.frame = frame;
        event.timestamp = timestamp;
        event.tracks.clear();
        Ok(any_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Hit;

    struct FixedReader {
        name: String,
        frames: Vec<Vec<(i32, i32)>>,
        cursor: usize,
    }

    impl Reader for FixedReader {
        fn name(&self) -> &str {
            &self.name
        }

        fn num_events(&self) -> Option<u64> {
            Some(self.frames.len() as u64)
        }

        fn num_sensors(&self) -> usize {
            1
        }

        fn skip(&mut self, n: u64) -> Result<(), IoError> {
            self.cursor += n as usize;
            Ok(())
        }

        fn read(&mut self, event: &mut Event) -> Result<bool, IoError> {
            if self.cursor >= self.frames.len() {
                return Ok(false);
            }
            event.frame = self.cursor as u64;
            event.timestamp = self.cursor as u64;
            let sensor_event = event.sensor_mut(0);
            for &(col, row) in &self.frames[self.cursor] {
                sensor_event.add_hit(Hit::new(col, row, 0, 1));
            }
            self.cursor += 1;
            Ok(true)
        }
    }

    #[test]
    fn concatenates_sensor_slots() {
        let a: Box<dyn Reader> = Box::new(FixedReader {
            name: "a".into(),
            frames: vec![vec![(1, 1)]],
            cursor: 0,
        });
        let b: Box<dyn Reader> = Box::new(FixedReader {
            name: "b".into(),
            frames: vec![vec![(2, 2)]],
            cursor: 0,
        });
        let mut merger = Merger::new(vec![a, b]);
        assert_eq!(merger.num_sensors(), 2);

        let mut event = Event::new(0, 0, merger.num_sensors());
        let ok = merger.read(&mut event).unwrap();
        assert!(ok);
        assert_eq!(event.sensor(0).hits[0].col, 1);
        assert_eq!(event.sensor(1).hits[0].col, 2);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let a: Box<dyn Reader> = Box::new(FixedReader {
            name: "a".into(),
            frames: vec![vec![(1, 1)], vec![(1, 1)]],
            cursor: 0,
        });
        let b: Box<dyn Reader> = Box::new(FixedReader {
            name: "b".into(),
            frames: vec![vec![(2, 2)]],
            cursor: 0,
        });
        let mut merger = Merger::new(vec![a, b]);
        let mut event = Event::new(0, 0, merger.num_sensors());
        assert!(merger.read(&mut event).is_err());
    }
}
