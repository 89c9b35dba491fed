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

//! External interfaces: TOML configuration loaders, the Parquet event
//! stream reader/writer, and the multi-sensor reader merger.

pub mod config;
mod merger;
mod parquet_io;
pub(crate) mod watermark;

pub use merger::Merger;
pub use parquet_io::{ParquetSensorReader, ParquetSensorWriter};

use std::path::Path;

use crate::device::Device;
use crate::errors::{IoError, OpenSnafu};
use crate::storage::Event;

/// Pull-based source of [`Event`]s for one or more sensors.
///
/// Implementations adapt an external file format; the event loop asks for
/// the next event and the reader returns `false` once it is exhausted.
pub trait Reader {
    fn name(&self) -> &str;

    /// Total number of events, if known ahead of time.
    fn num_events(&self) -> Option<u64>;

    fn num_sensors(&self) -> usize;

    /// Skip `n` events without materialising them.
    fn skip(&mut self, n: u64) -> Result<(), IoError>;

    /// Populate `event` with the next event, returning `false` at
    /// end-of-stream. `event` is expected to already have the right number
    /// of sensor slots (see [`Event::new`]).
    fn read(&mut self, event: &mut Event) -> Result<bool, IoError>;
}

/// Synchronous sink for reconstructed events.
pub trait Writer {
    fn append(&mut self, event: &Event) -> Result<(), IoError>;

    /// Flush any buffered rows not yet committed to storage. Implementors
    /// that buffer in memory between row groups should also flush on
    /// `Drop`; callers are not required to call this before the writer is
    /// dropped.
    fn finish(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

/// Open one [`ParquetSensorReader`] per sensor in `device`, named
/// `sensor_<id>.parquet` under `dir`, and merge them into a single
/// whole-device [`Reader`]. This is the convention every `pt-*` binary
/// uses for its `INPUT` argument.
pub fn open_sensor_directory(dir: &Path, device: &Device) -> Result<Merger, IoError> {
    let mut readers: Vec<Box<dyn Reader>> = Vec::with_capacity(device.num_sensors());
    for &sensor_id in device.sensor_ids() {
        let path = dir.join(format!("sensor_{sensor_id}.parquet"));
        if !path.exists() {
            return Err(OpenSnafu {
                path: path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .build());
        }
        readers.push(Box::new(ParquetSensorReader::open(&path)?));
    }
    Ok(Merger::new(readers))
}

/// Open one [`ParquetSensorWriter`] per sensor in `device`, named
/// `<prefix>_sensor_<id>.parquet`.
pub fn create_sensor_writers(
    output_prefix: &Path,
    device: &Device,
) -> Result<Vec<ParquetSensorWriter>, IoError> {
    let mut writers = Vec::with_capacity(device.num_sensors());
    for &sensor_id in device.sensor_ids() {
        let mut path = output_prefix.as_os_str().to_owned();
        path.push(format!("_sensor_{sensor_id}.parquet"));
        writers.push(ParquetSensorWriter::create(path, device, sensor_id)?);
    }
    Ok(writers)
}
