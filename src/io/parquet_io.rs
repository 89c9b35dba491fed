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

//! Native column-oriented event storage: one Parquet file per sensor, one
//! row per hit (reader) or per matched cluster (writer), with generation
//! metadata stamped via [`super::watermark`].
//!
//! The whole file is read into memory at construction -- this crate does
//! not stream row groups lazily, trading peak memory for a reader free of
//! self-referential lifetime bookkeeping. Rows are assumed sorted by frame
//! ascending, the order every writer in this crate produces.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::RowAccessor;
use parquet::schema::parser::parse_message_type;

use crate::device::Device;
use crate::errors::{IoError, OpenSnafu, ParquetSnafu};
use crate::linalg::SensorId;
use crate::storage::Event;

use super::{Reader, Writer};

const HIT_SCHEMA: &str = "
message hits {
    REQUIRED INT64 frame;
    REQUIRED INT64 timestamp;
    REQUIRED INT32 col;
    REQUIRED INT32 row;
    REQUIRED INT64 hit_timestamp;
    REQUIRED INT64 value;
}
";

const TRACK_SCHEMA: &str = "
message tracks {
    REQUIRED INT64 frame;
    REQUIRED INT64 timestamp;
    REQUIRED DOUBLE col;
    REQUIRED DOUBLE row;
    REQUIRED DOUBLE ts;
    REQUIRED DOUBLE value;
    REQUIRED DOUBLE local_u;
    REQUIRED DOUBLE local_v;
    REQUIRED DOUBLE local_w;
    REQUIRED DOUBLE local_s;
    REQUIRED INT64 track_id;
    REQUIRED DOUBLE track_chi2;
    REQUIRED INT64 track_dof;
}
";

/// Sentinel `track_id` written for clusters that were never matched to a
/// track, mirroring the crate-wide convention of marking a failed
/// association with an out-of-band value instead of an `Option` column.
const NO_TRACK: i64 = -1;

#[derive(Debug, Clone, Copy)]
struct HitRow {
    frame: i64,
    timestamp: i64,
    col: i32,
    row: i32,
    hit_timestamp: i64,
    value: i64,
}

/// Reads the hits for exactly one sensor from a single Parquet file.
/// `num_sensors()` is always 1; combine several with [`super::Merger`] to
/// build a whole-device [`Reader`].
pub struct ParquetSensorReader {
    name: String,
    rows: Vec<HitRow>,
    /// Index of the first row of the next unread frame group.
    cursor: usize,
    num_events: Option<u64>,
}

impl ParquetSensorReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let file = File::open(path).map_err(|source| {
            OpenSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })?;

        let reader = SerializedFileReader::new(file).map_err(|source| {
            ParquetSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })?;

        let num_events = reader
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kvs| kvs.iter().find(|kv| kv.key == "Num events"))
            .and_then(|kv| kv.value.as_ref())
            .and_then(|v| v.parse::<u64>().ok());

        let mut rows = Vec::new();
        for row in reader.get_row_iter(None).map_err(|source| {
            ParquetSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })? {
            let row = row.map_err(|source| {
                ParquetSnafu {
                    path: path_str.clone(),
                    source,
                }
                .build()
            })?;
            rows.push(HitRow {
                frame: row.get_long(0).map_err(|source| corrupt(&path_str, source))?,
                timestamp: row.get_long(1).map_err(|source| corrupt(&path_str, source))?,
                col: row.get_int(2).map_err(|source| corrupt(&path_str, source))?,
                row: row.get_int(3).map_err(|source| corrupt(&path_str, source))?,
                hit_timestamp: row.get_long(4).map_err(|source| corrupt(&path_str, source))?,
                value: row.get_long(5).map_err(|source| corrupt(&path_str, source))?,
            });
        }

        Ok(ParquetSensorReader {
            name: path_str,
            rows,
            cursor: 0,
            num_events,
        })
    }

    /// End index (exclusive) of the frame group starting at `self.cursor`.
    fn current_group_end(&self) -> usize {
        if self.cursor >= self.rows.len() {
            return self.cursor;
        }
        let frame = self.rows[self.cursor].frame;
        let mut end = self.cursor;
        while end < self.rows.len() && self.rows[end].frame == frame {
            end += 1;
        }
        end
    }
}

fn corrupt(path: &str, source: parquet::errors::ParquetError) -> IoError {
    IoError::Corrupt {
        path: path.to_string(),
        detail: source.to_string(),
    }
}

impl Reader for ParquetSensorReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_events(&self) -> Option<u64> {
        self.num_events
    }

    fn num_sensors(&self) -> usize {
        1
    }

    fn skip(&mut self, n: u64) -> Result<(), IoError> {
        for _ in 0..n {
            if self.cursor >= self.rows.len() {
                break;
            }
            self.cursor = self.current_group_end();
        }
        Ok(())
    }

    fn read(&mut self, event: &mut Event) -> Result<bool, IoError> {
        if self.cursor >= self.rows.len() {
            return Ok(false);
        }
        let end = self.current_group_end();
        let group = &self.rows[self.cursor..end];

        event.frame = group[0].frame as u64;
        event.timestamp = group[0].timestamp as u64;
        let sensor_event = event.sensor_mut(0);
        for row in group {
            sensor_event.add_hit(crate::storage::Hit::new(
                row.col,
                row.row,
                row.hit_timestamp,
                row.value,
            ));
        }

        self.cursor = end;
        Ok(true)
    }
}

/// Persists matched clusters (with their resolved track, if any) for one
/// sensor, buffering rows in memory and flushing them as a Parquet row
/// group every [`Self::flush_every`] events.
pub struct ParquetSensorWriter {
    path_str: String,
    sensor_id: SensorId,
    writer: SerializedFileWriter<File>,
    buffer: Vec<(i64, i64, f64, f64, f64, f64, f64, f64, f64, f64, i64, f64, i64)>,
    events_since_flush: usize,
    flush_every: usize,
}

impl ParquetSensorWriter {
    pub fn create(
        path: impl AsRef<Path>,
        device: &Device,
        sensor_id: SensorId,
    ) -> Result<Self, IoError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let file = File::create(path).map_err(|source| {
            OpenSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })?;

        let schema = Arc::new(parse_message_type(TRACK_SCHEMA).map_err(|source| {
            ParquetSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })?);

        let mut metadata = HashMap::new();
        metadata.insert("Sensor name".to_string(), device.sensor(sensor_id).name.clone());
        let props = super::watermark::pq_writer(Some(metadata))
            .unwrap_or_else(|| WriterProperties::builder().build());

        let writer = SerializedFileWriter::new(file, schema, Arc::new(props)).map_err(|source| {
            ParquetSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })?;

        Ok(ParquetSensorWriter {
            path_str,
            sensor_id,
            writer,
            buffer: Vec::new(),
            events_since_flush: 0,
            flush_every: 4096,
        })
    }

    pub fn append_sensor_event(&mut self, event: &Event, sensor_id: SensorId) -> Result<(), IoError> {
        for cluster in &event.sensor(sensor_id).clusters {
            let (track_id, chi2, dof) = match cluster.track {
                Some(idx) => (idx as i64, event.tracks[idx].chi2, event.tracks[idx].dof as i64),
                None => (NO_TRACK, f64::NAN, 0),
            };
            self.buffer.push((
                event.frame as i64,
                event.timestamp as i64,
                cluster.col,
                cluster.row,
                cluster.timestamp,
                cluster.value,
                cluster.local.x,
                cluster.local.y,
                cluster.local.z,
                cluster.local.w,
                track_id,
                chi2,
                dof,
            ));
        }
        self.events_since_flush += 1;
        if self.events_since_flush >= self.flush_every {
            self.flush_row_group()?;
        }
        Ok(())
    }

    fn flush_row_group(&mut self) -> Result<(), IoError> {
        self.events_since_flush = 0;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let frame: Vec<i64> = self.buffer.iter().map(|r| r.0).collect();
        let timestamp: Vec<i64> = self.buffer.iter().map(|r| r.1).collect();
        let col: Vec<f64> = self.buffer.iter().map(|r| r.2).collect();
        let row: Vec<f64> = self.buffer.iter().map(|r| r.3).collect();
        let ts: Vec<f64> = self.buffer.iter().map(|r| r.4).collect();
        let value: Vec<f64> = self.buffer.iter().map(|r| r.5).collect();
        let local_u: Vec<f64> = self.buffer.iter().map(|r| r.6).collect();
        let local_v: Vec<f64> = self.buffer.iter().map(|r| r.7).collect();
        let local_w: Vec<f64> = self.buffer.iter().map(|r| r.8).collect();
        let local_s: Vec<f64> = self.buffer.iter().map(|r| r.9).collect();
        let track_id: Vec<i64> = self.buffer.iter().map(|r| r.10).collect();
        let track_chi2: Vec<f64> = self.buffer.iter().map(|r| r.11).collect();
        let track_dof: Vec<i64> = self.buffer.iter().map(|r| r.12).collect();
        self.buffer.clear();

        let int_columns: [&[i64]; 3] = [&frame, &timestamp, &track_id];
        let double_columns: [&[f64]; 9] = [
            &col, &row, &ts, &value, &local_u, &local_v, &local_w, &local_s, &track_chi2,
        ];
        let dof_column = &track_dof;

        let mut row_group_writer = self.writer.next_row_group().map_err(|source| {
            ParquetSnafu {
                path: self.path_str.clone(),
                source,
            }
            .build()
        })?;

        let mut int_idx = 0;
        let mut double_idx = 0;
        let mut column_idx = 0;
        while let Some(mut col_writer) = row_group_writer.next_column().map_err(|source| {
            ParquetSnafu {
                path: self.path_str.clone(),
                source,
            }
            .build()
        })? {
            // column order follows TRACK_SCHEMA: frame, timestamp, col, row,
            // ts, value, local_u..s, track_id, track_chi2, track_dof.
            match column_idx {
                0 | 1 => {
                    write_i64_column(&mut col_writer, int_columns[int_idx])?;
                    int_idx += 1;
                }
                2..=9 => {
                    write_f64_column(&mut col_writer, double_columns[double_idx])?;
                    double_idx += 1;
                }
                10 => {
                    write_i64_column(&mut col_writer, int_columns[int_idx])?;
                    int_idx += 1;
                }
                11 => {
                    write_f64_column(&mut col_writer, double_columns[double_idx])?;
                    double_idx += 1;
                }
                12 => {
                    write_i64_column(&mut col_writer, dof_column)?;
                }
                _ => unreachable!("schema has 13 columns"),
            }
            col_writer.close().map_err(|source| {
                ParquetSnafu {
                    path: self.path_str.clone(),
                    source,
                }
                .build()
            })?;
            column_idx += 1;
        }

        row_group_writer.close().map_err(|source| {
            ParquetSnafu {
                path: self.path_str.clone(),
                source,
            }
            .build()
        })?;
        Ok(())
    }
}

fn write_i64_column(col_writer: &mut ColumnWriter, data: &[i64]) -> Result<(), IoError> {
    match col_writer {
        ColumnWriter::Int64ColumnWriter(typed) => typed
            .write_batch(data, None, None)
            .map(|_| ())
            .map_err(|source| {
                ParquetSnafu {
                    path: "<row group>".to_string(),
                    source,
                }
                .build()
            }),
        _ => Err(IoError::Corrupt {
            path: "<row group>".to_string(),
            detail: "unexpected column physical type, expected INT64".to_string(),
        }),
    }
}

fn write_f64_column(col_writer: &mut ColumnWriter, data: &[f64]) -> Result<(), IoError> {
    match col_writer {
        ColumnWriter::DoubleColumnWriter(typed) => typed
            .write_batch(data, None, None)
            .map(|_| ())
            .map_err(|source| {
                ParquetSnafu {
                    path: "<row group>".to_string(),
                    source,
                }
                .build()
            }),
        _ => Err(IoError::Corrupt {
            path: "<row group>".to_string(),
            detail: "unexpected column physical type, expected DOUBLE".to_string(),
        }),
    }
}

impl Writer for ParquetSensorWriter {
    fn append(&mut self, event: &Event) -> Result<(), IoError> {
        let sensor_id = self.sensor_id;
        self.append_sensor_event(event, sensor_id)
    }

    fn finish(&mut self) -> Result<(), IoError> {
        self.flush_row_group()?;
        self.writer.close().map_err(|source| {
            ParquetSnafu {
                path: self.path_str.clone(),
                source,
            }
            .build()
        })?;
        Ok(())
    }
}

impl Drop for ParquetSensorWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let _ = self.flush_row_group();
        }
    }
}

/// Write a raw per-sensor hit table, as consumed by [`ParquetSensorReader`].
/// Exposed for test fixtures and offline format converters.
pub fn write_hit_table(
    path: impl AsRef<Path>,
    device: &Device,
    sensor_id: SensorId,
    rows: &[(u64, u64, i32, i32, i64, i64)],
) -> Result<(), IoError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let file = File::create(path).map_err(|source| {
        OpenSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })?;

    let schema = Arc::new(parse_message_type(HIT_SCHEMA).map_err(|source| {
        ParquetSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })?);

    let mut metadata = HashMap::new();
    metadata.insert("Sensor name".to_string(), device.sensor(sensor_id).name.clone());
    metadata.insert(
        "Num events".to_string(),
        rows.iter()
            .map(|r| r.0)
            .collect::<std::collections::BTreeSet<_>>()
            .len()
            .to_string(),
    );
    let props = super::watermark::pq_writer(Some(metadata))
        .unwrap_or_else(|| WriterProperties::builder().build());

    let mut writer = SerializedFileWriter::new(file, schema, Arc::new(props)).map_err(|source| {
        ParquetSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })?;

    let mut row_group_writer = writer.next_row_group().map_err(|source| {
        ParquetSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })?;

    let frame: Vec<i64> = rows.iter().map(|r| r.0 as i64).collect();
    let timestamp: Vec<i64> = rows.iter().map(|r| r.1 as i64).collect();
    let col: Vec<i32> = rows.iter().map(|r| r.2).collect();
    let row_v: Vec<i32> = rows.iter().map(|r| r.3).collect();
    let hit_timestamp: Vec<i64> = rows.iter().map(|r| r.4).collect();
    let value: Vec<i64> = rows.iter().map(|r| r.5).collect();

    let mut column_idx = 0;
    while let Some(mut col_writer) = row_group_writer.next_column().map_err(|source| {
        ParquetSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })? {
        match column_idx {
            0 => write_i64_column(&mut col_writer, &frame)?,
            1 => write_i64_column(&mut col_writer, &timestamp)?,
            2 => match &mut col_writer {
                ColumnWriter::Int32ColumnWriter(typed) => {
                    typed.write_batch(&col, None, None).map_err(|source| {
                        ParquetSnafu {
                            path: path_str.clone(),
                            source,
                        }
                        .build()
                    })?;
                }
                _ => {
                    return Err(IoError::Corrupt {
                        path: path_str.clone(),
                        detail: "expected INT32 column".to_string(),
                    })
                }
            },
            3 => match &mut col_writer {
                ColumnWriter::Int32ColumnWriter(typed) => {
                    typed.write_batch(&row_v, None, None).map_err(|source| {
                        ParquetSnafu {
                            path: path_str.clone(),
                            source,
                        }
                        .build()
                    })?;
                }
                _ => {
                    return Err(IoError::Corrupt {
                        path: path_str.clone(),
                        detail: "expected INT32 column".to_string(),
                    })
                }
            },
            4 => write_i64_column(&mut col_writer, &hit_timestamp)?,
            5 => write_i64_column(&mut col_writer, &value)?,
            _ => unreachable!("hit schema has 6 columns"),
        }
        col_writer.close().map_err(|source| {
            ParquetSnafu {
                path: path_str.clone(),
                source,
            }
            .build()
        })?;
        column_idx += 1;
    }
    row_group_writer.close().map_err(|source| {
        ParquetSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })?;
    writer.close().map_err(|source| {
        ParquetSnafu {
            path: path_str.clone(),
            source,
        }
        .build()
    })?;
    Ok(())
}
