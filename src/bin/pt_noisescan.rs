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

//! `pt-noisescan`: estimate each pixel's expected occupancy from a kernel
//! density fit over its neighbourhood and write a combined mask of pixels
//! that depart from it, to `OUTPUT_PREFIX_mask.toml`.

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use telescope_align::cli::{self, Args};
use telescope_align::device::{Device, PixelMask};
use telescope_align::errors::Result;
use telescope_align::io::config::{self, NoiseScanOptions};
use telescope_align::io::{self, Reader};
use telescope_align::linalg::SensorId;
use telescope_align::noise::{NoiseScan, Roi};
use telescope_align::storage::Event;

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging(args.quiet, args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("pt-noisescan: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let device = load_device(args)?;
    info!("{device}");

    let opts = load_noisescan_options(args)?;
    let sensor_ids = device.sensor_ids().to_vec();
    let mut scans: Vec<NoiseScan> = sensor_ids
        .iter()
        .map(|&sensor_id| {
            let sensor = device.sensor(sensor_id);
            NoiseScan::new(
                sensor,
                opts.density_bandwidth,
                opts.sigma_above_avg_max,
                opts.rate_max,
                roi_for(&opts, sensor_id, &device),
                sensor_id,
            )
        })
        .collect();

    let mut reader = io::open_sensor_directory(&args.input, &device)?;
    reader.skip(args.skip)?;

    let len = args
        .num_events
        .or_else(|| reader.num_events().map(|n| n.saturating_sub(args.skip)));
    let bar = cli::progress_bar(len, args.no_progress);

    let mut processed: u64 = 0;
    let mut event = Event::new(0, 0, device.num_sensors());
    loop {
        if args.num_events.is_some_and(|limit| processed >= limit) {
            break;
        }
        if !reader.read(&mut event)? {
            break;
        }
        for scan in &mut scans {
            scan.execute(&event);
        }
        processed += 1;
        bar.inc(1);
        event = Event::new(0, 0, device.num_sensors());
    }
    bar.finish_and_clear();

    let mut mask = PixelMask::new();
    for scan in &mut scans {
        scan.finalize();
        mask.merge(&scan.construct_masks());
    }

    let doc = config::save_mask(&mask, &sensor_ids)?;
    let mut path = args.output_prefix.as_os_str().to_owned();
    path.push("_mask.toml");
    std::fs::write(&path, doc).map_err(|source| telescope_align::errors::IoError::Write {
        path: args.output_prefix.display().to_string(),
        source,
    })?;

    info!(
        "pt-noisescan: scanned {processed} event(s), masked {} pixel(s) across {} sensor(s)",
        mask.num_masked_pixels(),
        sensor_ids.len()
    );
    Ok(())
}

/// Convert the on-disk inclusive `[min, max]` bounds to the half-open `[min,
/// max)` window the scan operates on, defaulting to the full chip on either
/// side left unset.
fn roi_for(opts: &NoiseScanOptions, sensor_id: SensorId, device: &Device) -> Roi {
    let sensor = device.sensor(sensor_id);
    Roi {
        col_min: opts.col_min.unwrap_or(0),
        col_max: opts.col_max.map(|c| c + 1).unwrap_or(sensor.cols),
        row_min: opts.row_min.unwrap_or(0),
        row_max: opts.row_max.map(|r| r + 1).unwrap_or(sensor.rows),
    }
}

fn load_device(args: &Args) -> Result<Device> {
    let doc = cli::read_config_file(&args.device)?;
    Ok(config::load_device(&doc)?)
}

fn load_noisescan_options(args: &Args) -> Result<NoiseScanOptions> {
    match &args.config {
        Some(path) => {
            let doc = cli::read_config_file(path)?;
            let analysis = config::load_analysis(&doc)?;
            Ok(analysis.noisescan_section(&args.section)?.clone())
        }
        None => Ok(NoiseScanOptions::default()),
    }
}
