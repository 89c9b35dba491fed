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

//! `pt-recon`: clusterize, apply geometry, find and fit tracks over one
//! input event stream, writing matched clusters/tracks per sensor to
//! `OUTPUT_PREFIX`.

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use telescope_align::cli::{self, Args};
use telescope_align::device::{Device, PixelMask};
use telescope_align::errors::Result;
use telescope_align::geometry::{Geometry, Plane};
use telescope_align::io::config::{self, ReconOptions};
use telescope_align::io::{self, Reader, Writer};
use telescope_align::processors::{self, TrackFinder};
use telescope_align::storage::Event;

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging(args.quiet, args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("pt-recon: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut device = load_device(args)?;
    device.set_geometry(load_geometry(args, &device)?);
    device.apply_pixel_masks(&load_masks(args)?);
    info!("{device}");

    let recon = load_recon_options(args)?;
    let finder = TrackFinder::new(
        device.sensor_ids().to_vec(),
        recon.num_points_min,
        recon.search_spatial_sigma_max,
    )?;

    let mut reader = io::open_sensor_directory(&args.input, &device)?;
    reader.skip(args.skip)?;
    let mut writers = io::create_sensor_writers(&args.output_prefix, &device)?;

    let len = args
        .num_events
        .or_else(|| reader.num_events().map(|n| n.saturating_sub(args.skip)));
    let bar = cli::progress_bar(len, args.no_progress);

    let mut processed: u64 = 0;
    let mut tracks_written: u64 = 0;
    let mut event = Event::new(0, 0, device.num_sensors());
    loop {
        if args.num_events.is_some_and(|limit| processed >= limit) {
            break;
        }
        if !reader.read(&mut event)? {
            break;
        }

        for &sensor_id in device.sensor_ids() {
            let sensor = device.sensor(sensor_id);
            let kind = processors::default_kind_for(sensor.measurement);
            processors::clusterize(
                kind,
                sensor_id,
                sensor,
                device.pixel_masks(),
                event.sensor_mut(sensor_id),
            );
        }
        processors::apply_geometry(&device, &mut event);
        finder.process(&device, &mut event)?;
        if recon.reduced_chi2_max >= 0.0 {
            let max = recon.reduced_chi2_max;
            event.retain_tracks(|t| t.reduced_chi2() <= max);
        }
        processors::populate_local_states(&device, &mut event);

        if args.print_events {
            println!(
                "frame {}: {} track(s)",
                event.frame,
                event.tracks.len()
            );
        }

        for writer in &mut writers {
            writer.append(&event)?;
        }

        tracks_written += event.tracks.len() as u64;
        processed += 1;
        bar.inc(1);
        event = Event::new(0, 0, device.num_sensors());
    }

    for writer in &mut writers {
        writer.finish()?;
    }
    bar.finish_and_clear();

    info!("pt-recon: processed {processed} event(s), wrote {tracks_written} track(s)");
    Ok(())
}

fn load_device(args: &Args) -> Result<Device> {
    let doc = cli::read_config_file(&args.device)?;
    Ok(config::load_device(&doc)?)
}

/// Load the `-g` geometry override, falling back to an identity plane per
/// sensor (with a warning) when none is given: this loader does not parse
/// an embedded geometry section out of the device document itself.
fn load_geometry(args: &Args, device: &Device) -> Result<Geometry> {
    match &args.geometry {
        Some(path) => {
            let doc = cli::read_config_file(path)?;
            Ok(config::load_geometry(&doc)?)
        }
        None => {
            log::warn!("no geometry supplied; using an identity plane per sensor");
            let mut geo = Geometry::new();
            for &sensor_id in device.sensor_ids() {
                geo.insert_plane(sensor_id, Plane::identity());
            }
            Ok(geo)
        }
    }
}

fn load_masks(args: &Args) -> Result<PixelMask> {
    let mut masks = PixelMask::new();
    for path in &args.mask {
        let doc = cli::read_config_file(path)?;
        masks.merge(&config::load_mask(&doc)?);
    }
    Ok(masks)
}

fn load_recon_options(args: &Args) -> Result<ReconOptions> {
    match &args.config {
        Some(path) => {
            let doc = cli::read_config_file(path)?;
            let analysis = config::load_analysis(&doc)?;
            Ok(analysis.recon_section(&args.section)?.clone())
        }
        None => Ok(ReconOptions::default()),
    }
}
