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

//! `pt-align`: iteratively reconstruct and align a telescope, writing the
//! final geometry and the per-step parameter trajectory to
//! `OUTPUT_PREFIX`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use telescope_align::align::{self, CorrelationAligner, ResidualsAligner, TrajectoryPoint};
use telescope_align::cli::{self, Args};
use telescope_align::device::{Device, PixelMask};
use telescope_align::errors::{InvariantError, Result};
use telescope_align::geometry::{Geometry, Plane};
use telescope_align::io::config::{self, AlignMethod, AlignOptions};
use telescope_align::io::{Merger, ParquetSensorReader, Reader};
use telescope_align::linalg::SensorId;
use telescope_align::processors::{self, TrackFinder};
use telescope_align::storage::Event;

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging(args.quiet, args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("pt-align: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut device = load_device(args)?;
    device.set_geometry(load_geometry(args, &device)?);
    device.apply_pixel_masks(&load_masks(args)?);
    info!("{device}");

    let align_opts = load_align_options(args)?;
    let fixed_ids: Vec<SensorId> = align_opts
        .sensor_ids
        .iter()
        .copied()
        .filter(|id| !align_opts.align_ids.contains(id))
        .collect();

    let trajectory = match align_opts.method {
        AlignMethod::Correlations => run_correlations(args, &mut device, &align_opts, &fixed_ids)?,
        AlignMethod::Residuals => run_residuals(args, &mut device, &align_opts)?,
    };

    write_outputs(args, &device, &trajectory)?;
    info!(
        "pt-align: {} step(s) complete over {} alignable sensor(s)",
        align_opts.num_steps,
        align_opts.align_ids.len()
    );
    Ok(())
}

fn run_correlations(
    args: &Args,
    device: &mut Device,
    align_opts: &AlignOptions,
    fixed_ids: &[SensorId],
) -> Result<Vec<TrajectoryPoint>> {
    // validate the subset/fixed-set invariants once, up front: they do not
    // change step to step, only the geometry the aligner reads does.
    CorrelationAligner::new(device, fixed_ids, align_opts.align_ids.clone())?;

    let align_ids = align_opts.align_ids.clone();
    let fixed_ids = fixed_ids.to_vec();
    let mut read_events = event_reader(args, device);

    Ok(align::run_iterations(
        device,
        align_opts.num_steps,
        |dev| {
            CorrelationAligner::new(dev, &fixed_ids, align_ids.clone())
                .expect("subset/fixed-set validated up front")
        },
        || read_events(),
        |dev, event| reconstruct_without_tracks(dev, event),
    )?)
}

fn run_residuals(
    args: &Args,
    device: &mut Device,
    align_opts: &AlignOptions,
) -> Result<Vec<TrajectoryPoint>> {
    if align_opts.align_ids.iter().any(|id| !align_opts.sensor_ids.contains(id)) {
        return Err(InvariantError::AlignSetNotSubset.into());
    }

    let recon_defaults = config::ReconOptions::default();
    let finder = TrackFinder::new(
        align_opts.sensor_ids.clone(),
        recon_defaults.num_points_min,
        align_opts.search_sigma_max,
    )?;
    let reduced_chi2_max = align_opts.reduced_chi2_max;

    let align_ids = align_opts.align_ids.clone();
    let damping = align_opts.damping;
    let mut read_events = event_reader(args, device);

    Ok(align::run_iterations(
        device,
        align_opts.num_steps,
        |_dev| ResidualsAligner::new(align_ids.clone(), damping),
        || read_events(),
        move |dev, event| {
            reconstruct_without_tracks(dev, event);
            finder
                .process(dev, event)
                .expect("track selection invariant holds for a validated sensor set");
            if reduced_chi2_max >= 0.0 {
                event.retain_tracks(|t| t.reduced_chi2() <= reduced_chi2_max);
            }
        },
    )?)
}

/// Clusterize and apply the current geometry, without finding tracks --
/// all the correlation aligner needs, and the common prefix the residuals
/// aligner builds on before running the track finder.
fn reconstruct_without_tracks(device: &Device, event: &mut Event) {
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
    processors::apply_geometry(device, event);
}

/// Build a closure that re-opens the input directory and reads the
/// `[skip, skip+count)` event window fresh every time it is called: the
/// iteration driver needs a new event-loop each step, since the geometry
/// it reconstructs against has just changed.
fn event_reader(args: &Args, device: &Device) -> impl FnMut() -> Vec<Event> {
    let sensor_ids = device.sensor_ids().to_vec();
    let input_dir = args.input.clone();
    let skip = args.skip;
    let limit = args.num_events;

    move || {
        let mut readers: Vec<Box<dyn Reader>> = Vec::with_capacity(sensor_ids.len());
        for &sensor_id in &sensor_ids {
            let path: PathBuf = input_dir.join(format!("sensor_{sensor_id}.parquet"));
            readers.push(Box::new(
                ParquetSensorReader::open(&path).expect("reopening input between alignment steps"),
            ));
        }
        let mut merger = Merger::new(readers);
        merger.skip(skip).expect("skip between alignment steps");

        let mut events = Vec::new();
        let mut event = Event::new(0, 0, merger.num_sensors());
        loop {
            if limit.is_some_and(|limit| (events.len() as u64) >= limit) {
                break;
            }
            if !merger.read(&mut event).expect("reading between alignment steps") {
                break;
            }
            events.push(event.clone());
            event = Event::new(0, 0, merger.num_sensors());
        }
        events
    }
}

fn write_outputs(args: &Args, device: &Device, trajectory: &[TrajectoryPoint]) -> Result<()> {
    let final_geometry = &trajectory.last().expect("step 0 is always present").geometry;
    let geometry_doc = config::save_geometry(final_geometry)?;
    std::fs::write(with_suffix(&args.output_prefix, "_geometry.toml"), geometry_doc)
        .map_err(|source| telescope_align::errors::IoError::Write {
            path: args.output_prefix.display().to_string(),
            source,
        })?;

    let mut trajectory_doc = String::new();
    for point in trajectory {
        trajectory_doc.push_str(&format!("# step {}\n", point.step));
        for &sensor_id in device.sensor_ids() {
            if let Ok(params) = point.geometry.params(sensor_id) {
                trajectory_doc.push_str(&format!(
                    "{sensor_id}\t{:.8}\t{:.8}\t{:.8}\t{:.8}\t{:.8}\t{:.8}\n",
                    params[0], params[1], params[2], params[3], params[4], params[5]
                ));
            }
        }
    }
    std::fs::write(with_suffix(&args.output_prefix, "_trajectory.tsv"), trajectory_doc).map_err(
        |source| telescope_align::errors::IoError::Write {
            path: args.output_prefix.display().to_string(),
            source,
        },
    )?;

    Ok(())
}

fn with_suffix(prefix: &std::path::Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn load_device(args: &Args) -> Result<Device> {
    let doc = cli::read_config_file(&args.device)?;
    Ok(config::load_device(&doc)?)
}

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

fn load_align_options(args: &Args) -> Result<AlignOptions> {
    let path = args
        .config
        .as_ref()
        .ok_or_else(|| telescope_align::errors::ConfigError::MissingKey {
            document: "analysis config".to_string(),
            key: "-c PATH (align options)".to_string(),
        })?;
    let doc = cli::read_config_file(path)?;
    let analysis = config::load_analysis(&doc)?;
    Ok(analysis.align_section(&args.section)?.clone())
}
