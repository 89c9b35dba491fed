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

//! Shared command-line surface for the three `pt-*` binaries: each tool
//! takes the same device/geometry/mask/analysis configuration flags plus
//! an input stream and an output prefix.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::errors::IoError;

/// `<tool> [options] INPUT OUTPUT_PREFIX`
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Device configuration file.
    #[arg(short = 'd', long = "device")]
    pub device: PathBuf,

    /// Geometry configuration file, overriding any geometry embedded in
    /// the device config.
    #[arg(short = 'g', long = "geometry")]
    pub geometry: Option<PathBuf>,

    /// Extra pixel-mask configuration file; may be given more than once,
    /// each merged into the running mask.
    #[arg(short = 'm', long = "mask")]
    pub mask: Vec<PathBuf>,

    /// Analysis configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Named sub-section of the analysis config to use.
    #[arg(short = 'u', long = "section", default_value = crate::io::config::DEFAULT_SECTION)]
    pub section: String,

    /// Skip this many events before processing starts.
    #[arg(short = 's', long = "skip", default_value_t = 0)]
    pub skip: u64,

    /// Process at most this many events.
    #[arg(short = 'n', long = "num-events")]
    pub num_events: Option<u64>,

    /// Suppress all but warning/error log output.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Emit debug-level log output.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Print a one-line summary of every processed event.
    #[arg(long = "print-events")]
    pub print_events: bool,

    /// Disable the progress bar (e.g. when not attached to a terminal).
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Input event stream path (a directory of per-sensor Parquet files).
    pub input: PathBuf,

    /// Prefix for this tool's output files.
    pub output_prefix: PathBuf,
}

/// Initialise logging from `-q`/`-v`, following the convention that `-q`
/// and `-v` are mutually exclusive severity shifts around the default
/// `info` level.
pub fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    pretty_env_logger::formatted_builder()
        .parse_filters(level)
        .try_init()
        .ok();
}

/// Build a progress bar over `len` events, or a hidden one if
/// `--no-progress` was given.
pub fn progress_bar(len: Option<u64>, disabled: bool) -> indicatif::ProgressBar {
    if disabled {
        return indicatif::ProgressBar::hidden();
    }
    match len {
        Some(len) => indicatif::ProgressBar::new(len).with_style(
            indicatif::ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
        ),
        None => indicatif::ProgressBar::new_spinner(),
    }
}

/// Read a configuration file's raw text, wrapping the filesystem error in
/// the same [`IoError`] every other input path in this crate produces.
pub fn read_config_file(path: &Path) -> Result<String, IoError> {
    std::fs::read_to_string(path).map_err(|source| {
        crate::errors::ReadSnafu {
            path: path.display().to_string(),
            source,
        }
        .build()
    })
}
