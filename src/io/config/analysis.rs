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

//! TOML analysis configuration: per-tool option sets, organised into named
//! sub-sections so one file can carry several passes (selected on the CLI
//! with `-u SECTION`, defaulting to `"default"`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::linalg::SensorId;

pub const DEFAULT_SECTION: &str = "default";

fn default_search_sigma_max() -> f64 {
    5.0
}
fn default_reduced_chi2_max() -> f64 {
    -1.0
}
fn default_damping() -> f64 {
    0.9
}
fn default_num_steps() -> usize {
    1
}
fn default_density_bandwidth() -> f64 {
    2.0
}
fn default_sigma_above_avg_max() -> f64 {
    5.0
}
fn default_rate_max() -> f64 {
    1.0
}
fn default_num_points_min() -> usize {
    3
}
fn default_track_fitter() -> String {
    "straight3d".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlignMethod {
    #[serde(rename = "correlations")]
    Correlations,
    #[serde(rename = "residuals")]
    Residuals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignOptions {
    #[serde(default = "default_num_steps")]
    pub num_steps: usize,
    pub method: AlignMethod,
    #[serde(default = "default_search_sigma_max")]
    pub search_sigma_max: f64,
    #[serde(default = "default_reduced_chi2_max")]
    pub reduced_chi2_max: f64,
    #[serde(default = "default_damping")]
    pub damping: f64,
    pub sensor_ids: Vec<SensorId>,
    pub align_ids: Vec<SensorId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseScanOptions {
    #[serde(default = "default_density_bandwidth")]
    pub density_bandwidth: f64,
    #[serde(default = "default_sigma_above_avg_max")]
    pub sigma_above_avg_max: f64,
    #[serde(default = "default_rate_max")]
    pub rate_max: f64,
    pub col_min: Option<i32>,
    /// Inclusive on disk.
    pub col_max: Option<i32>,
    pub row_min: Option<i32>,
    /// Inclusive on disk.
    pub row_max: Option<i32>,
}

impl Default for NoiseScanOptions {
    fn default() -> Self {
        NoiseScanOptions {
            density_bandwidth: default_density_bandwidth(),
            sigma_above_avg_max: default_sigma_above_avg_max(),
            rate_max: default_rate_max(),
            col_min: None,
            col_max: None,
            row_min: None,
            row_max: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconOptions {
    #[serde(default = "default_search_sigma_max")]
    pub search_spatial_sigma_max: f64,
    #[serde(default = "default_reduced_chi2_max")]
    pub search_temporal_sigma_max: f64,
    #[serde(default = "default_num_points_min")]
    pub num_points_min: usize,
    #[serde(default = "default_reduced_chi2_max")]
    pub reduced_chi2_max: f64,
    #[serde(default = "default_track_fitter")]
    pub track_fitter: String,
}

impl Default for ReconOptions {
    fn default() -> Self {
        ReconOptions {
            search_spatial_sigma_max: default_search_sigma_max(),
            search_temporal_sigma_max: default_reduced_chi2_max(),
            num_points_min: default_num_points_min(),
            reduced_chi2_max: default_reduced_chi2_max(),
            track_fitter: default_track_fitter(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub align: BTreeMap<String, AlignOptions>,
    #[serde(default)]
    pub noisescan: BTreeMap<String, NoiseScanOptions>,
    #[serde(default)]
    pub recon: BTreeMap<String, ReconOptions>,
}

pub fn load_analysis(document: &str) -> Result<AnalysisConfig, ConfigError> {
    toml::from_str(document).map_err(|source| ConfigError::Toml { source })
}

impl AnalysisConfig {
    pub fn align_section(&self, name: &str) -> Result<&AlignOptions, ConfigError> {
        self.align.get(name).ok_or_else(|| ConfigError::MissingKey {
            document: "analysis config".to_string(),
            key: format!("align.{name}"),
        })
    }

    pub fn noisescan_section(&self, name: &str) -> Result<&NoiseScanOptions, ConfigError> {
        self.noisescan
            .get(name)
            .ok_or_else(|| ConfigError::MissingKey {
                document: "analysis config".to_string(),
                key: format!("noisescan.{name}"),
            })
    }

    pub fn recon_section(&self, name: &str) -> Result<&ReconOptions, ConfigError> {
        self.recon.get(name).ok_or_else(|| ConfigError::MissingKey {
            document: "analysis config".to_string(),
            key: format!("recon.{name}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[align.default]
method = "residuals"
sensor_ids = [0, 1, 2, 3]
align_ids = [1, 2]

[noisescan.default]
rate_max = 0.5

[recon.default]
num_points_min = 4
"#;

    #[test]
    fn applies_documented_defaults() {
        let cfg = load_analysis(SAMPLE).unwrap();
        let align = cfg.align_section("default").unwrap();
        assert_eq!(align.num_steps, 1);
        assert_eq!(align.search_sigma_max, 5.0);
        assert_eq!(align.damping, 0.9);

        let recon = cfg.recon_section("default").unwrap();
        assert_eq!(recon.num_points_min, 4);
        assert_eq!(recon.track_fitter, "straight3d");

        let noise = cfg.noisescan_section("default").unwrap();
        assert_eq!(noise.rate_max, 0.5);
        assert_eq!(noise.sigma_above_avg_max, 5.0);
    }

    #[test]
    fn missing_section_is_an_error() {
        let cfg = load_analysis(SAMPLE).unwrap();
        assert!(cfg.align_section("nope").is_err());
    }
}
