use crate::error::{DispersalError, DispersalResult};
use crate::sim_params::{Origin, RunParams};
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MAX_WORKERS: usize = 1024;

// Timeline of the run
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub start_date: NaiveDate,
    pub start_hour: u32,
    pub nforecast: u32,
    pub nsim: u32,
    #[serde(default)]
    pub backwards: bool,
    /// Base seed for the per-repetition random streams. Drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    /// Real-world size of one grid cell in meters.
    pub cellsize_m: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindSource {
    Forecast,
    Historical,
    Uniform,
}

// Synthetic constant wind over an explicit grid
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UniformWindConfig {
    pub u: f64,
    pub v: f64,
    pub width: usize,
    pub height: usize,
    pub origin_lon: f64,
    pub origin_lat: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WindConfig {
    pub source: WindSource,
    /// Archive directory for the forecast and historical sources.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub uniform: Option<UniformWindConfig>,
}

fn default_level() -> String {
    "10m".to_string()
}

/// What happens when a step would carry the particle off the grid.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// The particle leaves the domain and its repetition ends.
    #[default]
    Absorb,
    /// The particle is held on the edge cell.
    Clamp,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SamplerConfig {
    #[serde(default = "default_jitter")]
    pub jitter_degrees: f64,
    #[serde(default = "default_center_weight")]
    pub center_weight: f64,
    #[serde(default = "default_neighbor_weight")]
    pub neighbor_weight: f64,
    #[serde(default)]
    pub boundary: BoundaryPolicy,
}

fn default_jitter() -> f64 {
    30.0
}

fn default_center_weight() -> f64 {
    3.0
}

fn default_neighbor_weight() -> f64 {
    1.0
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            jitter_degrees: default_jitter(),
            center_weight: default_center_weight(),
            neighbor_weight: default_neighbor_weight(),
            boundary: BoundaryPolicy::Absorb,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_progress() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig { parallel: false, workers: None, progress: true }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    /// Density grid format: "json", "bincode", "messagepack" or "csv".
    pub format: Option<String>,
    /// Also write every simulated transition as a trajectory table.
    #[serde(default)]
    pub full_output: bool,
    #[serde(default = "default_nodata")]
    pub nodata: f64,
}

fn default_nodata() -> f64 {
    -9999.0
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    /// `[lon, lat]` pairs where particles are released.
    pub origins: Vec<[f64; 2]>,
    pub run: RunConfig,
    pub grid: GridConfig,
    pub wind: WindConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        match config.wind.source {
            WindSource::Forecast | WindSource::Historical if config.wind.root.is_none() => {
                anyhow::bail!("wind.root is required for the {:?} source.", config.wind.source);
            }
            WindSource::Uniform if config.wind.uniform.is_none() => {
                anyhow::bail!("[wind.uniform] is required for the uniform source.");
            }
            _ => {}
        }

        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Validates the configuration and converts it into run parameters.
    pub fn get_run_params(&self) -> DispersalResult<RunParams> {
        let run = &self.run;
        let sampler = &self.sampler;

        if self.origins.is_empty() {
            return Err(DispersalError::config("at least one origin is required"));
        }
        if let Some(bad) = self.origins.iter().find(|o| !o[0].is_finite() || !o[1].is_finite()) {
            return Err(DispersalError::config(format!("origin {:?} is not a finite coordinate", bad)));
        }
        if run.nsim == 0 {
            return Err(DispersalError::config("nsim must be greater than 0"));
        }
        if run.start_hour > 23 {
            return Err(DispersalError::config(format!("start_hour {} is not in 0..=23", run.start_hour)));
        }
        if !(self.grid.cellsize_m.is_finite() && self.grid.cellsize_m > 0.0) {
            return Err(DispersalError::config("cellsize_m must be positive"));
        }
        if !(0.0..=180.0).contains(&sampler.jitter_degrees) {
            return Err(DispersalError::config("jitter_degrees must lie in [0, 180]"));
        }
        if !(sampler.center_weight >= 0.0 && sampler.neighbor_weight >= 0.0) {
            return Err(DispersalError::config("sampler weights must be non-negative"));
        }
        if sampler.center_weight == 0.0 && sampler.neighbor_weight == 0.0 {
            return Err(DispersalError::config("sampler weights cannot all be zero"));
        }
        // counts are whole numbers >= 1, so the marker must sit below them
        let nodata = self.output.nodata;
        if !(nodata.is_finite() && nodata < 1.0) {
            return Err(DispersalError::config(format!(
                "nodata must be finite and below 1 so it cannot collide with a visit count, got {}",
                nodata
            )));
        }
        if let Some(workers) = self.execution.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(DispersalError::config(format!(
                    "workers must be in 1..={}, got {}",
                    MAX_WORKERS, workers
                )));
            }
        }

        let start = run
            .start_date
            .and_hms_opt(run.start_hour, 0, 0)
            .ok_or_else(|| DispersalError::config("start date/hour is not a valid time"))?;

        Ok(RunParams {
            origins: self.origins.iter().map(|o| Origin::new(o[0], o[1])).collect(),
            start,
            nforecast: run.nforecast,
            nsim: run.nsim,
            cellsize_m: self.grid.cellsize_m,
            jitter_degrees: sampler.jitter_degrees,
            center_weight: sampler.center_weight,
            neighbor_weight: sampler.neighbor_weight,
            boundary: sampler.boundary,
            backwards: run.backwards,
            full_output: self.output.full_output,
            parallel: self.execution.parallel,
            workers: self.execution.workers,
            seed: run.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
origins = [[5.5, 4.5], [2.0, 2.0]]

[run]
start_date = "2024-04-01"
start_hour = 13
nforecast = 24
nsim = 100

[grid]
cellsize_m = 18000.0

[wind]
source = "uniform"

[wind.uniform]
u = 5.0
v = 0.0
width = 10
height = 10
origin_lon = 0.0
origin_lat = 10.0
pixel_width = 1.0
pixel_height = -1.0

[output]
base_filename = "run"
"#;

    fn sample() -> SimulationConfig {
        SimulationConfig::from_toml_str(SAMPLE).unwrap()
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let config = sample();
        assert_eq!(config.sampler.jitter_degrees, 30.0);
        assert_eq!(config.sampler.center_weight, 3.0);
        assert_eq!(config.sampler.neighbor_weight, 1.0);
        assert_eq!(config.sampler.boundary, BoundaryPolicy::Absorb);
        assert!(!config.execution.parallel);
        assert!(config.execution.progress);
        assert_eq!(config.wind.level, "10m");
        assert_eq!(config.output.nodata, -9999.0);
        assert!(!config.run.backwards);
    }

    #[test]
    fn run_params_carry_the_timeline() {
        let params = sample().get_run_params().unwrap();
        assert_eq!(params.origins.len(), 2);
        assert_eq!(params.start.to_string(), "2024-04-01 13:00:00");
        assert_eq!(params.nforecast, 24);
        assert_eq!(params.nsim, 100);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut config = sample();
        config.run.nsim = 0;
        assert!(matches!(config.get_run_params(), Err(DispersalError::Configuration(_))));

        let mut config = sample();
        config.origins.clear();
        assert!(config.get_run_params().is_err());

        let mut config = sample();
        config.grid.cellsize_m = 0.0;
        assert!(config.get_run_params().is_err());

        let mut config = sample();
        config.execution.workers = Some(0);
        assert!(config.get_run_params().is_err());

        let mut config = sample();
        config.execution.workers = Some(MAX_WORKERS + 1);
        assert!(config.get_run_params().is_err());

        let mut config = sample();
        config.run.start_hour = 24;
        assert!(config.get_run_params().is_err());
    }

    #[test]
    fn nodata_must_not_look_like_a_count() {
        for bad in [f64::NAN, f64::INFINITY, 1.0, 42.0] {
            let mut config = sample();
            config.output.nodata = bad;
            assert!(matches!(config.get_run_params(), Err(DispersalError::Configuration(_))), "nodata {}", bad);
        }
        for good in [-9999.0, -1.0, 0.0, 0.5] {
            let mut config = sample();
            config.output.nodata = good;
            assert!(config.get_run_params().is_ok(), "nodata {}", good);
        }
    }

    #[test]
    fn nan_nodata_in_toml_is_rejected() {
        let text = SAMPLE.replace("base_filename = \"run\"", "base_filename = \"run\"\nnodata = nan");
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert!(config.output.nodata.is_nan());
        assert!(config.get_run_params().is_err());
    }

    #[test]
    fn zero_hour_horizon_is_allowed() {
        let mut config = sample();
        config.run.nforecast = 0;
        assert_eq!(config.get_run_params().unwrap().nforecast, 0);
    }
}
