use crate::config::BoundaryPolicy;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Seconds in one forecast hour; wind speed (m/s) times this is meters per hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// A release point in geographic coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub lon: f64,
    pub lat: f64,
}

impl Origin {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Validated run parameters derived from the configuration, immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    pub origins: Vec<Origin>,
    /// Nominal start (forward) or end (backward) of the horizon.
    pub start: NaiveDateTime,
    pub nforecast: u32,
    pub nsim: u32,
    pub cellsize_m: f64,

    // Directional sampler
    pub jitter_degrees: f64,
    pub center_weight: f64,
    pub neighbor_weight: f64,
    pub boundary: BoundaryPolicy,

    pub backwards: bool,
    pub full_output: bool,
    pub parallel: bool,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
}

impl RunParams {
    /// Number of (origin, repetition) work units.
    pub fn unit_count(&self) -> u64 {
        self.origins.len() as u64 * self.nsim as u64
    }
}
