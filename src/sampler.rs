use crate::grid::for_each_window_cell;
use crate::kinematics::WindField;
use dispersal_common::{normalize_bearing, DispersalError, DispersalResult, RunParams};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Uniform;
use rand::prelude::*;

/// Draws the bearing for one single-cell transition from the wind around the particle.
///
/// Each in-bounds cell of the 3x3 window is weighted by its template weight
/// times its wind speed. The drawn cell contributes its *bearing*, which is
/// then perturbed by a uniform jitter.
///
/// When every weight is zero (calm air all around) the cell is drawn
/// uniformly among the in-bounds window cells instead.
#[derive(Clone, Debug)]
pub struct DirectionalSampler {
    center_weight: f64,
    neighbor_weight: f64,
    jitter: Option<Uniform<f64>>,
}

impl DirectionalSampler {
    pub fn new(center_weight: f64, neighbor_weight: f64, jitter_degrees: f64) -> DispersalResult<Self> {
        let jitter = if jitter_degrees > 0.0 {
            Some(
                Uniform::new_inclusive(-jitter_degrees, jitter_degrees)
                    .map_err(|e| DispersalError::config(format!("invalid jitter bound {}: {}", jitter_degrees, e)))?,
            )
        } else {
            None
        };
        Ok(Self { center_weight, neighbor_weight, jitter })
    }

    pub fn from_params(params: &RunParams) -> DispersalResult<Self> {
        Self::new(params.center_weight, params.neighbor_weight, params.jitter_degrees)
    }

    pub fn sample_bearing<R: Rng + ?Sized>(&self, x: usize, y: usize, field: &WindField, rng: &mut R) -> f64 {
        // At most nine candidates; fixed buffers keep the hot loop allocation-light.
        let mut bearings = [0.0f64; 9];
        let mut weights = [0.0f64; 9];
        let mut n = 0;
        for_each_window_cell(x, y, field.width(), field.height(), |nx, ny, is_center| {
            let template = if is_center { self.center_weight } else { self.neighbor_weight };
            let speed = field.speed.get(nx, ny);
            weights[n] = if speed.is_finite() { template * speed } else { 0.0 };
            bearings[n] = field.bearing.get(nx, ny);
            n += 1;
        });

        let pick = match WeightedIndex::new(&weights[..n]) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.random_range(0..n),
        };

        match &self.jitter {
            Some(jitter) => normalize_bearing(bearings[pick] + jitter.sample(rng)),
            None => bearings[pick],
        }
    }
}
