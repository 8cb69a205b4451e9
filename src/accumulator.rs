use crate::trajectory::Trajectory;
use dispersal_common::{DensityReport, DispersalError, DispersalResult, GeoTransform, Grid, Origin, RunParams, TrajectoryRow};

/// Visit counts (and optionally trajectory rows) gathered from any number of repetitions.
///
/// Accumulators over the same grid merge by cell-wise summation, so partial
/// results from separate origins or workers can be combined in any grouping.
#[derive(Clone, Debug)]
pub struct DensityAccumulator {
    width: usize,
    height: usize,
    transform: GeoTransform,
    counts: Vec<u64>,
    transitions: u64,
    absorbed: u64,
    rows: Option<Vec<TrajectoryRow>>,
}

impl DensityAccumulator {
    /// An empty accumulator shaped like `reference`.
    pub fn new(reference: &Grid, keep_rows: bool) -> Self {
        Self {
            width: reference.width,
            height: reference.height,
            transform: reference.transform,
            counts: vec![0; reference.width * reference.height],
            transitions: 0,
            absorbed: 0,
            rows: if keep_rows { Some(Vec::new()) } else { None },
        }
    }

    /// Adds one repetition started at `origin`.
    pub fn record(&mut self, trajectory: &Trajectory, origin: Origin) {
        for state in &trajectory.states {
            self.counts[state.y * self.width + state.x] += 1;
        }
        self.transitions += trajectory.states.len() as u64; // one visit per executed transition
        if trajectory.absorbed {
            self.absorbed += 1;
        }
        if let Some(rows) = self.rows.as_mut() {
            rows.extend(trajectory.states.iter().map(|state| {
                let (lon, lat) = self.transform.cell_center(state.y, state.x);
                TrajectoryRow {
                    lon,
                    lat,
                    repetition_id: trajectory.repetition,
                    forecast_hour: state.hour_index,
                    origin_lon: origin.lon,
                    origin_lat: origin.lat,
                }
            }));
        }
    }

    /// Cell-wise sum; rows of `self` come before rows of `other`.
    pub fn merge(mut self, other: DensityAccumulator) -> DispersalResult<DensityAccumulator> {
        if (self.width, self.height) != (other.width, other.height) || self.transform != other.transform {
            return Err(DispersalError::ShapeMismatch {
                expected: (self.width, self.height),
                found: (other.width, other.height),
            });
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self.transitions += other.transitions;
        self.absorbed += other.absorbed;
        self.rows = match (self.rows, other.rows) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend(theirs);
                Some(mine)
            }
            (mine, theirs) => mine.or(theirs), // only one side kept rows
        };
        Ok(self)
    }

    #[cfg(test)]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn absorbed(&self) -> u64 {
        self.absorbed
    }

    /// Converts counts to a report, writing `nodata` into every unvisited cell.
    pub fn finish(self, params: &RunParams, nodata: f64) -> (DensityReport, Option<Vec<TrajectoryRow>>) {
        let values = self
            .counts
            .iter()
            .map(|&c| if c == 0 { nodata } else { c as f64 })
            .collect();
        let report = DensityReport {
            width: self.width,
            height: self.height,
            transform: self.transform,
            nodata,
            values,
            origins: params.origins.clone(),
            nsim: params.nsim,
            nforecast: params.nforecast,
            backwards: params.backwards,
            total_transitions: self.transitions,
            absorbed_repetitions: self.absorbed,
        };
        (report, self.rows)
    }
}
