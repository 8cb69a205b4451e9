use crate::grid::GeoTransform;
use crate::sim_params::Origin;
use serde::{Deserialize, Serialize};

/// One executed transition of one particle, in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub lon: f64,
    pub lat: f64,
    pub repetition_id: u32,
    pub forecast_hour: u32,
    pub origin_lon: f64,
    pub origin_lat: f64,
}

/// The merged density grid of a run together with what produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityReport {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    /// Marker written into cells no particle visited.
    pub nodata: f64,
    /// Visit counts, row-major; unvisited cells hold `nodata`.
    pub values: Vec<f64>,
    pub origins: Vec<Origin>,
    pub nsim: u32,
    pub nforecast: u32,
    pub backwards: bool,
    /// Single-cell transitions executed across all origins and repetitions.
    pub total_transitions: u64,
    /// Repetitions that ended early because the particle left the grid.
    pub absorbed_repetitions: u64,
}

impl DensityReport {
    /// (row, col, count) for every visited cell.
    ///
    /// Cells are picked by their count (at least one visit), never by
    /// comparing against `nodata`, so NaN markers behave too.
    pub fn visited_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let width = self.width;
        self.values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v >= 1.0) // false for NaN
            .map(move |(i, &v)| (i / width, i % width, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_visit(nodata: f64) -> DensityReport {
        DensityReport {
            width: 3,
            height: 1,
            transform: GeoTransform::new(0.0, 1.0, 1.0, -1.0),
            nodata,
            values: vec![nodata, 1.0, nodata],
            origins: vec![Origin::new(0.5, 0.5)],
            nsim: 1,
            nforecast: 1,
            backwards: false,
            total_transitions: 1,
            absorbed_repetitions: 0,
        }
    }

    #[test]
    fn nan_marker_cells_are_not_visited() {
        let report = one_visit(f64::NAN);
        assert_eq!(report.visited_cells().collect::<Vec<_>>(), vec![(0, 1, 1.0)]);
    }

    #[test]
    fn visits_are_found_by_count() {
        for nodata in [-9999.0, 0.0, 0.5] {
            let report = one_visit(nodata);
            assert_eq!(report.visited_cells().collect::<Vec<_>>(), vec![(0, 1, 1.0)]);
        }
    }
}
