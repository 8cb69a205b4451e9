use crate::accumulator::DensityAccumulator;
use crate::forecast::ForecastSchedule;
use crate::kinematics::WindTimeline;
use crate::progress::{ProgressObserver, ProgressReporter};
use crate::sampler::DirectionalSampler;
use crate::trajectory::TrajectorySimulator;
use crate::wind_provider::WindFieldProvider;
use dispersal_common::{DensityReport, DispersalError, DispersalResult, Origin, RunParams, TrajectoryRow};
use log::{debug, info, warn};
use rand::prelude::*;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// The merged result of a run.
#[derive(Debug, Clone)]
pub struct DispersalOutcome {
    pub report: DensityReport,
    /// Every executed transition, present when full output was requested.
    pub trajectories: Option<Vec<TrajectoryRow>>,
}

/// Runs `nsim` repetitions for every origin over one wind timeline and merges the results.
pub struct DispersalSimulation<'p> {
    params: RunParams,
    provider: &'p dyn WindFieldProvider,
    level: String,
    nodata: f64,
}

/// Seed of the random stream owned by one (origin, repetition) unit.
///
/// Multiplying by an odd constant is a bijection on u64, so distinct units
/// never share a stream.
#[inline(always)]
pub fn unit_seed(base: u64, origin_index: usize, repetition: u32) -> u64 {
    let key = ((origin_index as u64) << 32) | repetition as u64;
    base.wrapping_add(key.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

impl<'p> DispersalSimulation<'p> {
    pub fn new(params: RunParams, provider: &'p dyn WindFieldProvider, level: impl Into<String>, nodata: f64) -> Self {
        Self { params, provider, level: level.into(), nodata }
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    /// Resolves the forecast window, loads its wind, and runs every repetition.
    pub fn run(&self, observer: &dyn ProgressObserver) -> DispersalResult<DispersalOutcome> {
        let schedule = ForecastSchedule::resolve(self.params.start, self.params.nforecast, self.params.backwards);
        let timeline = WindTimeline::load(self.provider, &schedule, &self.level)?;
        self.run_timeline(&timeline, observer)
    }

    /// Runs every repetition over an already-loaded timeline.
    pub fn run_timeline(&self, timeline: &WindTimeline, observer: &dyn ProgressObserver) -> DispersalResult<DispersalOutcome> {
        let params = &self.params;
        let reference = timeline.reference();

        // --- Place origins and build the shared stepping machinery ---
        let origin_cells = params
            .origins
            .iter()
            .map(|o| reference.cell_from_lonlat(o.lon, o.lat))
            .collect::<DispersalResult<Vec<_>>>()?;
        let sampler = DirectionalSampler::from_params(params)?;
        let simulator = TrajectorySimulator::new(timeline, &sampler, params.cellsize_m, params.boundary);

        let seed = params.seed.unwrap_or_else(|| rand::rng().random()); // logged below
        info!(
            "Simulating {} origin(s) x {} repetition(s) over {} hour(s) ({}), seed {}",
            params.origins.len(),
            params.nsim,
            timeline.len(),
            if params.parallel { "parallel" } else { "serial" },
            seed
        );
        if timeline.is_empty() {
            warn!("Forecast horizon is empty; the density grid will contain only no-data cells.");
        }

        // --- Run ---
        let total_units = if params.parallel {
            params.unit_count()
        } else {
            params.unit_count() * timeline.len() as u64 // serial mode ticks once per hour
        };
        let reporter = ProgressReporter::start(observer, total_units);
        let start_time = Instant::now();

        let result = if params.parallel {
            self.run_parallel(&simulator, &origin_cells, seed, timeline, &reporter)
        } else {
            self.run_serial(&simulator, &origin_cells, seed, timeline, &reporter)
        };
        let accumulator = match result {
            Ok(acc) => {
                reporter.finish();
                acc
            }
            Err(e) => {
                reporter.abandon();
                return Err(e);
            }
        };

        info!(
            "Simulation finished in {:.3} s: {} transitions, {} repetition(s) left the grid.",
            start_time.elapsed().as_secs_f64(),
            accumulator.transitions(),
            accumulator.absorbed()
        );
        // --- Build the report ---
        let (report, trajectories) = accumulator.finish(params, self.nodata);
        Ok(DispersalOutcome { report, trajectories })
    }

    fn run_serial(
        &self,
        simulator: &TrajectorySimulator<'_>,
        origin_cells: &[(usize, usize)],
        seed: u64,
        timeline: &WindTimeline,
        reporter: &ProgressReporter<'_>,
    ) -> DispersalResult<DensityAccumulator> {
        let params = &self.params;
        let mut merged = DensityAccumulator::new(timeline.reference(), params.full_output);

        for (origin_index, (origin, &cell)) in params.origins.iter().zip(origin_cells).enumerate() {
            let mut per_origin = DensityAccumulator::new(timeline.reference(), params.full_output);
            for repetition in 0..params.nsim {
                let mut rng = StdRng::seed_from_u64(unit_seed(seed, origin_index, repetition));
                let trajectory = simulator.run(repetition, cell, &mut rng, || reporter.tick());
                per_origin.record(&trajectory, *origin);
            }
            log_origin(origin_index, origin, &per_origin);
            merged = merged.merge(per_origin)?;
        }
        Ok(merged)
    }

    /// Fans (origin, repetition) units out over a rayon pool and reduces the partial accumulators.
    fn run_parallel(
        &self,
        simulator: &TrajectorySimulator<'_>,
        origin_cells: &[(usize, usize)],
        seed: u64,
        timeline: &WindTimeline,
        reporter: &ProgressReporter<'_>,
    ) -> DispersalResult<DensityAccumulator> {
        let params = &self.params;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.workers.unwrap_or(0)) // 0 lets rayon pick one per core
            .build()
            .map_err(|e| DispersalError::Worker(format!("failed to start worker pool: {}", e)))?;
        info!("Using {} worker thread(s).", pool.current_num_threads());

        // One unit per (origin, repetition), in serial order
        let units: Vec<(usize, u32)> = (0..params.origins.len())
            .flat_map(|o| (0..params.nsim).map(move |r| (o, r)))
            .collect();
        let keep_rows = params.full_output;
        let reference = timeline.reference();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.install(|| {
                units
                    .par_iter()
                    .try_fold(
                        || DensityAccumulator::new(reference, keep_rows),
                        |mut acc, &(origin_index, repetition)| -> DispersalResult<DensityAccumulator> {
                            let mut rng = StdRng::seed_from_u64(unit_seed(seed, origin_index, repetition));
                            let trajectory = simulator.run(repetition, origin_cells[origin_index], &mut rng, || {});
                            acc.record(&trajectory, params.origins[origin_index]);
                            reporter.tick();
                            Ok(acc)
                        },
                    )
                    .try_reduce(|| DensityAccumulator::new(reference, keep_rows), |a, b| a.merge(b))
            })
        }));

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                Err(DispersalError::Worker(message))
            }
        }
    }
}

fn log_origin(origin_index: usize, origin: &Origin, acc: &DensityAccumulator) {
    debug!(
        "Origin {} ({:.4}, {:.4}): {} transitions, {} absorbed repetition(s)",
        origin_index,
        origin.lon,
        origin.lat,
        acc.transitions(),
        acc.absorbed()
    );
}
