use crate::grid::{constrain_to_grid, next_cell};
use crate::kinematics::WindTimeline;
use crate::sampler::DirectionalSampler;
use crate::step_model::{max_steps_per_hour, step_count};
use dispersal_common::BoundaryPolicy;
use log::trace;
use rand::Rng;

/// Where a particle stands after a transition, and the hour it got there.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParticleState {
    pub x: usize,
    pub y: usize,
    pub hour_index: u32,
}

/// Every transition one particle made during one repetition.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    pub repetition: u32,
    pub states: Vec<ParticleState>,
    /// The particle left the grid before the horizon ended.
    pub absorbed: bool,
}

/// Walks single particles through a wind timeline.
pub struct TrajectorySimulator<'a> {
    timeline: &'a WindTimeline,
    sampler: &'a DirectionalSampler,
    cellsize_m: f64,
    boundary: BoundaryPolicy,
}

impl<'a> TrajectorySimulator<'a> {
    pub fn new(
        timeline: &'a WindTimeline,
        sampler: &'a DirectionalSampler,
        cellsize_m: f64,
        boundary: BoundaryPolicy,
    ) -> Self {
        Self { timeline, sampler, cellsize_m, boundary }
    }

    /// Runs one repetition from `start` (col, row), calling `on_hour` once per hour of the horizon.
    pub fn run<R, F>(&self, repetition: u32, start: (usize, usize), rng: &mut R, mut on_hour: F) -> Trajectory
    where
        R: Rng + ?Sized,
        F: FnMut(),
    {
        let reference = self.timeline.reference();
        let (width, height) = reference.shape();
        let max_steps = max_steps_per_hour(width, height);
        let (mut x, mut y) = start;
        let mut trajectory = Trajectory { repetition, ..Default::default() };
        let mut hours_done = 0;

        'hours: for hourly in self.timeline.hours() {
            let field = &hourly.field;
            let steps = step_count(field.speed.get(x, y), self.cellsize_m, max_steps, rng);
            trace!("rep {} hour {}: {} steps from ({}, {})", repetition, hourly.hour_index, steps, x, y);

            for _ in 0..steps {
                let bearing = self.sampler.sample_bearing(x, y, field, rng);
                match constrain_to_grid(next_cell(bearing, x, y), width, height, self.boundary) {
                    Some((nx, ny)) => {
                        x = nx;
                        y = ny;
                        trajectory.states.push(ParticleState { x, y, hour_index: hourly.hour_index });
                    }
                    None => {
                        // absorbed: this step is not counted
                        trace!("rep {} left the grid at hour {}", repetition, hourly.hour_index);
                        trajectory.absorbed = true;
                        break 'hours;
                    }
                }
            }
            hours_done += 1;
            on_hour();
        }

        // hours after an absorption still count as processed
        for _ in hours_done..self.timeline.len() {
            on_hour();
        }
        trajectory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{HourlyWind, WindField};
    use crate::wind_provider::WindLayer;
    use dispersal_common::{GeoTransform, Grid};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transform() -> GeoTransform {
        GeoTransform::new(0.0, 10.0, 1.0, -1.0)
    }

    fn uniform_timeline(u: f64, v: f64, hours: u32, size: usize) -> WindTimeline {
        let layer = WindLayer::uniform(u, v, size, size, transform());
        let field = WindField::from_layer(&layer, false).unwrap();
        let hours = (1..=hours).map(|hour_index| HourlyWind { hour_index, field: field.clone() }).collect();
        WindTimeline::from_fields(Grid::filled(size, size, transform(), 0.0), hours)
    }

    fn exact_sampler() -> DirectionalSampler {
        DirectionalSampler::new(3.0, 1.0, 0.0).unwrap()
    }

    #[test]
    fn east_wind_moves_one_cell_east() {
        let timeline = uniform_timeline(5.0, 0.0, 1, 10);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Absorb);
        let mut rng = StdRng::seed_from_u64(0);
        let t = sim.run(0, (5, 5), &mut rng, || {});
        assert_eq!(t.states, vec![ParticleState { x: 6, y: 5, hour_index: 1 }]);
        assert!(!t.absorbed);
    }

    #[test]
    fn steps_accumulate_over_hours() {
        // 10 m/s over 18 km cells: two cells per hour, three hours
        let timeline = uniform_timeline(0.0, 10.0, 3, 20);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Absorb);
        let mut rng = StdRng::seed_from_u64(0);
        let mut hours = 0;
        let t = sim.run(2, (10, 15), &mut rng, || hours += 1);
        assert_eq!(hours, 3);
        assert_eq!(t.repetition, 2);
        let rows: Vec<_> = t.states.iter().map(|s| (s.x, s.y, s.hour_index)).collect();
        assert_eq!(rows, vec![(10, 14, 1), (10, 13, 1), (10, 12, 2), (10, 11, 2), (10, 10, 3), (10, 9, 3)]);
    }

    #[test]
    fn absorbed_particles_stop_but_hours_still_count() {
        let timeline = uniform_timeline(5.0, 0.0, 4, 10);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Absorb);
        let mut rng = StdRng::seed_from_u64(0);
        let mut hours = 0;
        let t = sim.run(0, (8, 5), &mut rng, || hours += 1);
        assert!(t.absorbed);
        assert_eq!(t.states.len(), 1);
        assert_eq!(hours, 4);
    }

    #[test]
    fn clamped_particles_pile_up_on_the_edge() {
        let timeline = uniform_timeline(5.0, 0.0, 4, 10);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Clamp);
        let mut rng = StdRng::seed_from_u64(0);
        let t = sim.run(0, (8, 5), &mut rng, || {});
        assert!(!t.absorbed);
        let xs: Vec<_> = t.states.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![9, 9, 9, 9]);
    }

    #[test]
    fn calm_air_moves_at_most_one_cell_per_hour() {
        let timeline = uniform_timeline(0.0, 0.0, 24, 60);
        let sampler = DirectionalSampler::new(3.0, 1.0, 30.0).unwrap();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Absorb);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let t = sim.run(0, (30, 30), &mut rng, || {});
            assert!(t.states.len() <= 24);
            for hour in 1..=24 {
                assert!(t.states.iter().filter(|s| s.hour_index == hour).count() <= 1);
            }
        }
    }

    #[test]
    fn fill_value_wind_is_bounded_by_the_grid() {
        let timeline = uniform_timeline(9.999e20, 0.0, 2, 10);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Clamp);
        let mut rng = StdRng::seed_from_u64(0);
        let t = sim.run(0, (5, 5), &mut rng, || {});
        // 20 capped steps per hour, all piled on the east edge after the first four
        assert_eq!(t.states.len(), 40);
        assert!(t.states.iter().skip(4).all(|s| s.x == 9));
    }

    #[test]
    fn infinite_wind_counts_as_calm() {
        let timeline = uniform_timeline(f64::INFINITY, 0.0, 6, 10);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Clamp);
        let mut rng = StdRng::seed_from_u64(0);
        let t = sim.run(0, (5, 5), &mut rng, || {});
        assert!(t.states.len() <= 6);
    }

    #[test]
    fn empty_timeline_goes_nowhere() {
        let timeline = uniform_timeline(5.0, 0.0, 0, 10);
        let sampler = exact_sampler();
        let sim = TrajectorySimulator::new(&timeline, &sampler, 18000.0, BoundaryPolicy::Absorb);
        let mut rng = StdRng::seed_from_u64(0);
        let t = sim.run(0, (5, 5), &mut rng, || panic!("no hours to report"));
        assert!(t.states.is_empty());
    }
}
