use dispersal_common::SECONDS_PER_HOUR;
use rand::Rng;

/// Cells a particle would cross in one hour at `speed` m/s, rounded up.
///
/// Non-finite speeds (missing or corrupt wind) count as calm.
#[inline(always)]
pub fn cells_per_hour(speed: f64, cellsize_m: f64) -> u32 {
    if !speed.is_finite() {
        return 0;
    }
    (speed * SECONDS_PER_HOUR / cellsize_m).ceil() as u32 // negative saturates to 0
}

/// Upper bound on transitions in one hour for a `width` x `height` grid.
///
/// Enough to cross the grid edge to edge in both axes; anything faster is a
/// fill value, not wind.
#[inline(always)]
pub fn max_steps_per_hour(width: usize, height: usize) -> u32 {
    u32::try_from(width.saturating_add(height)).unwrap_or(u32::MAX).max(1)
}

/// Number of single-cell transitions to take this hour.
///
/// A fair 0/1 draw acts as the floor, so near-calm hours may skip movement
/// entirely while any real wind still advances the particle.
#[inline(always)]
/// Never exceeds `max_steps`.
#[inline(always)]
pub fn step_count<R: Rng + ?Sized>(speed: f64, cellsize_m: f64, max_steps: u32, rng: &mut R) -> u32 {
    let floor: u32 = rng.random_range(0..=1);
    floor.max(cells_per_hour(speed, cellsize_m)).min(max_steps)
}
