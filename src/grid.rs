use dispersal_common::{BoundaryPolicy, Octant};

/// Calls `f(x, y, is_center)` for every cell of the 3x3 window around
/// `(x, y)` that lies inside a `width` x `height` grid.
#[inline(always)]
pub fn for_each_window_cell<F>(x: usize, y: usize, width: usize, height: usize, mut f: F)
where
    F: FnMut(usize, usize, bool),
{
    let x_lo = x.saturating_sub(1);
    let y_lo = y.saturating_sub(1);
    let x_hi = (x + 1).min(width.saturating_sub(1));
    let y_hi = (y + 1).min(height.saturating_sub(1));
    for ny in y_lo..=y_hi {
        for nx in x_lo..=x_hi {
            f(nx, ny, nx == x && ny == y);
        }
    }
}

/// Unconstrained cell one step from `(x, y)` along `bearing`.
#[inline(always)]
pub fn next_cell(bearing: f64, x: usize, y: usize) -> (i64, i64) {
    let (dx, dy) = Octant::from_bearing(bearing).displacement();
    (x as i64 + dx, y as i64 + dy)
}

/// Resolves a candidate cell against the grid edges.
///
/// `None` means the particle has left the domain.
#[inline(always)]
pub fn constrain_to_grid(
    candidate: (i64, i64),
    width: usize,
    height: usize,
    policy: BoundaryPolicy,
) -> Option<(usize, usize)> {
    let (cx, cy) = candidate;
    let inside = cx >= 0 && cy >= 0 && (cx as usize) < width && (cy as usize) < height;
    if inside {
        return Some((cx as usize, cy as usize));
    }
    match policy {
        BoundaryPolicy::Absorb => None,
        BoundaryPolicy::Clamp => Some((
            cx.clamp(0, width as i64 - 1) as usize,
            cy.clamp(0, height as i64 - 1) as usize,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(x: usize, y: usize, w: usize, h: usize) -> Vec<(usize, usize, bool)> {
        let mut cells = Vec::new();
        for_each_window_cell(x, y, w, h, |nx, ny, c| cells.push((nx, ny, c)));
        cells
    }

    #[test]
    fn interior_window_has_nine_cells_one_center() {
        let cells = window(5, 5, 10, 10);
        assert_eq!(cells.len(), 9);
        assert_eq!(cells.iter().filter(|c| c.2).count(), 1);
        assert!(cells.contains(&(5, 5, true)));
    }

    #[test]
    fn edge_windows_drop_outside_cells() {
        assert_eq!(window(0, 0, 10, 10).len(), 4);
        assert_eq!(window(9, 5, 10, 10).len(), 6);
        assert_eq!(window(9, 9, 10, 10).len(), 4);
        assert_eq!(window(0, 0, 1, 1), vec![(0, 0, true)]);
        assert!(window(4, 0, 10, 10).iter().all(|&(x, y, _)| x < 10 && y < 10));
    }

    #[test]
    fn compass_points_map_to_unit_steps() {
        assert_eq!(next_cell(0.0, 5, 5), (5, 4));
        assert_eq!(next_cell(45.0, 5, 5), (6, 4));
        assert_eq!(next_cell(90.0, 5, 5), (6, 5));
        assert_eq!(next_cell(135.0, 5, 5), (6, 6));
        assert_eq!(next_cell(180.0, 5, 5), (5, 6));
        assert_eq!(next_cell(225.0, 5, 5), (4, 6));
        assert_eq!(next_cell(270.0, 5, 5), (4, 5));
        assert_eq!(next_cell(315.0, 5, 5), (4, 4));
    }

    #[test]
    fn every_bearing_moves_exactly_one_cell() {
        let mut deg = 0.0;
        while deg < 360.0 {
            let (x, y) = next_cell(deg, 5, 5);
            let (dx, dy) = (x - 5, y - 5);
            assert!(dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0), "bearing {deg}");
            deg += 0.25;
        }
    }

    #[test]
    fn leaving_the_grid_is_absorbed_or_clamped() {
        assert_eq!(constrain_to_grid((3, 4), 10, 10, BoundaryPolicy::Absorb), Some((3, 4)));
        assert_eq!(constrain_to_grid((10, 4), 10, 10, BoundaryPolicy::Absorb), None);
        assert_eq!(constrain_to_grid((-1, -1), 10, 10, BoundaryPolicy::Absorb), None);
        assert_eq!(constrain_to_grid((10, 4), 10, 10, BoundaryPolicy::Clamp), Some((9, 4)));
        assert_eq!(constrain_to_grid((-1, 10), 10, 10, BoundaryPolicy::Clamp), Some((0, 9)));
    }
}
