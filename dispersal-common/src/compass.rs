// Compass bearings: degrees clockwise from north, always in [0, 360).

#[inline(always)]
pub fn normalize_bearing(deg: f64) -> f64 {
    let b = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if b >= 360.0 { 0.0 } else { b }
}

/// Bearing the wind blows toward, from eastward `u` and northward `v` components.
#[inline(always)]
pub fn bearing_from_components(u: f64, v: f64) -> f64 {
    normalize_bearing(u.atan2(v).to_degrees())
}

#[inline(always)]
pub fn reverse_bearing(deg: f64) -> f64 {
    normalize_bearing(deg + 180.0)
}

#[inline(always)]
pub fn speed_from_components(u: f64, v: f64) -> f64 {
    (u * u + v * v).sqrt()
}

/// One of the eight 45° sectors centered on the compass points.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Octant {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Octant {
    const ALL: [Octant; 8] = [
        Octant::N,
        Octant::NE,
        Octant::E,
        Octant::SE,
        Octant::S,
        Octant::SW,
        Octant::W,
        Octant::NW,
    ];

    /// Sector `k` covers `[45k - 22.5, 45k + 22.5)`, so a bearing on a
    /// boundary belongs to the clockwise-next sector.
    pub fn from_bearing(deg: f64) -> Octant {
        let shifted = normalize_bearing(deg + 22.5);
        let sector = ((shifted / 45.0).floor() as usize).min(7);
        Self::ALL[sector]
    }

    /// Unit (dx, dy) displacement in raster coordinates (row 0 is north).
    pub fn displacement(self) -> (i64, i64) {
        match self {
            Octant::N => (0, -1),
            Octant::NE => (1, -1),
            Octant::E => (1, 0),
            Octant::SE => (1, 1),
            Octant::S => (0, 1),
            Octant::SW => (-1, 1),
            Octant::W => (-1, 0),
            Octant::NW => (-1, -1),
        }
    }
}
