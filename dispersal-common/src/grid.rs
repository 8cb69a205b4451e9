use crate::error::{DispersalError, DispersalResult};
use serde::{Deserialize, Serialize};

/// Affine mapping between (row, col) and geographic (lon, lat).
///
/// North-up rasters only: `pixel_height` is normally negative so that row 0
/// is the northern edge.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Longitude of the top-left corner of cell (0, 0).
    pub origin_lon: f64,
    /// Latitude of the top-left corner of cell (0, 0).
    pub origin_lat: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_lon: f64, origin_lat: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_lon, origin_lat, pixel_width, pixel_height }
    }

    /// Geographic coordinate of the center of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let lon = self.origin_lon + (col as f64 + 0.5) * self.pixel_width;
        let lat = self.origin_lat + (row as f64 + 0.5) * self.pixel_height;
        (lon, lat)
    }
}

/// A georeferenced 2D array stored row-major (`y * width + x`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub data: Vec<f64>,
}

impl Grid {
    pub fn filled(width: usize, height: usize, transform: GeoTransform, value: f64) -> Self {
        Self { width, height, transform, data: vec![value; width * height] }
    }

    /// Wraps an existing buffer, rejecting one whose length disagrees with the shape.
    pub fn from_vec(width: usize, height: usize, transform: GeoTransform, data: Vec<f64>) -> DispersalResult<Self> {
        if data.len() != width * height {
            return Err(DispersalError::ShapeMismatch {
                expected: (width, height),
                found: (data.len(), 1),
            });
        }
        Ok(Self { width, height, transform, data })
    }

    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline(always)]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline(always)]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[self.idx(x, y)]
    }

    /// True when both grids can be combined cell-for-cell.
    pub fn same_geometry(&self, other: &Grid) -> bool {
        self.shape() == other.shape() && self.transform == other.transform
    }

    pub fn ensure_same_geometry(&self, other: &Grid) -> DispersalResult<()> {
        if self.same_geometry(other) {
            Ok(())
        } else {
            Err(DispersalError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            })
        }
    }

    /// Elementwise combination of two grids with identical geometry.
    pub fn zip_map<F>(&self, other: &Grid, f: F) -> DispersalResult<Grid>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.ensure_same_geometry(other)?;
        let data = self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect();
        Ok(Grid { width: self.width, height: self.height, transform: self.transform, data })
    }

    /// Column containing `lon`; may be negative or past the edge.
    pub fn col_from_lon(&self, lon: f64) -> i64 {
        ((lon - self.transform.origin_lon) / self.transform.pixel_width).floor() as i64
    }

    /// Row containing `lat`; may be negative or past the edge.
    pub fn row_from_lat(&self, lat: f64) -> i64 {
        ((lat - self.transform.origin_lat) / self.transform.pixel_height).floor() as i64
    }

    /// (col, row) of the cell holding the coordinate, or `OriginOutsideGrid`.
    pub fn cell_from_lonlat(&self, lon: f64, lat: f64) -> DispersalResult<(usize, usize)> {
        let x = self.col_from_lon(lon);
        let y = self.row_from_lat(lat);
        if self.contains(x, y) {
            Ok((x as usize, y as usize))
        } else {
            Err(DispersalError::OriginOutsideGrid { lon, lat })
        }
    }
}
