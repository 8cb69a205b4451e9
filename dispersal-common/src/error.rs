use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by every fallible operation in the dispersal crates.
pub type DispersalResult<T> = Result<T, DispersalError>;

/// Failures a dispersal run can hit.
///
/// Everything here is fatal for the run that produced it. Configuration
/// problems are reported before any wind data is touched.
#[derive(Error, Debug)]
pub enum DispersalError {
    /// No wind data backs the requested cycle/offset/level.
    #[error("wind data not found at {}: {detail}", path.display())]
    DataNotFound {
        path: PathBuf,
        detail: String,
    },

    /// Two grids combined in one computation differ in shape or georeference.
    #[error("grid shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Invalid run parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An origin coordinate does not fall on the wind grid.
    #[error("origin ({lon}, {lat}) lies outside the wind grid")]
    OriginOutsideGrid { lon: f64, lat: f64 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A wind file exists but could not be decoded.
    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// A parallel worker failed; the whole run is abandoned.
    #[error("worker failure: {0}")]
    Worker(String),
}

impl DispersalError {
    pub fn config(message: impl Into<String>) -> Self {
        DispersalError::Configuration(message.into())
    }

    pub fn data_not_found(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        DispersalError::DataNotFound {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
