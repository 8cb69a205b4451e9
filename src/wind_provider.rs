use crate::forecast::{ForecastCycle, ScheduleEntry};
use chrono::{NaiveDateTime, Timelike};
use dispersal_common::{DispersalError, DispersalResult, GeoTransform, Grid, WindConfig, WindSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Eastward (`u`) and northward (`v`) wind components in m/s for one hour and level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindLayer {
    pub u: Grid,
    pub v: Grid,
}

impl WindLayer {
    pub fn new(u: Grid, v: Grid) -> DispersalResult<Self> {
        u.ensure_same_geometry(&v)?;
        Ok(Self { u, v })
    }

    pub fn uniform(u: f64, v: f64, width: usize, height: usize, transform: GeoTransform) -> Self {
        Self {
            u: Grid::filled(width, height, transform, u),
            v: Grid::filled(width, height, transform, v),
        }
    }

    pub fn load(path: &Path) -> DispersalResult<Self> {
        let layer: WindLayer = read_bincode(path)?;
        layer.u.ensure_same_geometry(&layer.v)?;
        Ok(layer)
    }

    pub fn save(&self, path: &Path) -> DispersalResult<()> {
        write_bincode(path, self)
    }
}

/// One day of hourly layers as stored by a historical archive; band `h` is valid at hour `h`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HourlyStack {
    pub layers: Vec<WindLayer>,
}

impl HourlyStack {
    pub fn save(&self, path: &Path) -> DispersalResult<()> {
        write_bincode(path, self)
    }
}

/// Identifies the layer needed for one hour of the horizon.
#[derive(Clone, Debug)]
pub struct LayerRequest<'a> {
    pub cycle: ForecastCycle,
    pub offset: u32,
    pub level: &'a str,
    pub valid_time: NaiveDateTime,
}

impl<'a> LayerRequest<'a> {
    pub fn for_entry(entry: &ScheduleEntry, level: &'a str) -> Self {
        Self {
            cycle: entry.cycle,
            offset: entry.offset,
            level,
            valid_time: entry.valid_time,
        }
    }
}

/// Supplies u/v grids for a requested forecast hour.
pub trait WindFieldProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Must fail with `DataNotFound` when nothing backs the request.
    fn wind_layer(&self, request: &LayerRequest<'_>) -> DispersalResult<WindLayer>;
}

/// Forecast runs laid out as `root/YYYYMMDD/HH/gfs.tHHz.fFFF.<level>.bin`.
pub struct ForecastArchive {
    root: PathBuf,
}

impl ForecastArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn layer_path(&self, cycle: &ForecastCycle, offset: u32, level: &str) -> PathBuf {
        let label = cycle.label();
        self.root
            .join(cycle.date.format("%Y%m%d").to_string())
            .join(&label)
            .join(format!("gfs.t{}z.f{:03}.{}.bin", label, offset, level))
    }
}

impl WindFieldProvider for ForecastArchive {
    fn name(&self) -> &str {
        "forecast"
    }

    fn wind_layer(&self, request: &LayerRequest<'_>) -> DispersalResult<WindLayer> {
        WindLayer::load(&self.layer_path(&request.cycle, request.offset, request.level))
    }
}

/// Reanalysis-style archive: one `root/YYYYMMDD.<level>.bin` file of 24 hourly bands per day.
pub struct HistoricalArchive {
    root: PathBuf,
}

impl HistoricalArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn day_path(&self, valid_time: &NaiveDateTime, level: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}.bin", valid_time.date().format("%Y%m%d"), level))
    }
}

impl WindFieldProvider for HistoricalArchive {
    fn name(&self) -> &str {
        "historical"
    }

    fn wind_layer(&self, request: &LayerRequest<'_>) -> DispersalResult<WindLayer> {
        let path = self.day_path(&request.valid_time, request.level);
        let stack: HourlyStack = read_bincode(&path)?;
        let band = request.valid_time.hour() as usize; // band 0 is 00z
        let layer = stack.layers.into_iter().nth(band).ok_or_else(|| {
            DispersalError::data_not_found(&path, format!("no band for hour {}", band))
        })?;
        layer.u.ensure_same_geometry(&layer.v)?;
        Ok(layer)
    }
}

/// Constant wind over a fixed grid.
pub struct UniformWind {
    layer: WindLayer,
}

impl UniformWind {
    pub fn new(u: f64, v: f64, width: usize, height: usize, transform: GeoTransform) -> Self {
        Self { layer: WindLayer::uniform(u, v, width, height, transform) }
    }
}

impl WindFieldProvider for UniformWind {
    fn name(&self) -> &str {
        "uniform"
    }

    fn wind_layer(&self, _request: &LayerRequest<'_>) -> DispersalResult<WindLayer> {
        Ok(self.layer.clone())
    }
}

/// Builds the provider selected in the `[wind]` section.
pub fn provider_from_config(config: &WindConfig) -> DispersalResult<Box<dyn WindFieldProvider>> {
    let root = || {
        config
            .root
            .clone()
            .ok_or_else(|| DispersalError::config("wind.root is required for archive sources"))
    };
    let provider: Box<dyn WindFieldProvider> = match config.source {
        WindSource::Forecast => Box::new(ForecastArchive::new(root()?)),
        WindSource::Historical => Box::new(HistoricalArchive::new(root()?)),
        WindSource::Uniform => {
            let u = config
                .uniform
                .as_ref()
                .ok_or_else(|| DispersalError::config("[wind.uniform] is required for the uniform source"))?;
            if u.width == 0 || u.height == 0 {
                return Err(DispersalError::config("uniform wind grid must be at least 1x1"));
            }
            let transform = GeoTransform::new(u.origin_lon, u.origin_lat, u.pixel_width, u.pixel_height);
            Box::new(UniformWind::new(u.u, u.v, u.width, u.height, transform))
        }
    };
    Ok(provider)
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> DispersalResult<T> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DispersalError::data_not_found(path, "no such file"),
        _ => DispersalError::Io { path: path.to_path_buf(), source: e },
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|e| DispersalError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> DispersalResult<()> {
    let io_err = |source: std::io::Error| DispersalError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    bincode::serialize_into(&mut writer, value).map_err(|e| io_err(std::io::Error::other(e)))?;
    writer.flush().map_err(io_err)
}
