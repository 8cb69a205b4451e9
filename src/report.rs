use anyhow::{Context, Result};
use dispersal_common::{DensityReport, TrajectoryRow};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityFormat {
    Json,
    Bincode,
    MessagePack,
    Csv,
}

impl DensityFormat {
    /// Unknown names fall back to JSON.
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => DensityFormat::Json,
            "bincode" => DensityFormat::Bincode,
            "messagepack" => DensityFormat::MessagePack,
            "csv" => DensityFormat::Csv,
            other => {
                warn!("Unknown output format: {}. Using JSON instead.", other);
                DensityFormat::Json
            }
        }
    }

    fn extension(self) -> &'static str {
        match self {
            DensityFormat::Json => "json",
            DensityFormat::Bincode => "bin",
            DensityFormat::MessagePack => "msgpack",
            DensityFormat::Csv => "csv",
        }
    }
}

#[derive(Serialize)]
struct DensityCsvRow {
    row: usize,
    col: usize,
    lon: f64,
    lat: f64,
    count: f64,
}

/// Writes the density report to `<base>_density.<ext>` and returns the path.
pub fn write_density(report: &DensityReport, base_filename: &str, format: DensityFormat) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_density.{}", base_filename, format.extension()));
    let file = File::create(&path).with_context(|| format!("Error creating density file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        DensityFormat::Json => {
            serde_json::to_writer(&mut writer, report).context("Error serializing density grid to JSON")?;
        }
        DensityFormat::Bincode => {
            bincode::serialize_into(&mut writer, report).context("Error serializing density grid to bincode")?;
        }
        DensityFormat::MessagePack => {
            rmp_serde::encode::write(&mut writer, report).context("Error serializing density grid to MessagePack")?;
        }
        DensityFormat::Csv => {
            // Only visited cells; the grid geometry lives in the other formats.
            let mut csv_writer = csv::Writer::from_writer(&mut writer);
            for (row, col, count) in report.visited_cells() {
                let (lon, lat) = report.transform.cell_center(row, col);
                csv_writer.serialize(DensityCsvRow { row, col, lon, lat, count })?;
            }
            csv_writer.flush()?;
        }
    }
    writer.flush()?;

    info!("Density grid saved to {}", path.display());
    Ok(path)
}

/// Writes every trajectory row to `<base>_trajectories.csv` and returns the path.
pub fn write_trajectories(rows: &[TrajectoryRow], base_filename: &str) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_trajectories.csv", base_filename));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Error saving CSV file '{}'", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("{} trajectory rows saved to {}", rows.len(), path.display());
    Ok(path)
}
