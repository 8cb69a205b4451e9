use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Define modules used by main
mod accumulator;
mod forecast;
mod grid;
mod kinematics;
mod progress;
mod report;
mod sampler;
mod simulation;
mod step_model;
mod trajectory;
mod wind_provider;

use dispersal_common::{GeoTransform, SimulationConfig};
use forecast::ForecastSchedule;
use progress::{NoProgress, ProgressBarObserver, ProgressObserver};
use report::{write_density, write_trajectories, DensityFormat};
use simulation::DispersalSimulation;
use wind_provider::{provider_from_config, ForecastArchive, HistoricalArchive, HourlyStack, WindLayer};

/// Stochastic wind-driven particle dispersal over a gridded forecast
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a dispersal simulation
    Run(RunArgs),
    /// Write the configured uniform wind out as an archive the run command can read
    SynthWind(SynthArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Release point as "lon,lat"; repeat for several origins (replaces the config list)
    #[arg(long = "origin", value_parser = parse_origin, allow_hyphen_values = true)]
    origins: Vec<[f64; 2]>,

    /// Hours to simulate
    #[arg(long)]
    nforecast: Option<u32>,

    /// Repetitions per origin
    #[arg(long)]
    nsim: Option<u32>,

    /// Start (or, backwards, end) date, YYYY-MM-DD
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Start (or, backwards, end) hour, 0-23
    #[arg(long)]
    start_hour: Option<u32>,

    /// Walk the timeline backwards from the origins
    #[arg(long)]
    backwards: bool,

    /// Also write the full trajectory table
    #[arg(long)]
    full: bool,

    /// Spread repetitions over a worker pool
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (defaults to one per core)
    #[arg(long)]
    workers: Option<usize>,

    /// Base seed for the random streams
    #[arg(long)]
    seed: Option<u64>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Output base filename
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ArchiveKind {
    Forecast,
    Historical,
}

#[derive(clap::Args, Debug)]
struct SynthArgs {
    /// Path to the config.toml file holding [wind.uniform] and the run window
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Archive root directory to write
    #[arg(long)]
    out: PathBuf,

    /// Archive layout to produce
    #[arg(long, value_enum, default_value_t = ArchiveKind::Forecast)]
    kind: ArchiveKind,
}

fn parse_origin(s: &str) -> Result<[f64; 2], String> {
    let (lon, lat) = s.split_once(',').ok_or_else(|| format!("expected \"lon,lat\", got \"{}\"", s))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude \"{}\": {}", lon, e))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude \"{}\": {}", lat, e))?;
    Ok([lon, lat])
}

fn apply_overrides(config: &mut SimulationConfig, args: &RunArgs) {
    if !args.origins.is_empty() {
        config.origins = args.origins.clone();
    }
    if let Some(n) = args.nforecast {
        config.run.nforecast = n;
    }
    if let Some(n) = args.nsim {
        config.run.nsim = n;
    }
    if let Some(d) = args.start_date {
        config.run.start_date = d;
    }
    if let Some(h) = args.start_hour {
        config.run.start_hour = h;
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    if let Some(workers) = args.workers {
        config.execution.workers = Some(workers);
    }
    if let Some(output) = &args.output {
        config.output.base_filename = output.clone();
    }
    config.run.backwards |= args.backwards;
    config.output.full_output |= args.full;
    config.execution.parallel |= args.parallel;
    config.execution.progress &= !args.no_progress;
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    match Args::parse().command {
        Command::Run(args) => run(args),
        Command::SynthWind(args) => synth_wind(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    info!("Starting Dispersal Engine...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    apply_overrides(&mut config, &args);
    let params = config.get_run_params().context("Invalid run parameters")?;
    debug!("Run Parameters: {:#?}", params);

    let provider = provider_from_config(&config.wind)?;
    info!("Using the {} wind provider.", provider.name());

    let observer: Box<dyn ProgressObserver> = if config.execution.progress {
        let unit = if params.parallel { "repetitions" } else { "hours" };
        Box::new(ProgressBarObserver::new(unit))
    } else {
        Box::new(NoProgress)
    };

    let simulation = DispersalSimulation::new(params, provider.as_ref(), config.wind.level.clone(), config.output.nodata);
    let outcome = simulation.run(observer.as_ref()).context("Simulation failed")?;

    // --- Save Results ---
    info!("Saving results...");
    let format = DensityFormat::from_name(config.output.format.as_deref().unwrap_or("json"));
    write_density(&outcome.report, &config.output.base_filename, format)?;

    match &outcome.trajectories {
        Some(rows) => {
            write_trajectories(rows, &config.output.base_filename)?;
        }
        None if simulation.params().full_output => warn!("Full output requested but no trajectory rows were kept."),
        None => info!("Skipping trajectory table as per config."),
    }

    info!("Dispersal Complete.");
    Ok(())
}

fn synth_wind(args: SynthArgs) -> Result<()> {
    let config = SimulationConfig::load(&args.config)?;
    let written = write_wind_archive(&config, &args.out, args.kind)?;
    info!("Wrote {} {:?} archive file(s) under {}", written.len(), args.kind, args.out.display());
    Ok(())
}

/// Writes the `[wind.uniform]` field for every hour the configured run will read,
/// analysis hour included, and returns the files written.
fn write_wind_archive(config: &SimulationConfig, out: &Path, kind: ArchiveKind) -> Result<Vec<PathBuf>> {
    let uniform = config
        .wind
        .uniform
        .as_ref()
        .context("synth-wind needs a [wind.uniform] section")?;
    let params = config.get_run_params().context("Invalid run parameters")?;
    let transform = GeoTransform::new(uniform.origin_lon, uniform.origin_lat, uniform.pixel_width, uniform.pixel_height);
    let layer = WindLayer::uniform(uniform.u, uniform.v, uniform.width, uniform.height, transform);
    let level = config.wind.level.as_str();

    // --- Resolve the window the run will read ---
    let schedule = ForecastSchedule::resolve(params.start, params.nforecast, params.backwards);
    if schedule.is_empty() {
        info!("Horizon is empty; writing the analysis hour only.");
    }
    let mut entries = vec![schedule.reference_entry()];
    entries.extend_from_slice(schedule.entries());

    // --- Write the archive ---
    let mut written = Vec::new();
    match kind {
        ArchiveKind::Forecast => {
            let archive = ForecastArchive::new(out);
            for entry in &entries {
                let path = archive.layer_path(&entry.cycle, entry.offset, level);
                layer.save(&path)?;
                written.push(path);
            }
        }
        ArchiveKind::Historical => {
            let archive = HistoricalArchive::new(out);
            // one 24-band file per calendar day touched by the window
            let days: BTreeMap<_, _> = entries.iter().map(|e| (e.valid_time.date(), e.valid_time)).collect();
            let stack = HourlyStack { layers: vec![layer; 24] };
            for valid_time in days.values() {
                let path = archive.day_path(valid_time, level);
                stack.save(&path)?;
                written.push(path);
            }
        }
    }
    debug!("Archive files: {:?}", written);
    Ok(written)
}
