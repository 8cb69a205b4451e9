pub mod compass;
pub mod config;
pub mod error;
pub mod grid;
pub mod output;
pub mod sim_params;

// Re-export key types for easier use by dependent crates
pub use compass::{bearing_from_components, normalize_bearing, reverse_bearing, speed_from_components, Octant};
pub use config::{BoundaryPolicy, ExecutionConfig, GridConfig, OutputConfig, RunConfig, SamplerConfig, SimulationConfig, UniformWindConfig, WindConfig, WindSource};
pub use error::{DispersalError, DispersalResult};
pub use grid::{GeoTransform, Grid};
pub use output::{DensityReport, TrajectoryRow};
pub use sim_params::{Origin, RunParams, SECONDS_PER_HOUR};
