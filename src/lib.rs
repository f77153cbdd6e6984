//! Trendline - Weight trend engine for multi-provider scale data
//!
//! Trendline turns raw weight and body-fat readings from several providers into
//! a continuous daily series through a deterministic pipeline: provider
//! adaptation → normalization → merge → interpolation → trend smoothing.
//! Derived statistics and CSV export are computed from that series.
//!
//! ## Modules
//!
//! - **Pipeline**: `compute_measurements` and the memoizing `TrendProcessor`
//! - **Adapters**: Fitbit and Withings payloads into canonical `SourceBundle`s
//! - **Stats / Export**: Goal-aware statistics and CSV projections

pub mod adapters;
pub mod encoder;
pub mod error;
pub mod export;
pub mod interpolate;
pub mod merger;
pub mod normalizer;
pub mod pipeline;
pub mod stats;
pub mod trend;
pub mod types;
pub mod units;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use error::ComputeError;
pub use export::{CsvExporter, ExportKind};
pub use pipeline::{compute_measurements, compute_response, TrendProcessor};
pub use stats::StatsCalculator;
pub use types::{
    DailyPoint, DerivedStats, MeasurementsResponse, Mode, ProfileParameters, Provider,
    RawMeasurement, SourceBundle, SourceSnapshot,
};
pub use units::WeightUnit;

/// Trendline version stamped on every response
pub const TRENDLINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for responses
pub const PRODUCER_NAME: &str = "trendline";
