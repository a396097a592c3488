//! Shimmer measurement and PCA composite scoring for batches of voice recordings.
/// Per-user application directories.
pub mod app_dirs;
/// Batch runner and report types.
pub mod batch;
/// Settings loaded from `shimmer.toml`.
pub mod config;
/// Acoustic engine trait and the reference periodicity engine.
pub mod engine;
/// Tracing setup and run log rotation.
pub mod logging;
/// Per-recording measurement and accumulation.
pub mod measure;
/// End-of-batch PCA reduction.
pub mod reduce;
/// Mono signal loading.
pub mod signal;

pub use batch::{BatchOutcome, Recording, RecordingResult, run_batch};
pub use config::{Settings, ShimmerConfig};
pub use engine::{AcousticEngine, EngineError, PeriodicEngine, ShimmerKind, ShimmerWindow};
pub use measure::{MeasurementRecord, Metric, ShimmerAccumulator, ShimmerStage};
pub use reduce::{CompositeScore, CompositeSlot, ReductionSummary, reduce};
pub use signal::Signal;
