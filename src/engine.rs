//! Acoustic engine seam used by the measurement stage.
//!
//! The stage only needs two capabilities: turning a signal into periodicity
//! points, and asking for a named shimmer statistic over those points. Any
//! engine implementing [`AcousticEngine`] can drive a batch; [`PeriodicEngine`]
//! is the bundled pure-Rust implementation.

mod periodic;
mod pitch;
mod shimmer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal::Signal;

pub use periodic::{PeriodicEngine, PointProcess};

/// Errors reported by an acoustic engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The signal has no samples or no usable sample rate.
    #[error("Signal is empty")]
    EmptySignal,
    /// Engine parameters are out of range.
    #[error("Invalid engine parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    /// Not enough voiced cycles to derive periodicity points.
    #[error("Signal is unvoiced ({points} points found)")]
    Unvoiced { points: usize },
    /// The statistic has no admissible periods to average over.
    #[error("{kind} shimmer is undefined for this signal")]
    Undefined { kind: ShimmerKind },
    /// Engine-specific failure.
    #[error("{0}")]
    Other(String),
}

/// The six shimmer definitions requested per recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShimmerKind {
    Local,
    LocalDb,
    Apq3,
    Apq5,
    Apq11,
    Dda,
}

impl ShimmerKind {
    /// All kinds in accumulator column order.
    pub const ALL: [ShimmerKind; 6] = [
        ShimmerKind::Local,
        ShimmerKind::LocalDb,
        ShimmerKind::Apq3,
        ShimmerKind::Apq5,
        ShimmerKind::Apq11,
        ShimmerKind::Dda,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShimmerKind::Local => "local",
            ShimmerKind::LocalDb => "local_db",
            ShimmerKind::Apq3 => "apq3",
            ShimmerKind::Apq5 => "apq5",
            ShimmerKind::Apq11 => "apq11",
            ShimmerKind::Dda => "dda",
        }
    }

    /// Column index of this kind in the accumulator and reduction matrix.
    pub fn column(self) -> usize {
        match self {
            ShimmerKind::Local => 0,
            ShimmerKind::LocalDb => 1,
            ShimmerKind::Apq3 => 2,
            ShimmerKind::Apq5 => 3,
            ShimmerKind::Apq11 => 4,
            ShimmerKind::Dda => 5,
        }
    }
}

impl std::fmt::Display for ShimmerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window and period constraints shared by every shimmer request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShimmerWindow {
    pub start_time: f64,
    pub end_time: f64,
    pub shortest_period: f64,
    pub longest_period: f64,
    pub maximum_period_factor: f64,
    pub maximum_amplitude: f64,
}

impl ShimmerWindow {
    /// Resolve the window against a signal; `end <= start` means "to the end".
    pub fn bounds(&self, duration_seconds: f64) -> (f64, f64) {
        let start = self.start_time.max(0.0);
        let end = if self.end_time <= start {
            duration_seconds
        } else {
            self.end_time.min(duration_seconds)
        };
        (start, end)
    }
}

/// Opaque acoustic measurement capability.
pub trait AcousticEngine {
    /// Engine-specific periodicity representation.
    type Points;

    /// Derive periodicity points within the `pitch_floor..pitch_ceiling` f0 range.
    fn derive_points(
        &self,
        signal: &Signal,
        pitch_floor: f64,
        pitch_ceiling: f64,
    ) -> Result<Self::Points, EngineError>;

    /// Compute one shimmer statistic over previously derived points.
    fn measure_shimmer(
        &self,
        signal: &Signal,
        points: &Self::Points,
        kind: ShimmerKind,
        window: &ShimmerWindow,
    ) -> Result<f64, EngineError>;
}

impl<E: AcousticEngine + ?Sized> AcousticEngine for &E {
    type Points = E::Points;

    fn derive_points(
        &self,
        signal: &Signal,
        pitch_floor: f64,
        pitch_ceiling: f64,
    ) -> Result<Self::Points, EngineError> {
        (**self).derive_points(signal, pitch_floor, pitch_ceiling)
    }

    fn measure_shimmer(
        &self,
        signal: &Signal,
        points: &Self::Points,
        kind: ShimmerKind,
        window: &ShimmerWindow,
    ) -> Result<f64, EngineError> {
        (**self).measure_shimmer(signal, points, kind, window)
    }
}
