//! Batch settings loaded once at batch start.
//!
//! Config keys (TOML): `[measurement]` holds the [`ShimmerConfig`] fields and
//! `[batch]` holds [`BatchSettings`]. Every key is optional.

mod defaults;
mod errors;
mod load;

use serde::{Deserialize, Serialize};

pub use errors::ConfigError;
pub use load::{CONFIG_FILE_NAME, config_path, load_from_path, load_or_default};

use crate::engine::ShimmerWindow;
use defaults::{
    clamp_worker_count, default_end_time, default_longest_period, default_maximum_amplitude,
    default_maximum_period_factor, default_pitch_ceiling, default_pitch_floor,
    default_shortest_period, default_start_time, default_true, default_worker_count,
};

/// Shimmer measurement and reduction parameters, read-only for the whole batch.
///
/// Config keys: `start_time`, `end_time`, `shortest_period`, `longest_period`,
/// `maximum_period_factor`, `maximum_amplitude`, `pitch_floor`, `pitch_ceiling`,
/// `enable_pca`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShimmerConfig {
    /// Analysis window start in seconds (0 = start of signal).
    #[serde(default = "default_start_time")]
    pub start_time: f64,
    /// Analysis window end in seconds (0 = end of signal).
    #[serde(default = "default_end_time")]
    pub end_time: f64,
    /// Shortest admissible period in seconds.
    #[serde(default = "default_shortest_period")]
    pub shortest_period: f64,
    /// Longest admissible period in seconds.
    #[serde(default = "default_longest_period")]
    pub longest_period: f64,
    /// Largest allowed ratio between consecutive periods.
    #[serde(default = "default_maximum_period_factor")]
    pub maximum_period_factor: f64,
    /// Largest allowed ratio between consecutive period amplitudes.
    #[serde(default = "default_maximum_amplitude")]
    pub maximum_amplitude: f64,
    /// Lowest f0 considered when deriving periodicity points, in Hz.
    #[serde(default = "default_pitch_floor")]
    pub pitch_floor: f64,
    /// Highest f0 considered when deriving periodicity points, in Hz.
    #[serde(default = "default_pitch_ceiling")]
    pub pitch_ceiling: f64,
    /// Run the end-of-batch PCA reduction.
    #[serde(default = "default_true")]
    pub enable_pca: bool,
}

impl Default for ShimmerConfig {
    fn default() -> Self {
        Self {
            start_time: default_start_time(),
            end_time: default_end_time(),
            shortest_period: default_shortest_period(),
            longest_period: default_longest_period(),
            maximum_period_factor: default_maximum_period_factor(),
            maximum_amplitude: default_maximum_amplitude(),
            pitch_floor: default_pitch_floor(),
            pitch_ceiling: default_pitch_ceiling(),
            enable_pca: true,
        }
    }
}

impl ShimmerConfig {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("start_time", self.start_time)?;
        non_negative("end_time", self.end_time)?;
        positive("shortest_period", self.shortest_period)?;
        positive("longest_period", self.longest_period)?;
        positive("maximum_period_factor", self.maximum_period_factor)?;
        positive("maximum_amplitude", self.maximum_amplitude)?;
        positive("pitch_floor", self.pitch_floor)?;
        positive("pitch_ceiling", self.pitch_ceiling)?;
        if self.shortest_period >= self.longest_period {
            return Err(ConfigError::invalid(
                "shortest_period",
                format!(
                    "must be below longest_period ({} >= {})",
                    self.shortest_period, self.longest_period
                ),
            ));
        }
        if self.pitch_floor >= self.pitch_ceiling {
            return Err(ConfigError::invalid(
                "pitch_floor",
                format!(
                    "must be below pitch_ceiling ({} >= {})",
                    self.pitch_floor, self.pitch_ceiling
                ),
            ));
        }
        Ok(())
    }

    /// Window parameters shared by all six shimmer requests.
    pub fn window(&self) -> ShimmerWindow {
        ShimmerWindow {
            start_time: self.start_time,
            end_time: self.end_time,
            shortest_period: self.shortest_period,
            longest_period: self.longest_period,
            maximum_period_factor: self.maximum_period_factor,
            maximum_amplitude: self.maximum_amplitude,
        }
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be >= 0, got {value}")))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {value}")))
    }
}

/// Scheduling preferences for the batch runner.
///
/// Config keys: `worker_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Measurement worker count (0 = auto, 1 = strictly sequential).
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
        }
    }
}

impl BatchSettings {
    /// Resolve `worker_count` against the machine and the number of recordings.
    pub fn resolved_workers(&self, recordings: usize) -> usize {
        let requested = match self.worker_count {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n as usize,
        };
        requested.min(recordings).max(1)
    }
}

/// Everything read from `shimmer.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub measurement: ShimmerConfig,
    #[serde(default)]
    pub batch: BatchSettings,
}

impl Settings {
    pub(crate) fn normalized(mut self) -> Self {
        self.batch.worker_count = clamp_worker_count(self.batch.worker_count);
        self
    }

    /// Validate the measurement section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.measurement.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ShimmerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.shortest_period, 0.0001);
        assert_eq!(config.longest_period, 0.02);
        assert_eq!(config.maximum_period_factor, 1.3);
        assert_eq!(config.maximum_amplitude, 1.6);
        assert!(config.enable_pca);
    }

    #[test]
    fn rejects_negative_window_and_inverted_bounds() {
        let config = ShimmerConfig {
            start_time: -0.5,
            ..ShimmerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("start_time"));

        let config = ShimmerConfig {
            shortest_period: 0.03,
            ..ShimmerConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("shortest_period"));

        let config = ShimmerConfig {
            pitch_floor: 600.0,
            ..ShimmerConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("pitch_floor"));
    }

    #[test]
    fn rejects_non_finite_values() {
        let config = ShimmerConfig {
            maximum_amplitude: f64::NAN,
            ..ShimmerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn window_mirrors_config() {
        let config = ShimmerConfig {
            start_time: 0.25,
            end_time: 1.5,
            ..ShimmerConfig::default()
        };
        let window = config.window();
        assert_eq!(window.start_time, 0.25);
        assert_eq!(window.end_time, 1.5);
        assert_eq!(window.maximum_amplitude, config.maximum_amplitude);
    }

    #[test]
    fn resolved_workers_never_exceeds_recordings() {
        let batch = BatchSettings { worker_count: 8 };
        assert_eq!(batch.resolved_workers(3), 3);
        assert_eq!(batch.resolved_workers(0), 1);
        let auto = BatchSettings { worker_count: 0 };
        assert!(auto.resolved_workers(100) >= 1);
    }
}
