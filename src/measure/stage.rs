use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, warn};

use crate::config::{ConfigError, ShimmerConfig};
use crate::engine::{AcousticEngine, EngineError, ShimmerKind};
use crate::reduce::{CompositeSlot, ReductionSummary, reduce_with_summary};
use crate::signal::Signal;

use super::{MeasurementRecord, ShimmerAccumulator};

/// Run the engine for one recording without touching any batch state.
///
/// Any failure, including a non-finite engine value or a panic inside the
/// engine, fails the whole recording.
pub fn measure_recording<E: AcousticEngine + ?Sized>(
    engine: &E,
    config: &ShimmerConfig,
    signal: &Signal,
) -> Result<MeasurementRecord, EngineError> {
    catch_unwind(AssertUnwindSafe(|| measure_unguarded(engine, config, signal)))
        .unwrap_or_else(|payload| Err(EngineError::Other(panic_to_string(payload))))
}

fn measure_unguarded<E: AcousticEngine + ?Sized>(
    engine: &E,
    config: &ShimmerConfig,
    signal: &Signal,
) -> Result<MeasurementRecord, EngineError> {
    let points = engine.derive_points(signal, config.pitch_floor, config.pitch_ceiling)?;
    let window = config.window();
    let mut values = [0.0_f64; 6];
    for kind in ShimmerKind::ALL {
        let value = engine.measure_shimmer(signal, &points, kind, &window)?;
        if !value.is_finite() {
            return Err(EngineError::Undefined { kind });
        }
        values[kind.column()] = value;
    }
    Ok(MeasurementRecord::from_values(values))
}

fn panic_to_string(payload: Box<dyn Any + Send>) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic payload".to_string()
    };
    format!("Acoustic engine panicked: {message}")
}

/// Batch-scoped measurement stage owning the accumulator.
///
/// Created once per batch, fed one recording at a time, then consumed by
/// [`ShimmerStage::finish`], which runs the reduction exactly once.
#[derive(Debug)]
pub struct ShimmerStage<E> {
    engine: E,
    config: ShimmerConfig,
    accumulator: ShimmerAccumulator,
}

impl<E: AcousticEngine> ShimmerStage<E> {
    /// Start a batch. The config is validated here and never re-read.
    pub fn new(engine: E, config: ShimmerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            accumulator: ShimmerAccumulator::new(),
        })
    }

    /// Measure one recording and append it to the accumulator.
    pub fn measure(&mut self, signal: &Signal) -> MeasurementRecord {
        let index = self.accumulator.len();
        let record = match measure_recording(&self.engine, &self.config, signal) {
            Ok(record) => {
                debug!("Recording {index}: shimmer measured");
                record
            }
            Err(err) => {
                warn!("Recording {index}: shimmer measurement failed: {err}");
                MeasurementRecord::failed()
            }
        };
        self.commit(&record);
        record
    }

    /// Record a recording that never reached the engine (e.g. unreadable input).
    pub fn mark_failed(&mut self, reason: &str) -> MeasurementRecord {
        warn!(
            "Recording {}: shimmer measurement failed: {reason}",
            self.accumulator.len()
        );
        let record = MeasurementRecord::failed();
        self.commit(&record);
        record
    }

    pub(crate) fn commit(&mut self, record: &MeasurementRecord) {
        self.accumulator.push(record);
    }

    pub fn config(&self) -> &ShimmerConfig {
        &self.config
    }

    pub fn accumulator(&self) -> &ShimmerAccumulator {
        &self.accumulator
    }

    /// End the batch: write composite scores into `results` and drop the accumulator.
    pub fn finish<R: CompositeSlot>(self, results: Vec<R>) -> Vec<R> {
        self.finish_with_summary(results).0
    }

    /// Like [`ShimmerStage::finish`], also returning reduction statistics.
    pub fn finish_with_summary<R: CompositeSlot>(
        self,
        results: Vec<R>,
    ) -> (Vec<R>, ReductionSummary) {
        reduce_with_summary(results, &self.accumulator, self.config.enable_pca)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ShimmerWindow;
    use crate::measure::Metric;

    /// Engine that fails on signals whose first sample is negative, and can fail one kind.
    struct ScriptedEngine {
        failing_kind: Option<ShimmerKind>,
        nan_kind: Option<ShimmerKind>,
    }

    impl AcousticEngine for ScriptedEngine {
        type Points = f64;

        fn derive_points(&self, signal: &Signal, _: f64, _: f64) -> Result<f64, EngineError> {
            match signal.samples().first() {
                Some(&first) if first >= 0.0 => Ok(first),
                _ => Err(EngineError::Unvoiced { points: 0 }),
            }
        }

        fn measure_shimmer(
            &self,
            _: &Signal,
            points: &f64,
            kind: ShimmerKind,
            _: &ShimmerWindow,
        ) -> Result<f64, EngineError> {
            if self.failing_kind == Some(kind) {
                return Err(EngineError::Undefined { kind });
            }
            if self.nan_kind == Some(kind) {
                return Ok(f64::NAN);
            }
            Ok(points + kind.column() as f64)
        }
    }

    fn engine() -> ScriptedEngine {
        ScriptedEngine {
            failing_kind: None,
            nan_kind: None,
        }
    }

    fn signal(first: f64) -> Signal {
        Signal::new(vec![first, 0.0], 100)
    }

    #[test]
    fn accumulator_grows_by_one_row_per_call() {
        let mut stage = ShimmerStage::new(engine(), ShimmerConfig::default()).unwrap();
        let ok = stage.measure(&signal(1.0));
        let failed = stage.measure(&signal(-1.0));
        stage.mark_failed("unreadable");
        assert_eq!(ok.get(ShimmerKind::Dda), Metric::Value(6.0));
        assert!(failed.is_failed());
        assert_eq!(stage.accumulator().len(), 3);
        assert!(stage.accumulator().is_aligned());
    }

    #[test]
    fn one_failing_kind_fails_every_field() {
        let engine = ScriptedEngine {
            failing_kind: Some(ShimmerKind::Apq11),
            nan_kind: None,
        };
        let mut stage = ShimmerStage::new(engine, ShimmerConfig::default()).unwrap();
        let record = stage.measure(&signal(1.0));
        assert!(record.metrics().iter().all(|m| m.is_failed()));
        let row = stage.accumulator().row(0).unwrap();
        assert!(row.iter().all(|m| m.is_failed()));
    }

    #[test]
    fn nan_from_engine_counts_as_failure() {
        let engine = ScriptedEngine {
            failing_kind: None,
            nan_kind: Some(ShimmerKind::LocalDb),
        };
        let err = measure_recording(&engine, &ShimmerConfig::default(), &signal(1.0)).unwrap_err();
        assert_eq!(
            err,
            EngineError::Undefined {
                kind: ShimmerKind::LocalDb
            }
        );
    }

    struct PanickingEngine;

    impl AcousticEngine for PanickingEngine {
        type Points = ();

        fn derive_points(&self, signal: &Signal, _: f64, _: f64) -> Result<(), EngineError> {
            if signal.samples().first() == Some(&0.5) {
                panic!("engine bug");
            }
            Ok(())
        }

        fn measure_shimmer(
            &self,
            _: &Signal,
            _: &(),
            _: ShimmerKind,
            _: &ShimmerWindow,
        ) -> Result<f64, EngineError> {
            Ok(0.04)
        }
    }

    #[test]
    fn engine_panic_fails_the_recording_and_keeps_its_row() {
        let mut stage = ShimmerStage::new(PanickingEngine, ShimmerConfig::default()).unwrap();
        stage.measure(&signal(0.1));
        let record = stage.measure(&signal(0.5));
        stage.measure(&signal(0.2));
        assert!(record.is_failed());
        assert_eq!(stage.accumulator().len(), 3);
        assert!(stage.accumulator().row(1).unwrap().iter().all(|m| m.is_failed()));
        assert_eq!(stage.accumulator().row(2).unwrap()[0], Metric::Value(0.04));
    }

    #[test]
    fn engine_panic_is_reported_as_engine_error() {
        let err = measure_recording(&PanickingEngine, &ShimmerConfig::default(), &signal(0.5))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Other("Acoustic engine panicked: engine bug".to_string())
        );
    }

    #[test]
    fn invalid_config_is_rejected_at_batch_start() {
        let config = ShimmerConfig {
            pitch_ceiling: 10.0,
            ..ShimmerConfig::default()
        };
        assert!(ShimmerStage::new(engine(), config).is_err());
    }
}
