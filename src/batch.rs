//! Batch runner: measure every recording, commit in input order, reduce once.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, mpsc::channel};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, Settings};
use crate::engine::{AcousticEngine, EngineError};
use crate::measure::{MeasurementRecord, ShimmerStage, measure_recording};
use crate::reduce::{CompositeScore, CompositeSlot, ReductionSummary};
use crate::signal::Signal;

/// One input of a batch: a label and either a decoded signal or the reason it is missing.
#[derive(Debug, Clone)]
pub struct Recording {
    pub label: String,
    pub signal: Result<Signal, String>,
}

impl Recording {
    pub fn new(label: impl Into<String>, signal: Signal) -> Self {
        Self {
            label: label.into(),
            signal: Ok(signal),
        }
    }

    /// A recording that could not be loaded; it still occupies its slot in the batch.
    pub fn unreadable(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            signal: Err(reason.into()),
        }
    }

    /// Decode a WAV file, keeping decode failures as an unreadable recording.
    pub fn load(path: &Path) -> Self {
        let label = path.display().to_string();
        match Signal::from_wav(path) {
            Ok(signal) => Self::new(label, signal),
            Err(err) => Self::unreadable(label, err.to_string()),
        }
    }
}

/// Per-recording output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingResult {
    pub label: String,
    #[serde(flatten)]
    pub shimmer: MeasurementRecord,
    /// Absent when the reduction is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shimmer_pca: Option<CompositeScore>,
}

impl CompositeSlot for RecordingResult {
    fn set_composite(&mut self, score: CompositeScore) {
        self.shimmer_pca = Some(score);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<RecordingResult>,
    pub summary: ReductionSummary,
}

enum Outcome {
    Measured(Result<MeasurementRecord, EngineError>),
    Unreadable(String),
}

/// Measure `recordings` and reduce them to composite scores.
///
/// Engine calls may run on `settings.batch.worker_count` threads, but the
/// accumulator always receives rows in input order.
pub fn run_batch<E: AcousticEngine + Sync>(
    engine: &E,
    settings: &Settings,
    recordings: &[Recording],
) -> Result<BatchOutcome, ConfigError> {
    let started = Instant::now();
    let mut stage = ShimmerStage::new(engine, settings.measurement.clone())?;
    let workers = settings.batch.resolved_workers(recordings.len());
    info!(
        "Shimmer batch: {} recordings on {workers} worker(s)",
        recordings.len()
    );

    let records = if workers <= 1 {
        recordings
            .iter()
            .map(|recording| match &recording.signal {
                Ok(signal) => stage.measure(signal),
                Err(reason) => stage.mark_failed(reason),
            })
            .collect()
    } else {
        measure_in_parallel(engine, &mut stage, recordings, workers)
    };

    let results = recordings
        .iter()
        .zip(records)
        .map(|(recording, shimmer)| RecordingResult {
            label: recording.label.clone(),
            shimmer,
            shimmer_pca: None,
        })
        .collect();
    let (results, summary) = stage.finish_with_summary(results);
    info!(
        "Shimmer batch finished in {:.2?} ({} fitted, {} dropped)",
        started.elapsed(),
        summary.fitted_rows,
        summary.dropped_rows
    );
    Ok(BatchOutcome { results, summary })
}

fn measure_in_parallel<E: AcousticEngine + Sync>(
    engine: &E,
    stage: &mut ShimmerStage<&E>,
    recordings: &[Recording],
    workers: usize,
) -> Vec<MeasurementRecord> {
    let config = stage.config().clone();
    let config = &config;
    let queue = Arc::new(Mutex::new(recordings.iter().enumerate().collect::<VecDeque<_>>()));
    let (tx, rx) = channel::<(usize, Outcome)>();
    let mut records = Vec::with_capacity(recordings.len());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            scope.spawn(move || {
                loop {
                    let work = {
                        let mut guard = match queue.lock() {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                        guard.pop_front()
                    };
                    let Some((index, recording)) = work else {
                        break;
                    };
                    let outcome = match &recording.signal {
                        Ok(signal) => Outcome::Measured(measure_recording(engine, config, signal)),
                        Err(reason) => Outcome::Unreadable(reason.clone()),
                    };
                    if tx.send((index, outcome)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);

        // Commit strictly by index; early finishers wait in `pending`.
        let mut pending = BTreeMap::new();
        for (index, outcome) in rx {
            pending.insert(index, outcome);
            while let Some(outcome) = pending.remove(&records.len()) {
                let record = commit(stage, records.len(), outcome);
                records.push(record);
            }
        }
        while records.len() < recordings.len() {
            let record = match pending.remove(&records.len()) {
                Some(outcome) => commit(stage, records.len(), outcome),
                None => stage.mark_failed("measurement worker stopped before this recording"),
            };
            records.push(record);
        }
    });
    records
}

fn commit<E: AcousticEngine>(
    stage: &mut ShimmerStage<E>,
    index: usize,
    outcome: Outcome,
) -> MeasurementRecord {
    match outcome {
        Outcome::Measured(Ok(record)) => {
            debug!("Recording {index}: shimmer measured");
            stage.commit(&record);
            record
        }
        Outcome::Measured(Err(err)) => stage.mark_failed(&err.to_string()),
        Outcome::Unreadable(reason) => {
            warn!("Recording {index} unreadable");
            stage.mark_failed(&reason)
        }
    }
}
