use tracing::debug;

use crate::signal::Signal;

use super::pitch::{FRAME_HOP_SECONDS, PitchFrame, track_pitch};
use super::shimmer::shimmer_from_points;
use super::{AcousticEngine, EngineError, ShimmerKind, ShimmerWindow};

/// Fraction of the local period searched on either side of the predicted next peak.
const PEAK_SEARCH_FRACTION: f64 = 0.2;
/// Minimum number of points for a usable point process.
const MIN_POINTS: usize = 3;

/// Glottal-cycle instants, in seconds, sorted ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointProcess {
    times: Vec<f64>,
}

impl PointProcess {
    pub fn new(mut times: Vec<f64>) -> Self {
        times.retain(|t| t.is_finite());
        times.sort_by(f64::total_cmp);
        times.dedup();
        Self { times }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Pure-Rust engine: autocorrelation pitch tracking plus peak-following cycle marks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodicEngine;

impl PeriodicEngine {
    pub fn new() -> Self {
        Self
    }
}

impl AcousticEngine for PeriodicEngine {
    type Points = PointProcess;

    fn derive_points(
        &self,
        signal: &Signal,
        pitch_floor: f64,
        pitch_ceiling: f64,
    ) -> Result<PointProcess, EngineError> {
        if signal.is_empty() || signal.sample_rate() == 0 {
            return Err(EngineError::EmptySignal);
        }
        if !(pitch_floor.is_finite() && pitch_floor > 0.0) {
            return Err(EngineError::InvalidParameter {
                name: "pitch_floor",
                reason: format!("must be > 0, got {pitch_floor}"),
            });
        }
        if !(pitch_ceiling.is_finite() && pitch_ceiling > pitch_floor) {
            return Err(EngineError::InvalidParameter {
                name: "pitch_ceiling",
                reason: format!("must exceed pitch_floor {pitch_floor}, got {pitch_ceiling}"),
            });
        }
        let frames = track_pitch(signal, pitch_floor, pitch_ceiling);
        let mut times = Vec::new();
        for run in voiced_runs(&frames) {
            follow_peaks(signal, run, &mut times);
        }
        let points = PointProcess::new(times);
        debug!(
            "Derived {} points from {} pitch frames",
            points.len(),
            frames.len()
        );
        if points.len() < MIN_POINTS {
            return Err(EngineError::Unvoiced {
                points: points.len(),
            });
        }
        Ok(points)
    }

    fn measure_shimmer(
        &self,
        signal: &Signal,
        points: &PointProcess,
        kind: ShimmerKind,
        window: &ShimmerWindow,
    ) -> Result<f64, EngineError> {
        if signal.is_empty() || signal.sample_rate() == 0 {
            return Err(EngineError::EmptySignal);
        }
        shimmer_from_points(signal, points, kind, window)
    }
}

/// Consecutive voiced frames, as slices of the frame list.
fn voiced_runs(frames: &[PitchFrame]) -> Vec<&[PitchFrame]> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, frame) in frames.iter().enumerate() {
        match (frame.period.is_some(), start) {
            (true, None) => start = Some(idx),
            (false, Some(begin)) => {
                runs.push(&frames[begin..idx]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        runs.push(&frames[begin..]);
    }
    runs
}

fn period_at(run: &[PitchFrame], seconds: f64) -> Option<f64> {
    run.iter()
        .min_by(|a, b| {
            (a.center_seconds - seconds)
                .abs()
                .total_cmp(&(b.center_seconds - seconds).abs())
        })
        .and_then(|frame| frame.period)
}

/// Mark one point per cycle inside a voiced run, stepping one local period at a time.
fn follow_peaks(signal: &Signal, run: &[PitchFrame], out: &mut Vec<f64>) {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return;
    };
    let rate = signal.sample_rate() as f64;
    let half_hop = FRAME_HOP_SECONDS / 2.0;
    let run_start = (first.center_seconds - half_hop).max(0.0);
    let run_end = (last.center_seconds + half_hop).min(signal.duration_seconds());
    let Some(first_period) = first.period else {
        return;
    };

    let samples = signal.samples();
    let seed_end = signal.index_at(run_start + first_period);
    let seed_start = signal.index_at(run_start);
    let Some(seed) = argmax_abs(samples, seed_start, seed_end) else {
        return;
    };
    let positive = samples[seed] >= 0.0;
    let mut current = seed as f64 / rate;
    out.push(current);

    loop {
        let Some(period) = period_at(run, current) else {
            break;
        };
        let predicted = current + period;
        if predicted > run_end {
            break;
        }
        let reach = period * PEAK_SEARCH_FRACTION;
        let lo = signal.index_at(predicted - reach);
        let hi = signal.index_at(predicted + reach);
        let found = if positive {
            argmax_signed(samples, lo, hi, 1.0)
        } else {
            argmax_signed(samples, lo, hi, -1.0)
        };
        let Some(idx) = found else {
            break;
        };
        let next = idx as f64 / rate;
        if next <= current {
            break;
        }
        out.push(next);
        current = next;
    }
}

fn argmax_abs(samples: &[f64], lo: usize, hi: usize) -> Option<usize> {
    (lo..=hi.min(samples.len().saturating_sub(1)))
        .max_by(|&a, &b| samples[a].abs().total_cmp(&samples[b].abs()))
}

fn argmax_signed(samples: &[f64], lo: usize, hi: usize, sign: f64) -> Option<usize> {
    (lo..=hi.min(samples.len().saturating_sub(1)))
        .max_by(|&a, &b| (samples[a] * sign).total_cmp(&(samples[b] * sign)))
}
