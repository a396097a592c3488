//! Frame-wise autocorrelation pitch tracking.

use rustfft::{FftPlanner, num_complex::Complex};

use crate::signal::Signal;

/// Frame length expressed in periods of the pitch floor.
const PERIODS_PER_FRAME: f64 = 3.0;
/// Hop between analysis frames.
pub(super) const FRAME_HOP_SECONDS: f64 = 0.01;
/// Normalized autocorrelation peak required to call a frame voiced.
const VOICING_THRESHOLD: f64 = 0.45;
/// Frame peak relative to the signal peak below which a frame is silent.
const SILENCE_THRESHOLD: f64 = 0.03;
/// Shortest lag reaching this share of the best peak wins (octave guard).
const OCTAVE_RATIO: f64 = 0.9;

/// Pitch estimate for one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct PitchFrame {
    pub(super) center_seconds: f64,
    /// Local period in seconds, `None` when unvoiced.
    pub(super) period: Option<f64>,
}

pub(super) fn track_pitch(signal: &Signal, pitch_floor: f64, pitch_ceiling: f64) -> Vec<PitchFrame> {
    let samples = signal.samples();
    let rate = signal.sample_rate() as f64;
    let frame_len = (PERIODS_PER_FRAME / pitch_floor * rate).round() as usize;
    let hop = (FRAME_HOP_SECONDS * rate).round().max(1.0) as usize;
    let min_lag = (rate / pitch_ceiling).floor().max(1.0) as usize;
    let max_lag = ((rate / pitch_floor).ceil() as usize).min(frame_len.saturating_sub(1));
    if frame_len < 2 || samples.len() < frame_len || min_lag >= max_lag {
        return Vec::new();
    }

    let global_peak = samples.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    if global_peak <= 0.0 {
        return Vec::new();
    }

    let fft_len = (2 * frame_len).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);
    let mut buffer = vec![Complex::new(0.0, 0.0); fft_len];

    let mut frames = Vec::with_capacity((samples.len() - frame_len) / hop + 1);
    let mut start = 0usize;
    while start + frame_len <= samples.len() {
        let frame = &samples[start..start + frame_len];
        let center_seconds = (start as f64 + frame_len as f64 / 2.0) / rate;
        let frame_peak = frame.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
        let period = if frame_peak < global_peak * SILENCE_THRESHOLD {
            None
        } else {
            autocorrelation(frame, &mut buffer, forward.as_ref(), inverse.as_ref())
                .and_then(|acf| best_lag(&acf, frame_len, min_lag, max_lag))
                .map(|lag| lag / rate)
        };
        frames.push(PitchFrame {
            center_seconds,
            period,
        });
        start += hop;
    }
    frames
}

/// Normalized autocorrelation of a mean-removed frame, `acf[0] == 1`.
fn autocorrelation(
    frame: &[f64],
    buffer: &mut [Complex<f64>],
    forward: &dyn rustfft::Fft<f64>,
    inverse: &dyn rustfft::Fft<f64>,
) -> Option<Vec<f64>> {
    let mean = frame.iter().sum::<f64>() / frame.len() as f64;
    for cell in buffer.iter_mut() {
        *cell = Complex::new(0.0, 0.0);
    }
    for (cell, &sample) in buffer.iter_mut().zip(frame) {
        cell.re = sample - mean;
    }
    forward.process(buffer);
    for cell in buffer.iter_mut() {
        *cell = Complex::new(cell.norm_sqr(), 0.0);
    }
    inverse.process(buffer);
    let energy = buffer[0].re;
    if !energy.is_finite() || energy <= 0.0 {
        return None;
    }
    Some(buffer[..frame.len()].iter().map(|c| c.re / energy).collect())
}

/// Pick the voiced lag (fractional, in samples) or `None` when the frame is unvoiced.
fn best_lag(acf: &[f64], frame_len: usize, min_lag: usize, max_lag: usize) -> Option<f64> {
    let unbiased = |lag: usize| acf[lag] * frame_len as f64 / (frame_len - lag) as f64;
    let mut best = (0usize, f64::NEG_INFINITY);
    for lag in min_lag..=max_lag {
        let value = unbiased(lag);
        if value > best.1 {
            best = (lag, value);
        }
    }
    if best.1 < VOICING_THRESHOLD {
        return None;
    }
    let floor = best.1 * OCTAVE_RATIO;
    let mut chosen = best.0;
    for lag in min_lag.max(1)..best.0 {
        let value = unbiased(lag);
        if value >= floor && value >= unbiased(lag - 1) && value >= unbiased(lag + 1) {
            chosen = lag;
            break;
        }
    }
    Some(refine_peak(&unbiased, chosen, min_lag, max_lag))
}

fn refine_peak(curve: &dyn Fn(usize) -> f64, lag: usize, min_lag: usize, max_lag: usize) -> f64 {
    if lag <= min_lag.max(1) || lag >= max_lag {
        return lag as f64;
    }
    let (left, mid, right) = (curve(lag - 1), curve(lag), curve(lag + 1));
    let denom = left - 2.0 * mid + right;
    if denom.abs() < f64::EPSILON {
        return lag as f64;
    }
    let offset = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    lag as f64 + offset
}
