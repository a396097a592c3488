//! Amplitude perturbation statistics over a point process.

use crate::signal::Signal;

use super::periodic::PointProcess;
use super::{EngineError, ShimmerKind, ShimmerWindow};

/// Samples searched on either side of a point for its peak amplitude.
const PEAK_REFINE_SAMPLES: usize = 2;

/// One admissible period: its length and the peak amplitude at its closing point.
#[derive(Debug, Clone, Copy)]
struct Period {
    length: f64,
    amplitude: f64,
}

pub(super) fn shimmer_from_points(
    signal: &Signal,
    points: &PointProcess,
    kind: ShimmerKind,
    window: &ShimmerWindow,
) -> Result<f64, EngineError> {
    let runs = admissible_runs(signal, points, window);
    let (term_sum, term_count, amp_sum, amp_count) = match kind {
        ShimmerKind::Local => accumulate(&runs, 2, |a| (a[1] - a[0]).abs()),
        ShimmerKind::LocalDb => accumulate(&runs, 2, |a| (20.0 * (a[1] / a[0]).log10()).abs()),
        ShimmerKind::Apq3 => accumulate(&runs, 3, centred_deviation),
        ShimmerKind::Apq5 => accumulate(&runs, 5, centred_deviation),
        ShimmerKind::Apq11 => accumulate(&runs, 11, centred_deviation),
        ShimmerKind::Dda => accumulate(&runs, 3, |a| (a[2] - 2.0 * a[1] + a[0]).abs()),
    };
    if term_count == 0 || amp_count == 0 {
        return Err(EngineError::Undefined { kind });
    }
    let mean_term = term_sum / term_count as f64;
    let value = match kind {
        ShimmerKind::LocalDb => mean_term,
        _ => {
            let mean_amplitude = amp_sum / amp_count as f64;
            if mean_amplitude <= 0.0 {
                return Err(EngineError::Undefined { kind });
            }
            mean_term / mean_amplitude
        }
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::Undefined { kind })
    }
}

fn centred_deviation(amplitudes: &[f64]) -> f64 {
    let mid = amplitudes[amplitudes.len() / 2];
    let mean = amplitudes.iter().sum::<f64>() / amplitudes.len() as f64;
    (mid - mean).abs()
}

/// Slide a `width`-amplitude window over every run; runs too short contribute nothing.
fn accumulate(
    runs: &[Vec<Period>],
    width: usize,
    term: impl Fn(&[f64]) -> f64,
) -> (f64, usize, f64, usize) {
    let mut term_sum = 0.0;
    let mut term_count = 0usize;
    let mut amp_sum = 0.0;
    let mut amp_count = 0usize;
    for run in runs.iter().filter(|run| run.len() >= width) {
        let amplitudes: Vec<f64> = run.iter().map(|p| p.amplitude).collect();
        for slice in amplitudes.windows(width) {
            term_sum += term(slice);
            term_count += 1;
        }
        amp_sum += amplitudes.iter().sum::<f64>();
        amp_count += amplitudes.len();
    }
    (term_sum, term_count, amp_sum, amp_count)
}

/// Split the in-window periods into runs of mutually compatible neighbours.
fn admissible_runs(
    signal: &Signal,
    points: &PointProcess,
    window: &ShimmerWindow,
) -> Vec<Vec<Period>> {
    let (start, end) = window.bounds(signal.duration_seconds());
    let times: Vec<f64> = points
        .times()
        .iter()
        .copied()
        .filter(|&t| t >= start && t <= end)
        .collect();

    let mut runs = Vec::new();
    let mut current: Vec<Period> = Vec::new();
    for pair in times.windows(2) {
        let period = Period {
            length: pair[1] - pair[0],
            amplitude: peak_amplitude(signal, pair[1]),
        };
        let admissible = period.length >= window.shortest_period
            && period.length <= window.longest_period
            && period.amplitude > 0.0;
        if !admissible {
            flush(&mut runs, &mut current);
            continue;
        }
        if let Some(previous) = current.last()
            && !compatible(previous, &period, window)
        {
            flush(&mut runs, &mut current);
        }
        current.push(period);
    }
    flush(&mut runs, &mut current);
    runs
}

fn compatible(previous: &Period, next: &Period, window: &ShimmerWindow) -> bool {
    let period_ratio = ratio(previous.length, next.length);
    let amplitude_ratio = ratio(previous.amplitude, next.amplitude);
    period_ratio <= window.maximum_period_factor && amplitude_ratio <= window.maximum_amplitude
}

fn ratio(a: f64, b: f64) -> f64 {
    a.max(b) / a.min(b)
}

fn flush(runs: &mut Vec<Vec<Period>>, current: &mut Vec<Period>) {
    if !current.is_empty() {
        runs.push(std::mem::take(current));
    }
}

fn peak_amplitude(signal: &Signal, seconds: f64) -> f64 {
    let samples = signal.samples();
    let center = signal.index_at(seconds);
    let lo = center.saturating_sub(PEAK_REFINE_SAMPLES);
    let hi = (center + PEAK_REFINE_SAMPLES).min(samples.len().saturating_sub(1));
    samples[lo..=hi]
        .iter()
        .fold(0.0_f64, |acc, s| acc.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 10_000;
    const PERIOD_SAMPLES: usize = 50;

    fn window() -> ShimmerWindow {
        ShimmerWindow {
            start_time: 0.0,
            end_time: 0.0,
            shortest_period: 0.0001,
            longest_period: 0.02,
            maximum_period_factor: 1.3,
            maximum_amplitude: 1.6,
        }
    }

    /// Impulse train with one point per impulse and the given per-cycle amplitudes.
    fn impulses(amplitudes: &[f64]) -> (Signal, PointProcess) {
        let mut samples = vec![0.0; (amplitudes.len() + 2) * PERIOD_SAMPLES];
        let mut times = Vec::new();
        for (cycle, &amp) in amplitudes.iter().enumerate() {
            let idx = (cycle + 1) * PERIOD_SAMPLES;
            samples[idx] = amp;
            times.push(idx as f64 / RATE as f64);
        }
        (Signal::new(samples, RATE), PointProcess::new(times))
    }

    fn alternating(count: usize, high: f64, low: f64) -> Vec<f64> {
        (0..count).map(|i| if i % 2 == 0 { high } else { low }).collect()
    }

    fn measure(kind: ShimmerKind, amplitudes: &[f64], window: &ShimmerWindow) -> Result<f64, EngineError> {
        let (signal, points) = impulses(amplitudes);
        shimmer_from_points(&signal, &points, kind, window)
    }

    #[test]
    fn constant_amplitude_has_zero_shimmer() {
        let amps = vec![0.5; 30];
        for kind in ShimmerKind::ALL {
            let value = measure(kind, &amps, &window()).unwrap();
            assert!(value.abs() < 1e-12, "{kind}: {value}");
        }
    }

    #[test]
    fn alternating_amplitude_matches_closed_form() {
        let amps = alternating(40, 1.0, 0.9);
        let w = window();
        let local = measure(ShimmerKind::Local, &amps, &w).unwrap();
        let local_db = measure(ShimmerKind::LocalDb, &amps, &w).unwrap();
        let apq3 = measure(ShimmerKind::Apq3, &amps, &w).unwrap();
        let dda = measure(ShimmerKind::Dda, &amps, &w).unwrap();
        // The first impulse only opens the first period, so the run holds 39 amplitudes.
        assert!((local - 0.1 / 0.95).abs() < 0.005, "local {local}");
        assert!((local_db - 20.0 * (1.0_f64 / 0.9).log10()).abs() < 1e-9);
        assert!((apq3 - (0.2 / 3.0) / 0.95).abs() < 0.005, "apq3 {apq3}");
        assert!((dda - 3.0 * apq3).abs() < 0.005, "dda {dda}");
    }

    #[test]
    fn apq11_needs_eleven_compatible_periods() {
        let amps = alternating(8, 1.0, 0.9);
        assert_eq!(
            measure(ShimmerKind::Apq11, &amps, &window()).unwrap_err(),
            EngineError::Undefined {
                kind: ShimmerKind::Apq11
            }
        );
        assert!(measure(ShimmerKind::Apq5, &amps, &window()).is_ok());
    }

    #[test]
    fn periods_outside_bounds_are_ignored() {
        let amps = alternating(20, 1.0, 0.9);
        let w = ShimmerWindow {
            longest_period: 0.004,
            ..window()
        };
        assert!(matches!(
            measure(ShimmerKind::Local, &amps, &w),
            Err(EngineError::Undefined { .. })
        ));
    }

    #[test]
    fn amplitude_jumps_break_runs() {
        let amps = alternating(20, 1.0, 0.5);
        assert!(measure(ShimmerKind::Local, &amps, &window()).is_err());
        let relaxed = ShimmerWindow {
            maximum_amplitude: 2.5,
            ..window()
        };
        let local = measure(ShimmerKind::Local, &amps, &relaxed).unwrap();
        assert!((local - 0.5 / 0.75).abs() < 0.02, "local {local}");
    }

    #[test]
    fn time_window_limits_points() {
        let mut amps = vec![0.5; 20];
        amps.extend(alternating(20, 1.0, 0.9));
        let (signal, points) = impulses(&amps);
        let steady = ShimmerWindow {
            end_time: 20.0 * PERIOD_SAMPLES as f64 / RATE as f64,
            ..window()
        };
        let value = shimmer_from_points(&signal, &points, ShimmerKind::Local, &steady).unwrap();
        assert!(value.abs() < 1e-12);
        let whole = shimmer_from_points(&signal, &points, ShimmerKind::Local, &window()).unwrap();
        assert!(whole > 0.01);
    }
}
