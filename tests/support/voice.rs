//! Synthetic sustained vowels with controlled cycle-to-cycle amplitude variation.

pub const SAMPLE_RATE: u32 = 16_000;
pub const F0: f64 = 200.0;

/// A sine at `F0` whose amplitude alternates by `depth` from one cycle to the next.
///
/// Each cycle starts on a zero crossing so the per-cycle amplitude is exact.
pub fn alternating_vowel(depth: f64, seconds: f64) -> Vec<f32> {
    let count = (SAMPLE_RATE as f64 * seconds) as usize;
    let period = SAMPLE_RATE as f64 / F0;
    (0..count)
        .map(|i| {
            let cycle = (i as f64 / period).floor() as usize;
            let gain = if cycle % 2 == 0 { 1.0 + depth } else { 1.0 - depth };
            let phase = 2.0 * std::f64::consts::PI * F0 * i as f64 / SAMPLE_RATE as f64;
            (0.5 * gain * phase.sin()) as f32
        })
        .collect()
}

pub fn silence(seconds: f64) -> Vec<f32> {
    vec![0.0; (SAMPLE_RATE as f64 * seconds) as usize]
}
