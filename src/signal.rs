//! Mono voice signals handed to the acoustic engine.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading a recording from disk.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The WAV container could not be opened or decoded.
    #[error("WAV decode failed for {path}: {source}")]
    Wav {
        path: PathBuf,
        source: hound::Error,
    },
    /// The file declares a zero sample rate.
    #[error("Invalid sample rate 0 in {0}")]
    ZeroSampleRate(PathBuf),
}

/// Mono samples at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl Signal {
    /// Wrap mono samples. Non-finite samples are replaced with silence.
    pub fn new(mut samples: Vec<f64>, sample_rate: u32) -> Self {
        for sample in samples.iter_mut() {
            *sample = sanitize_sample(*sample);
        }
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV file and downmix it to mono.
    pub fn from_wav(path: &Path) -> Result<Self, SignalError> {
        let wav_error = |source| SignalError::Wav {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(SignalError::ZeroSampleRate(path.to_path_buf()));
        }
        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|sample| sample.map(f64::from))
                .collect::<Result<_, _>>()
                .map_err(wav_error)?,
            hound::SampleFormat::Int => {
                let scale = int_full_scale(spec.bits_per_sample);
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f64 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(wav_error)?
            }
        };
        let mono = downmix_to_mono(&interleaved, spec.channels);
        Ok(Self::new(mono, spec.sample_rate))
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sample index nearest to `seconds`, clamped to the signal.
    pub(crate) fn index_at(&self, seconds: f64) -> usize {
        let idx = (seconds * self.sample_rate as f64).round().max(0.0) as usize;
        idx.min(self.samples.len().saturating_sub(1))
    }
}

fn int_full_scale(bits_per_sample: u16) -> f64 {
    let bits = bits_per_sample.clamp(1, 32) as i32;
    2.0_f64.powi(bits - 1)
}

fn downmix_to_mono(samples: &[f64], channels: u16) -> Vec<f64> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| sanitize_sample(s)).sum::<f64>() / channels as f64)
        .collect()
}

fn sanitize_sample(sample: f64) -> f64 {
    if sample.is_finite() { sample } else { 0.0 }
}
