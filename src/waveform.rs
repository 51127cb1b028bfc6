//! Synthesized audio and the WAV writer.

use std::time::Duration;

#[cfg(feature = "wav")]
use crate::Result;
#[cfg(feature = "wav")]
use hound::{SampleFormat, WavSpec, WavWriter};
#[cfg(feature = "wav")]
use std::path::Path;

/// Mono audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// `round(sample_rate * duration)` zero samples.
    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let len = (sample_rate as f64 * duration.as_secs_f64()).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Append `other`. Sample rates must agree.
    pub fn append(&mut self, other: &Waveform) {
        debug_assert_eq!(self.sample_rate, other.sample_rate);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Write mono 16-bit PCM. Samples are clamped to `[-1, 1]`.
    #[cfg(feature = "wav")]
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;

        tracing::info!(
            path = %path.display(),
            samples = self.samples.len(),
            sample_rate = self.sample_rate,
            "Wrote WAV"
        );
        Ok(())
    }
}

#[cfg(feature = "wav")]
#[inline]
fn to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    (clamped * i16::MAX as f32) as i16
}
