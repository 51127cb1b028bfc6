//! Vocoder configuration.

use crate::error::{Result, VocoderError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Griffin-Lim and spectral transform parameters.
///
/// Defaults match the NVIDIA Tacotron2 checkpoint (22.05 kHz, 80 mels,
/// 1024-point FFT, hop 256). `sample_rate` and `n_mels` are owned by the
/// synthesis config and copied in, so they are not read from the
/// `[vocoder]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocoderConfig {
    #[serde(skip)]
    pub sample_rate: u32,
    #[serde(skip)]
    pub n_mels: usize,

    /// Number of phase-reconstruction iterations. 0 vocodes the random
    /// initial phase directly.
    pub griffin_lim_iterations: usize,
    pub griffin_lim_seed: u64,
    /// Precomputed `[n_mels, n_fft / 2 + 1]` filterbank (`.npy`). Built from
    /// the parameters below when absent.
    pub mel_filterbank: Option<PathBuf>,

    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub fmin: f32,
    /// Upper filterbank edge. `None` means Nyquist.
    pub fmax: Option<f32>,

    /// The linear magnitude is raised to `1 / power` before reconstruction.
    pub power: f32,
    /// Fast Griffin-Lim acceleration; 0 is the classic algorithm.
    pub momentum: f32,
    /// The mel input is natural-log compressed and needs `exp` first.
    pub log_compressed: bool,
    /// Stop early once the mean absolute change between successive rebuilt
    /// magnitudes falls below this value.
    pub tolerance: Option<f32>,
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            n_mels: 80,
            griffin_lim_iterations: 30,
            griffin_lim_seed: 0,
            mel_filterbank: None,
            n_fft: 1024,
            hop_length: 256,
            win_length: 1024,
            fmin: 0.0,
            fmax: Some(8000.0),
            power: 1.7,
            momentum: 0.99,
            log_compressed: true,
            tolerance: None,
        }
    }
}

impl VocoderConfig {
    /// Number of one-sided frequency bins.
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(VocoderError::InvalidConfig(msg));

        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".into());
        }
        if self.n_mels == 0 {
            return invalid("n_mels must be positive".into());
        }
        if self.n_fft == 0 || self.hop_length == 0 || self.win_length == 0 {
            return invalid(format!(
                "n_fft ({}), hop_length ({}) and win_length ({}) must be positive",
                self.n_fft, self.hop_length, self.win_length
            ));
        }
        if self.win_length > self.n_fft {
            return invalid(format!(
                "win_length ({}) exceeds n_fft ({})",
                self.win_length, self.n_fft
            ));
        }
        if self.hop_length > self.win_length {
            return invalid(format!(
                "hop_length ({}) exceeds win_length ({})",
                self.hop_length, self.win_length
            ));
        }
        if self.fmin.is_nan() || self.fmin < 0.0 {
            return invalid(format!("fmin ({}) must be non-negative", self.fmin));
        }
        if let Some(fmax) = self.fmax {
            if fmax.is_nan() || fmax <= self.fmin || fmax > self.nyquist() {
                return invalid(format!(
                    "fmax ({}) must lie in (fmin = {}, sample_rate / 2 = {}]",
                    fmax,
                    self.fmin,
                    self.nyquist()
                ));
            }
        } else if self.fmin >= self.nyquist() {
            return invalid(format!("fmin ({}) must be below Nyquist", self.fmin));
        }
        if self.power.is_nan() || self.power <= 0.0 {
            return invalid(format!("power ({}) must be positive", self.power));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return invalid(format!("momentum ({}) must lie in [0, 1)", self.momentum));
        }
        if let Some(tol) = self.tolerance {
            if tol.is_nan() || tol <= 0.0 {
                return invalid(format!("tolerance ({}) must be positive", tol));
            }
        }
        Ok(())
    }
}
