//! Mel filterbank construction and loading.
//!
//! Slaney mel scale (linear below 1 kHz, logarithmic above) with Slaney area
//! normalisation, the librosa default that Tacotron2 checkpoints are trained
//! against.

use crate::config::VocoderConfig;
use crate::error::{Result, VocoderError};
use ndarray::Array2;
use std::path::Path;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Build a `[n_mels, n_fft / 2 + 1]` Slaney filterbank.
pub fn slaney_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let sr = sample_rate as f64;

    let mel_min = hz_to_mel(fmin as f64);
    let mel_max = hz_to_mel(fmax as f64);
    let hz_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let bin_freqs: Vec<f64> = (0..n_bins).map(|k| sr * k as f64 / n_fft as f64).collect();

    let mut weights = Array2::<f32>::zeros((n_mels, n_bins));
    for m in 0..n_mels {
        let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
        let enorm = 2.0 / (right - left);
        for (k, &f) in bin_freqs.iter().enumerate() {
            let lower = (f - left) / (center - left);
            let upper = (right - f) / (right - center);
            let w = lower.min(upper).max(0.0);
            weights[[m, k]] = (w * enorm) as f32;
        }
    }

    let empty = weights
        .rows()
        .into_iter()
        .filter(|row| row.iter().all(|&w| w == 0.0))
        .count();
    if empty > 0 {
        tracing::warn!(
            empty,
            n_mels,
            n_fft,
            "Mel filterbank has empty channels; n_mels may be too high for n_fft"
        );
    }

    weights
}

/// Filterbank for `config`: loaded from `mel_filterbank` when set, otherwise
/// built from the transform parameters.
pub fn filterbank_for(config: &VocoderConfig) -> Result<Array2<f32>> {
    match &config.mel_filterbank {
        Some(path) => load_filterbank(path, config.n_mels, config.n_bins()),
        None => Ok(slaney_filterbank(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            config.fmax.unwrap_or_else(|| config.nyquist()),
        )),
    }
}

/// Load a precomputed `[n_mels, n_bins]` filterbank from a `.npy` file.
pub fn load_filterbank(path: &Path, n_mels: usize, n_bins: usize) -> Result<Array2<f32>> {
    let basis: Array2<f32> =
        ndarray_npy::read_npy(path).map_err(|e| VocoderError::Filterbank {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if basis.dim() != (n_mels, n_bins) {
        return Err(VocoderError::Filterbank {
            path: path.to_path_buf(),
            reason: format!(
                "expected shape [{}, {}], found {:?}",
                n_mels,
                n_bins,
                basis.shape()
            ),
        });
    }
    tracing::debug!(path = %path.display(), n_mels, n_bins, "Loaded mel filterbank");
    Ok(basis)
}
