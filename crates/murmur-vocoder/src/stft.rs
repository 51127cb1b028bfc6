//! Short-time Fourier transform pair.
//!
//! Centred frames with reflect padding, a periodic Hann window of
//! `win_length` zero-padded to `n_fft`, and windowed overlap-add with
//! squared-window normalisation on the way back. A spectrogram of `T` frames
//! inverts to `hop_length * (T - 1)` samples.

use ndarray::Array2;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .finish()
    }
}

impl Stft {
    /// Caller guarantees `0 < hop_length <= win_length <= n_fft`.
    pub fn new(n_fft: usize, hop_length: usize, win_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop_length,
            window: padded_hann(win_length, n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frames produced for a signal of `len` samples.
    pub fn frames_for(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Samples produced when inverting `frames` frames.
    pub fn samples_for(&self, frames: usize) -> usize {
        self.hop_length * frames.saturating_sub(1)
    }

    /// Complex one-sided spectrum, `[n_bins, frames]`.
    pub fn forward(&self, signal: &[f32]) -> Array2<Complex32> {
        let pad = self.n_fft / 2;
        let padded = reflect_pad(signal, pad);
        let n_frames = self.frames_for(signal.len());
        let n_bins = self.n_bins();

        let mut spectrum = Array2::<Complex32>::zeros((n_bins, n_frames));
        let mut buffer = vec![Complex32::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex32::new(0.0, 0.0); self.forward.get_inplace_scratch_len()];

        for t in 0..n_frames {
            let start = t * self.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = padded.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex32::new(sample * self.window[i], 0.0);
            }
            self.forward.process_with_scratch(&mut buffer, &mut scratch);
            for (k, value) in buffer[..n_bins].iter().enumerate() {
                spectrum[[k, t]] = *value;
            }
        }
        spectrum
    }

    /// Inverse of [`forward`](Self::forward) for a `[n_bins, frames]` spectrum.
    ///
    /// Panics in debug builds if the row count is not `n_bins`; callers check
    /// shapes first.
    pub fn inverse(&self, spectrum: &Array2<Complex32>) -> Vec<f32> {
        debug_assert_eq!(spectrum.nrows(), self.n_bins());
        let n_frames = spectrum.ncols();
        if n_frames == 0 {
            return Vec::new();
        }

        let n = self.n_fft;
        let half = n / 2;
        let full_len = n + self.hop_length * (n_frames - 1);
        let mut output = vec![0.0f32; full_len];
        let mut window_sum = vec![0.0f32; full_len];
        let mut buffer = vec![Complex32::new(0.0, 0.0); n];
        let mut scratch = vec![Complex32::new(0.0, 0.0); self.inverse.get_inplace_scratch_len()];
        let scale = 1.0 / n as f32;

        for t in 0..n_frames {
            // Rebuild the full spectrum from its Hermitian half.
            for k in 0..=half {
                buffer[k] = spectrum[[k, t]];
            }
            buffer[0].im = 0.0;
            if n % 2 == 0 {
                buffer[half].im = 0.0;
            }
            for k in 1..(n - half) {
                buffer[n - k] = spectrum[[k, t]].conj();
            }
            self.inverse.process_with_scratch(&mut buffer, &mut scratch);

            let start = t * self.hop_length;
            for i in 0..n {
                let w = self.window[i];
                output[start + i] += buffer[i].re * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &wss) in output.iter_mut().zip(&window_sum) {
            if wss > f32::MIN_POSITIVE {
                *sample /= wss;
            }
        }

        output.drain(..half);
        output.truncate(self.samples_for(n_frames));
        output
    }

    /// Magnitude of [`forward`](Self::forward).
    pub fn magnitude(&self, signal: &[f32]) -> Array2<f32> {
        self.forward(signal).mapv(|c| c.norm())
    }
}

/// Periodic Hann window of `win_length`, centred in `n_fft` zeros.
fn padded_hann(win_length: usize, n_fft: usize) -> Vec<f32> {
    let mut window = vec![0.0f32; n_fft];
    let offset = (n_fft - win_length) / 2;
    for i in 0..win_length {
        let phase = 2.0 * std::f32::consts::PI * i as f32 / win_length as f32;
        window[offset + i] = 0.5 * (1.0 - phase.cos());
    }
    window
}

/// Reflect-pad `pad` samples on both sides, mirroring without repeating the
/// edge sample. Signals too short to reflect are zero-padded.
fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let len = signal.len();
    let mut padded = Vec::with_capacity(len + 2 * pad);
    if len < 2 {
        padded.resize(pad, 0.0);
        padded.extend_from_slice(signal);
        padded.resize(len + 2 * pad, 0.0);
        return padded;
    }

    let period = 2 * (len - 1);
    let reflect = |i: isize| -> f32 {
        let mut j = i.rem_euclid(period as isize) as usize;
        if j >= len {
            j = period - j;
        }
        signal[j]
    };
    for i in -(pad as isize)..(len + pad) as isize {
        padded.push(reflect(i));
    }
    padded
}
