//! Griffin-Lim phase reconstruction.
//!
//! Estimates a phase for a magnitude-only spectrogram by alternating between
//! the time domain and the STFT domain, substituting the target magnitude on
//! every pass. The fast variant adds a momentum term (Perraudin et al.).

use crate::config::VocoderConfig;
use crate::error::Result;
use crate::filterbank::filterbank_for;
use crate::projection::MelProjection;
use crate::stft::Stft;
use murmur_core::ShapeError;
use ndarray::{Array2, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex32;

/// Below this a rebuilt bin has no usable phase and falls back to zero phase.
const PHASE_EPS: f32 = 1e-16;

/// Griffin-Lim vocoder with its filterbank, projection and FFT plans.
///
/// Immutable after construction and shareable across threads; every
/// reconstruction owns its own [`GriffinLimRun`].
#[derive(Debug)]
pub struct GriffinLim {
    config: VocoderConfig,
    projection: MelProjection,
    stft: Stft,
}

impl GriffinLim {
    /// Validate `config` and build or load its mel filterbank.
    pub fn new(config: VocoderConfig) -> Result<Self> {
        config.validate()?;
        let basis = filterbank_for(&config)?;
        Self::with_filterbank(config, basis)
    }

    /// Use an explicit `[n_mels, n_fft / 2 + 1]` filterbank.
    pub fn with_filterbank(config: VocoderConfig, basis: Array2<f32>) -> Result<Self> {
        config.validate()?;
        if basis.dim() != (config.n_mels, config.n_bins()) {
            return Err(ShapeError::new(
                "mel filterbank",
                format!("[{}, {}]", config.n_mels, config.n_bins()),
                format!("{:?}", basis.shape()),
            )
            .into());
        }
        let projection = MelProjection::new(basis)?;
        let stft = Stft::new(config.n_fft, config.hop_length, config.win_length);
        tracing::debug!(
            n_fft = config.n_fft,
            hop_length = config.hop_length,
            n_mels = config.n_mels,
            iterations = config.griffin_lim_iterations,
            "Griffin-Lim vocoder ready"
        );
        Ok(Self {
            config,
            projection,
            stft,
        })
    }

    pub fn config(&self) -> &VocoderConfig {
        &self.config
    }

    pub fn projection(&self) -> &MelProjection {
        &self.projection
    }

    pub fn stft(&self) -> &Stft {
        &self.stft
    }

    /// Turn a decoder mel spectrogram `[n_mels, T]` into the linear target
    /// magnitude `[n_bins, T]`: decompress, project, clamp, apply `1 / power`.
    pub fn mel_to_magnitude(&self, mel: &Array2<f32>) -> Result<Array2<f32>> {
        let mel = if self.config.log_compressed {
            mel.mapv(f32::exp)
        } else {
            mel.clone()
        };
        let mut linear = self.projection.to_linear(&mel)?;
        let exponent = 1.0 / self.config.power;
        linear.mapv_inplace(|v| v.powf(exponent));
        Ok(linear)
    }

    /// Vocode a decoder mel spectrogram.
    pub fn infer(&self, mel: &Array2<f32>) -> Result<Vec<f32>> {
        let magnitude = self.mel_to_magnitude(mel)?;
        self.reconstruct(magnitude)
    }

    /// Reconstruct a waveform from a linear magnitude spectrogram.
    pub fn reconstruct(&self, magnitude: Array2<f32>) -> Result<Vec<f32>> {
        let mut run = self.start(magnitude)?;
        while run.step() {}
        Ok(run.finish())
    }

    /// Begin a step-by-step reconstruction. A spectrogram without frames
    /// gives a run that never steps and finishes to no samples.
    pub fn start(&self, magnitude: Array2<f32>) -> Result<GriffinLimRun<'_>> {
        if magnitude.nrows() != self.stft.n_bins() {
            return Err(ShapeError::new(
                "magnitude spectrogram",
                format!("{} frequency bins (n_fft = {})", self.stft.n_bins(), self.config.n_fft),
                format!("{} rows", magnitude.nrows()),
            )
            .into());
        }
        if magnitude.iter().any(|v| !v.is_finite()) {
            return Err(ShapeError::new(
                "magnitude spectrogram",
                "finite values",
                "NaN or infinite entries",
            )
            .into());
        }

        let mut rng = StdRng::seed_from_u64(self.config.griffin_lim_seed);
        let angles = Array2::from_shape_simple_fn(magnitude.dim(), || {
            let theta = rng.gen::<f32>() * std::f32::consts::TAU;
            Complex32::from_polar(1.0, theta)
        });
        let previous = Array2::zeros(magnitude.dim());

        Ok(GriffinLimRun {
            vocoder: self,
            target: magnitude,
            angles,
            previous,
            iteration: 0,
            last_change: None,
            converged: false,
        })
    }

    /// `‖ |STFT(y)| − S ‖_F / ‖S‖_F` over the frames both cover.
    pub fn spectral_convergence(&self, target: &Array2<f32>, waveform: &[f32]) -> f32 {
        spectral_convergence(&self.stft, target, waveform)
    }
}

/// One Griffin-Lim reconstruction, exposed step by step.
///
/// The current estimate is always `target * angles`, so its magnitude equals
/// the target after every step.
pub struct GriffinLimRun<'a> {
    vocoder: &'a GriffinLim,
    target: Array2<f32>,
    angles: Array2<Complex32>,
    previous: Array2<Complex32>,
    iteration: usize,
    last_change: Option<f32>,
    converged: bool,
}

impl GriffinLimRun<'_> {
    /// Run one iteration. Returns `false` once the iteration budget is spent
    /// or the early-exit tolerance was met, without doing any work.
    pub fn step(&mut self) -> bool {
        let config = &self.vocoder.config;
        if self.converged
            || self.iteration >= config.griffin_lim_iterations
            || self.target.ncols() == 0
        {
            return false;
        }

        let stft = &self.vocoder.stft;
        let signal = stft.inverse(&self.estimate());
        let rebuilt = stft.forward(&signal);

        let change = if self.iteration > 0 {
            let total: f32 = Zip::from(&rebuilt)
                .and(&self.previous)
                .fold(0.0, |acc, r, p| acc + (r.norm() - p.norm()).abs());
            Some(total / rebuilt.len().max(1) as f32)
        } else {
            None
        };

        let alpha = config.momentum / (1.0 + config.momentum);
        Zip::from(&mut self.angles)
            .and(&rebuilt)
            .and(&self.previous)
            .for_each(|angle, &r, &p| {
                let accelerated = r - p * alpha;
                let norm = accelerated.norm();
                *angle = if norm > PHASE_EPS {
                    accelerated / norm
                } else {
                    Complex32::new(1.0, 0.0)
                };
            });
        self.previous = rebuilt;
        self.iteration += 1;
        self.last_change = change;

        if let (Some(tol), Some(change)) = (config.tolerance, change) {
            if change < tol {
                tracing::debug!(iteration = self.iteration, change, "Griffin-Lim converged early");
                self.converged = true;
            }
        }
        true
    }

    /// Current complex estimate: target magnitude with the current phase.
    pub fn estimate(&self) -> Array2<Complex32> {
        Zip::from(&self.target)
            .and(&self.angles)
            .map_collect(|&m, &a| a * m)
    }

    pub fn target(&self) -> &Array2<f32> {
        &self.target
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Mean absolute change between the last two rebuilt magnitudes.
    pub fn last_change(&self) -> Option<f32> {
        self.last_change
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Final inverse transform of the current estimate.
    pub fn finish(self) -> Vec<f32> {
        tracing::trace!(iterations = self.iteration, "Griffin-Lim finished");
        self.vocoder.stft.inverse(&self.estimate())
    }
}

/// `‖ |STFT(y)| − S ‖_F / ‖S‖_F`, comparing the frames both cover.
pub fn spectral_convergence(stft: &Stft, target: &Array2<f32>, waveform: &[f32]) -> f32 {
    let actual = stft.magnitude(waveform);
    let frames = actual.ncols().min(target.ncols());
    let bins = actual.nrows().min(target.nrows());

    let mut diff = 0.0f64;
    let mut norm = 0.0f64;
    for k in 0..bins {
        for t in 0..frames {
            let s = target[[k, t]] as f64;
            let d = actual[[k, t]] as f64 - s;
            diff += d * d;
            norm += s * s;
        }
    }
    if norm == 0.0 {
        return diff.sqrt() as f32;
    }
    (diff.sqrt() / norm.sqrt()) as f32
}
