//! Griffin-Lim vocoder for murmur.
//!
//! Turns a decoder mel spectrogram into audio without a neural vocoder:
//!
//! 1. decompress the log mel and project it to linear frequency with the
//!    pseudo-inverse of the mel filterbank
//! 2. start from a seeded random phase
//! 3. alternate ISTFT/STFT, keeping the target magnitude each pass
//! 4. one final ISTFT
//!
//! ```rust,ignore
//! let vocoder = GriffinLim::new(VocoderConfig::default())?;
//! let samples = vocoder.infer(&mel)?; // mel: [n_mels, frames]
//! ```

mod config;
mod error;
pub mod filterbank;
mod griffin_lim;
mod projection;
pub mod stft;

pub use config::VocoderConfig;
pub use error::{Result, VocoderError};
pub use filterbank::{load_filterbank, slaney_filterbank};
pub use griffin_lim::{spectral_convergence, GriffinLim, GriffinLimRun};
pub use projection::MelProjection;
pub use stft::Stft;
