//! Centralized error type for the murmur umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Load(#[from] murmur_core::LoadError),

    #[error("Model: {0}")]
    Model(#[from] murmur_tacotron::Error),

    #[error("Vocoder: {0}")]
    Vocoder(#[from] murmur_vocoder::VocoderError),

    #[error("Config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[cfg(feature = "wav")]
    #[error("WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("Spectrogram dump: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failed a single utterance rather than the engine.
    pub fn is_per_utterance(&self) -> bool {
        matches!(
            self,
            Error::Model(
                murmur_tacotron::Error::Encode(_)
                    | murmur_tacotron::Error::Decode { .. }
                    | murmur_tacotron::Error::Postnet(_)
                    | murmur_tacotron::Error::Shape(_)
                    | murmur_tacotron::Error::UnknownSymbol(_)
                    | murmur_tacotron::Error::Cancelled { .. }
                    | murmur_tacotron::Error::DeadlineExceeded { .. }
            ) | Error::Vocoder(murmur_vocoder::VocoderError::Shape(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
