//! Synthesis configuration: one TOML file for backend, model, decoder and vocoder.

use crate::error::{Error, Result};
use murmur_core::{BackendKind, InferenceConfig};
use murmur_tacotron::{DecoderConfig, ModelPaths};
use murmur_vocoder::VocoderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the graph artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `encoder.onnx`, `decoder_iter.onnx` and `postnet.onnx`.
    pub dir: PathBuf,
    pub encoder: Option<PathBuf>,
    pub decoder: Option<PathBuf>,
    pub postnet: Option<PathBuf>,
    pub use_postnet: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models/tacotron2"),
            encoder: None,
            decoder: None,
            postnet: None,
            use_postnet: true,
        }
    }
}

impl ModelConfig {
    /// Resolve artifact paths. Explicit entries win over `dir`.
    pub fn paths(&self) -> ModelPaths {
        let defaults = ModelPaths::from_dir(&self.dir);
        ModelPaths {
            encoder: self.encoder.clone().unwrap_or(defaults.encoder),
            decoder: self.decoder.clone().unwrap_or(defaults.decoder),
            postnet: if self.use_postnet {
                self.postnet.clone().or(defaults.postnet)
            } else {
                None
            },
        }
    }
}

/// Top-level configuration.
///
/// Every key is optional:
///
/// ```toml
/// inference_backend = "native"
/// sample_rate = 22050
///
/// [models]
/// dir = "models/tacotron2"
///
/// [decoder]
/// max_decoder_steps = 1000
///
/// [vocoder]
/// griffin_lim_iterations = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub inference_backend: BackendKind,
    pub sample_rate: u32,
    pub models: ModelConfig,
    pub inference: InferenceConfig,
    pub decoder: DecoderConfig,
    pub vocoder: VocoderConfig,
    /// Write each utterance's mel spectrogram here as `.npy`.
    pub dump_spectrogram: Option<PathBuf>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            inference_backend: BackendKind::Interpreted,
            sample_rate: 22050,
            models: ModelConfig::default(),
            inference: InferenceConfig::default(),
            decoder: DecoderConfig::default(),
            vocoder: VocoderConfig::default(),
            dump_spectrogram: None,
        }
    }
}

impl SynthesisConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded synthesis config");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Inference settings with the top-level backend choice applied.
    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            backend: self.inference_backend,
            ..self.inference.clone()
        }
    }

    /// Vocoder settings sharing `sample_rate` and `n_mels` with the rest.
    pub fn vocoder_config(&self) -> VocoderConfig {
        VocoderConfig {
            sample_rate: self.sample_rate,
            n_mels: self.decoder.n_mels,
            ..self.vocoder.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        if self.inference.intra_threads == Some(0) {
            return Err(Error::InvalidConfig(
                "inference.intra_threads must be positive when set".into(),
            ));
        }
        self.decoder.validate()?;
        self.vocoder_config().validate()?;
        Ok(())
    }
}
