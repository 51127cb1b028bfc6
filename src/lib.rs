//! # murmur - Tacotron2 text-to-speech
//!
//! Runs an exported Tacotron2 model (encoder, decode-step and postnet graphs)
//! and turns its mel spectrogram into audio with Griffin-Lim.
//!
//! ## Architecture
//!
//! murmur is an umbrella crate that coordinates:
//! - **murmur-core** - Tensors, the inference backend traits, error taxonomy
//! - **murmur-tract** - Interpreted backend (pure Rust)
//! - **murmur-ort** - Native backend (ONNX Runtime)
//! - **murmur-tacotron** - Symbols, segmentation, encoder, decode loop, postnet
//! - **murmur-vocoder** - Mel filterbank, STFT, Griffin-Lim
//!
//! ## Quick Start
//!
//! ```ignore
//! use murmur::prelude::*;
//!
//! murmur::setup_logging(None);
//!
//! let synth = Synthesizer::builder()
//!     .config_file("murmur.toml")?
//!     .build()?;
//!
//! let out = synth.synthesize(&Symbol::parse_phones("K AE1 T")?)?;
//! out.waveform.write_wav("cat.wav")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `interpreted` (default) - tract backend
//! - `native` - ONNX Runtime backend
//! - `wav` (default) - `Waveform::write_wav`

/// Re-export of murmur-core for direct access
pub use murmur_core as core;

/// Re-export of the acoustic model crate
pub use murmur_tacotron as tacotron;

/// Re-export of the vocoder crate
pub use murmur_vocoder as vocoder;

#[cfg(feature = "interpreted")]
pub use murmur_tract::{tract_backend_factory, TractBackend};

#[cfg(feature = "native")]
pub use murmur_ort::{ort_backend_factory, OrtBackend};

pub use murmur_core::{
    BackendCapabilities, BackendFactory, BackendKind, CancelToken, InferenceBackend,
    InferenceConfig, Session, Tensor, TensorMap,
};
pub use murmur_tacotron::{
    DecodeControl, DecoderConfig, MelSequence, ModelPaths, StopReason, Symbol, SymbolTable,
    WindowSummary,
};
pub use murmur_vocoder::{GriffinLim, VocoderConfig};

mod builder;
mod config;
mod engine;
mod error;
mod logging;
mod waveform;

pub use builder::{backend_factory_for, SynthesizerBuilder};
pub use config::{ModelConfig, SynthesisConfig};
pub use engine::{Chunk, SynthesisOutput, Synthesizer};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use waveform::Waveform;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        CancelToken, Chunk, DecodeControl, StopReason, Symbol, SynthesisConfig, SynthesisOutput,
        Synthesizer, SynthesizerBuilder, Waveform,
    };
    pub use std::time::Duration;
}
