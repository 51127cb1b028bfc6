//! Tacotron2 orchestration for murmur.
//!
//! Drives the three exported graphs of a Tacotron2 model through any
//! [`InferenceBackend`](murmur_core::InferenceBackend):
//!
//! - [`Encoder`]: padded phoneme ids to attention memory, one call
//! - [`Decoder`]: the autoregressive loop, one decode-step call per mel frame,
//!   with the recurrent state held in [`DecoderState`]
//! - [`Postnet`]: optional refinement of the decoded mel
//!
//! [`Tacotron2`] wires them together, including the [`SymbolTable`] lookup and
//! the segmentation of inputs longer than the encoder capacity.
//!
//! ```rust,ignore
//! let mut model = Tacotron2::load(backend.as_ref(), &ModelPaths::from_dir("models"), DecoderConfig::default())?;
//! let symbols = Symbol::parse_phones("HH AH0 L OW1")?;
//! let out = model.infer(&symbols, &DecodeControl::default())?;
//! assert!(!out.truncated());
//! ```

mod config;
mod decoder;
mod encoder;
mod error;
mod model;
mod postnet;
mod sequence;
mod state;
pub mod symbols;

#[cfg(test)]
mod testing;

pub use config::{
    DecoderConfig, DecoderNames, EncoderNames, MaskEncoding, PlenPolicy, PostnetNames,
    StopTokenKind, TensorNames,
};
pub use decoder::{sigmoid, DecodeControl, DecodeOutput, Decoder, MelSequence, StopReason};
pub use encoder::{Encoder, EncoderOutput};
pub use error::{Error, Result};
pub use model::{MelOutput, ModelPaths, Tacotron2, WindowSummary};
pub use postnet::Postnet;
pub use sequence::{segment, PhonemeSequence, PAD_ID};
pub use state::{build_mask, DecoderState, StepOutput};
pub use symbols::{Arpa, Phone, Punctuation, Stress, Symbol, SymbolTable};
