//! Decoder configuration and graph tensor names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How padded encoder positions are presented to the decode-step graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskEncoding {
    /// `bool`, `true` marks a padded position. What the NVIDIA export expects.
    #[default]
    Bool,
    /// `f32`, `0` for valid positions and `-inf` for padded ones.
    Additive,
}

/// What the decode-step graph emits as its stop token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopTokenKind {
    /// Raw logit; the sigmoid is applied here because the export drops it.
    #[default]
    Logit,
    Probability,
}

/// Value fed as the encoder's `plen` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlenPolicy {
    /// The padded length. Traced encoders are specialised to it.
    #[default]
    Padded,
    /// The number of real symbols.
    Valid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderNames {
    pub phonemes: String,
    pub plen: String,
    pub memory: String,
    pub processed_memory: String,
}

impl Default for EncoderNames {
    fn default() -> Self {
        Self {
            phonemes: "sequences".into(),
            plen: "sequence_lengths".into(),
            memory: "memory".into(),
            processed_memory: "processed_memory".into(),
        }
    }
}

/// Decode-step tensor names. Each recurrent output is named
/// `output_prefix + <input name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderNames {
    pub decoder_input: String,
    pub attention_hidden: String,
    pub attention_cell: String,
    pub decoder_hidden: String,
    pub decoder_cell: String,
    pub attention_weights: String,
    pub attention_weights_cum: String,
    pub attention_context: String,
    pub memory: String,
    pub processed_memory: String,
    pub mask: String,
    pub decoder_output: String,
    pub stop_token: String,
    pub output_prefix: String,
}

impl DecoderNames {
    pub fn output_for(&self, input: &str) -> String {
        format!("{}{}", self.output_prefix, input)
    }

    /// Every input the decode-step graph must declare.
    pub fn inputs(&self) -> [&str; 11] {
        [
            &self.decoder_input,
            &self.attention_hidden,
            &self.attention_cell,
            &self.decoder_hidden,
            &self.decoder_cell,
            &self.attention_weights,
            &self.attention_weights_cum,
            &self.attention_context,
            &self.memory,
            &self.processed_memory,
            &self.mask,
        ]
    }
}

impl Default for DecoderNames {
    fn default() -> Self {
        Self {
            decoder_input: "decoder_input".into(),
            attention_hidden: "attention_hidden".into(),
            attention_cell: "attention_cell".into(),
            decoder_hidden: "decoder_hidden".into(),
            decoder_cell: "decoder_cell".into(),
            attention_weights: "attention_weights".into(),
            attention_weights_cum: "attention_weights_cum".into(),
            attention_context: "attention_context".into(),
            memory: "memory".into(),
            processed_memory: "processed_memory".into(),
            mask: "mask".into(),
            decoder_output: "decoder_output".into(),
            stop_token: "gate_prediction".into(),
            output_prefix: "out_".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostnetNames {
    pub input: String,
    pub output: String,
}

impl Default for PostnetNames {
    fn default() -> Self {
        Self {
            input: "mel_outputs".into(),
            output: "mel_outputs_postnet".into(),
        }
    }
}

/// Tensor names for the three graphs, defaulting to the NVIDIA export.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorNames {
    pub encoder: EncoderNames,
    pub decoder: DecoderNames,
    pub postnet: PostnetNames,
}

/// Tunables for encoding and the autoregressive decode loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Stop once the stop probability exceeds this.
    pub stop_threshold: f32,
    pub max_decoder_steps: usize,
    /// Fixed encoder input length; longer inputs are split into windows.
    pub max_input_len: usize,
    pub n_mels: usize,
    pub attention_rnn_dim: usize,
    pub decoder_rnn_dim: usize,
    pub mask: MaskEncoding,
    pub stop_token: StopTokenKind,
    pub plen: PlenPolicy,
    /// Wall-clock budget for one window's decode loop.
    pub max_decode_time_ms: Option<u64>,
    /// Keep per-step attention weights in the output.
    pub record_alignments: bool,
    pub tensor_names: TensorNames,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            stop_threshold: 0.5,
            max_decoder_steps: 1000,
            max_input_len: 100,
            n_mels: 80,
            attention_rnn_dim: 1024,
            decoder_rnn_dim: 1024,
            mask: MaskEncoding::Bool,
            stop_token: StopTokenKind::Logit,
            plen: PlenPolicy::Padded,
            max_decode_time_ms: None,
            record_alignments: false,
            tensor_names: TensorNames::default(),
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stop_threshold.is_nan() || self.stop_threshold <= 0.0 || self.stop_threshold >= 1.0
        {
            return Err(Error::InvalidConfig(format!(
                "stop_threshold ({}) must lie in (0, 1)",
                self.stop_threshold
            )));
        }
        for (name, value) in [
            ("max_decoder_steps", self.max_decoder_steps),
            ("max_input_len", self.max_input_len),
            ("n_mels", self.n_mels),
            ("attention_rnn_dim", self.attention_rnn_dim),
            ("decoder_rnn_dim", self.decoder_rnn_dim),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.max_decode_time_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "max_decode_time_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn max_decode_time(&self) -> Option<std::time::Duration> {
        self.max_decode_time_ms.map(std::time::Duration::from_millis)
    }
}
