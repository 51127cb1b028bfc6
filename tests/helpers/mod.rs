//! Test helpers and fixtures for murmur integration tests
//!
//! The exported Tacotron2 graphs are replaced by a scripted backend so the
//! whole pipeline (encoder, decode loop, postnet, Griffin-Lim, WAV) runs
//! without model files.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (magnitude substitution)
//! - `DSP_EPSILON` (1e-4): STFT round trips
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use murmur::core::{InferenceError, LoadError, Tensor};
use murmur::prelude::*;
use murmur::tacotron::{MaskEncoding, ModelPaths};
use murmur::{BackendCapabilities, BackendFactory, BackendKind, InferenceBackend, InferenceConfig, Session, TensorMap};
use std::path::Path;

/// Low sample rate keeps Griffin-Lim cheap in debug builds.
pub const TEST_SAMPLE_RATE: u32 = 8000;
pub const TEST_N_MELS: usize = 8;
pub const TEST_RNN_DIM: usize = 6;
pub const TEST_EMBEDDING_DIM: usize = 4;
pub const TEST_CAPACITY: usize = 16;
/// Decoder steps the scripted graph spends on each input symbol.
pub const FRAMES_PER_SYMBOL: usize = 6;

/// How the scripted decode-step graph behaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    /// Never raise the stop token.
    pub never_stop: bool,
    /// Fail every run from this zero-based step on.
    pub fail_from: Option<usize>,
}

/// Small, fast configuration pointing at a directory that need not exist.
pub fn test_config() -> SynthesisConfig {
    let mut config = SynthesisConfig {
        sample_rate: TEST_SAMPLE_RATE,
        ..Default::default()
    };
    config.models.dir = "fake-models".into();
    config.decoder.n_mels = TEST_N_MELS;
    config.decoder.attention_rnn_dim = TEST_RNN_DIM;
    config.decoder.decoder_rnn_dim = TEST_RNN_DIM;
    config.decoder.max_input_len = TEST_CAPACITY;
    config.decoder.max_decoder_steps = 500;
    config.vocoder.n_fft = 64;
    config.vocoder.win_length = 64;
    config.vocoder.hop_length = 16;
    config.vocoder.fmax = Some(4000.0);
    config.vocoder.griffin_lim_iterations = 8;
    config
}

/// Factory serving the scripted graphs.
pub fn scripted_backend(script: Script) -> BackendFactory {
    Box::new(move |config| Ok(Box::new(ScriptedBackend { config, script }) as Box<dyn InferenceBackend>))
}

/// Build a synthesizer over the scripted graphs.
pub fn test_synth(script: Script) -> Synthesizer {
    test_synth_with(test_config(), script)
}

pub fn test_synth_with(config: SynthesisConfig, script: Script) -> Synthesizer {
    Synthesizer::builder()
        .config(config)
        .backend(scripted_backend(script))
        .build()
        .expect("Failed to create test synthesizer")
}

pub fn phones(text: &str) -> Vec<Symbol> {
    Symbol::parse_phones(text).expect("valid phone string")
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f32], min_rms: f32) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

// =============================================================================
// Scripted graphs
// =============================================================================

struct ScriptedBackend {
    config: InferenceConfig,
    script: Script,
}

impl InferenceBackend for ScriptedBackend {
    fn load(&self, path: &Path) -> Result<Box<dyn Session>, LoadError> {
        let graph = match path.file_name().and_then(|n| n.to_str()) {
            Some(ModelPaths::ENCODER_FILE) => Graph::Encoder,
            Some(ModelPaths::DECODER_FILE) => Graph::Decoder(self.script),
            Some(ModelPaths::POSTNET_FILE) => Graph::Postnet,
            _ => return Err(LoadError::Missing(path.to_path_buf())),
        };
        Ok(Box::new(ScriptedSession::new(graph)))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "scripted".into(),
            kind: BackendKind::Interpreted,
            dynamic_shapes: true,
            graph_optimization: false,
        }
    }

    fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

#[derive(Clone, Copy)]
enum Graph {
    Encoder,
    Decoder(Script),
    Postnet,
}

struct ScriptedSession {
    graph: Graph,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

const RECURRENT: [&str; 5] = [
    "attention_hidden",
    "attention_cell",
    "decoder_hidden",
    "decoder_cell",
    "attention_context",
];

impl ScriptedSession {
    fn new(graph: Graph) -> Self {
        let (inputs, outputs): (Vec<&str>, Vec<String>) = match graph {
            Graph::Encoder => (
                vec!["sequences", "sequence_lengths"],
                vec!["memory".into(), "processed_memory".into()],
            ),
            Graph::Decoder(_) => {
                let mut outputs: Vec<String> =
                    vec!["decoder_output".into(), "gate_prediction".into()];
                outputs.extend(RECURRENT.iter().map(|n| format!("out_{}", n)));
                outputs.push("out_attention_weights".into());
                (
                    vec![
                        "decoder_input",
                        "attention_hidden",
                        "attention_cell",
                        "decoder_hidden",
                        "decoder_cell",
                        "attention_weights",
                        "attention_weights_cum",
                        "attention_context",
                        "memory",
                        "processed_memory",
                        "mask",
                    ],
                    outputs,
                )
            }
            Graph::Postnet => (vec!["mel_outputs"], vec!["mel_outputs_postnet".into()]),
        };
        Self {
            graph,
            inputs: inputs.into_iter().map(String::from).collect(),
            outputs,
        }
    }

    fn encode(inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        let ids = inputs.require("sequences")?.as_i64()?;
        let t = ids.len();
        let embed = |width: usize| {
            let data = ids
                .iter()
                .flat_map(|&id| (0..width).map(move |e| ((id as f32) * 0.37 + e as f32).sin()))
                .collect();
            Tensor::from_f32([1, t, width], data).expect("encoder output shape")
        };
        let mut out = TensorMap::new();
        out.insert("memory", embed(TEST_EMBEDDING_DIM));
        out.insert("processed_memory", embed(3));
        Ok(out)
    }

    fn decode_step(script: Script, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        let step = inputs
            .require("attention_weights_cum")?
            .as_f32()?
            .iter()
            .sum::<f32>()
            .round() as usize;
        if script.fail_from.is_some_and(|k| step >= k) {
            return Err(InferenceError::Runtime(format!("scripted fault at step {}", step)));
        }

        let mask = inputs.require("mask")?;
        let valid = match mask.as_bool() {
            Ok(padded) => padded.iter().filter(|p| !**p).count(),
            Err(_) => mask.as_f32()?.iter().filter(|v| v.is_finite()).count(),
        }
        .max(1);
        let max_len = mask.len();

        // One-hot attention on the symbol being spoken.
        let position = (step / FRAMES_PER_SYMBOL).min(valid - 1);
        let mut weights = vec![0.0f32; max_len];
        weights[position] = 1.0;

        let memory = inputs.require("memory")?;
        let width = memory.shape()[2];
        let context: Vec<f32> = memory.as_f32()?[position * width..(position + 1) * width].to_vec();

        // Log-mel frame: a formant-ish bump that moves with the attended symbol.
        let frame: Vec<f32> = (0..TEST_N_MELS)
            .map(|m| {
                let centre = 2.0 + 2.0 * context[0];
                -2.0 - 0.5 * (m as f32 - centre).powi(2)
            })
            .collect();

        let stop = if !script.never_stop && step + 1 >= valid * FRAMES_PER_SYMBOL {
            8.0
        } else {
            -8.0
        };

        let mut out = TensorMap::new();
        out.insert("decoder_output", Tensor::from_f32([1, TEST_N_MELS], frame).expect("frame"));
        out.insert("gate_prediction", Tensor::from_f32([1, 1], vec![stop]).expect("gate"));
        for name in RECURRENT.iter().take(4) {
            let current = inputs.require(name)?;
            let next = current.as_f32()?.iter().map(|v| (v + 0.1).tanh()).collect();
            out.insert(
                format!("out_{}", name),
                Tensor::from_f32(current.shape().to_vec(), next).expect("state"),
            );
        }
        out.insert(
            "out_attention_context",
            Tensor::from_f32([1, width], context).expect("context"),
        );
        out.insert(
            "out_attention_weights",
            Tensor::from_f32([1, max_len], weights).expect("weights"),
        );
        Ok(out)
    }

    fn postnet(inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        let mel = inputs.require("mel_outputs")?;
        let refined = mel.as_f32()?.iter().map(|v| v * 0.9).collect();
        let mut out = TensorMap::new();
        out.insert(
            "mel_outputs_postnet",
            Tensor::from_f32(mel.shape().to_vec(), refined).expect("postnet shape"),
        );
        Ok(out)
    }
}

impl Session for ScriptedSession {
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        murmur::core::check_inputs(&self.inputs, inputs)?;
        match self.graph {
            Graph::Encoder => Self::encode(inputs),
            Graph::Decoder(script) => Self::decode_step(script, inputs),
            Graph::Postnet => Self::postnet(inputs),
        }
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

/// Configuration using the additive mask encoding.
pub fn additive_mask_config() -> SynthesisConfig {
    let mut config = test_config();
    config.decoder.mask = MaskEncoding::Additive;
    config
}
