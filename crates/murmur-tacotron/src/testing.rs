//! Deterministic stand-ins for the three exported graphs.
//!
//! The fake decoder walks its attention across the valid encoder positions,
//! `FRAMES_PER_SYMBOL` steps per symbol, and raises the stop token once it
//! has covered them all. It keeps no state of its own: the step index is read
//! back from the cumulative attention, which gains one unit of mass per step.
//! Outputs depend on the memory and the previous frame so state threading
//! errors show up as different mel frames.

use crate::config::{DecoderConfig, DecoderNames, EncoderNames, PostnetNames};
use crate::encoder::EncoderOutput;
use murmur_core::{
    BackendCapabilities, BackendKind, CancelToken, DType, InferenceBackend, InferenceConfig,
    InferenceError, LoadError, Session, Tensor, TensorMap,
};
use std::path::Path;
use std::time::Duration;

pub const N_MELS: usize = 8;
pub const RNN_DIM: usize = 8;
pub const EMBEDDING_DIM: usize = 4;
pub const ATTENTION_DIM: usize = 3;
pub const MAX_INPUT_LEN: usize = 16;
pub const FRAMES_PER_SYMBOL: usize = 8;
pub const POSTNET_OFFSET: f32 = 0.25;

pub fn small_config() -> DecoderConfig {
    DecoderConfig {
        max_decoder_steps: 500,
        max_input_len: MAX_INPUT_LEN,
        n_mels: N_MELS,
        attention_rnn_dim: RNN_DIM,
        decoder_rnn_dim: RNN_DIM,
        ..Default::default()
    }
}

fn memory_for(ids: &[i64], max_len: usize, width: usize) -> Tensor {
    let mut data = Vec::with_capacity(max_len * width);
    for t in 0..max_len {
        let id = ids.get(t).copied().unwrap_or(0) as f32;
        for e in 0..width {
            data.push(id / 148.0 + 0.01 * e as f32);
        }
    }
    Tensor::from_f32([1, max_len, width], data).unwrap()
}

/// Encoder output for `valid_len` symbols padded to `MAX_INPUT_LEN`.
pub fn encoded_for(valid_len: usize) -> EncoderOutput {
    let ids: Vec<i64> = (0..valid_len as i64).map(|i| 40 + i).collect();
    EncoderOutput::new(
        memory_for(&ids, MAX_INPUT_LEN, EMBEDDING_DIM),
        memory_for(&ids, MAX_INPUT_LEN, ATTENTION_DIM),
        valid_len,
    )
    .unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct FakeEncoder {
    pub fail: bool,
}

struct FakeEncoderSession {
    script: FakeEncoder,
    names: EncoderNames,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

pub fn fake_encoder(script: FakeEncoder) -> Box<dyn Session> {
    let names = EncoderNames::default();
    Box::new(FakeEncoderSession {
        script,
        inputs: vec![names.phonemes.clone(), names.plen.clone()],
        outputs: vec![names.memory.clone(), names.processed_memory.clone()],
        names,
    })
}

impl Session for FakeEncoderSession {
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        murmur_core::check_inputs(&self.inputs, inputs)?;
        if self.script.fail {
            return Err(InferenceError::Runtime("encoder fault".into()));
        }
        let ids = inputs.require(&self.names.phonemes)?.as_i64()?;
        let mut out = TensorMap::new();
        out.insert(
            self.names.memory.as_str(),
            memory_for(ids, ids.len(), EMBEDDING_DIM),
        );
        out.insert(
            self.names.processed_memory.as_str(),
            memory_for(ids, ids.len(), ATTENTION_DIM),
        );
        Ok(out)
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

/// Behaviour switches for the fake decode-step graph.
#[derive(Debug, Clone, Default)]
pub struct FakeDecoder {
    /// Keep the stop logit low forever.
    pub never_stop: bool,
    /// Stop after this many steps instead of after covering the input.
    pub stop_after: Option<usize>,
    /// Emit a probability rather than a logit.
    pub emit_probability: bool,
    /// Fail the run with this zero-based step index.
    pub fail_at: Option<usize>,
    /// Cancel the token while running this step.
    pub cancel_at: Option<(usize, CancelToken)>,
    pub step_delay: Option<Duration>,
    /// Leave this input out of the declared inputs.
    pub drop_input: Option<&'static str>,
}

struct FakeDecoderSession {
    script: FakeDecoder,
    names: DecoderNames,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

pub fn fake_decoder(script: FakeDecoder) -> Box<dyn Session> {
    let names = DecoderNames::default();
    let inputs: Vec<String> = names
        .inputs()
        .iter()
        .filter(|name| script.drop_input != Some(**name))
        .map(|name| name.to_string())
        .collect();
    let mut outputs = vec![names.decoder_output.clone(), names.stop_token.clone()];
    outputs.extend(
        names.inputs()[1..8]
            .iter()
            .map(|name| names.output_for(name)),
    );
    Box::new(FakeDecoderSession {
        script,
        names,
        inputs,
        outputs,
    })
}

/// Number of valid positions encoded in a mask of either encoding.
fn valid_len(mask: &Tensor) -> Result<usize, InferenceError> {
    Ok(match mask.dtype() {
        DType::Bool => mask.as_bool()?.iter().filter(|padded| !**padded).count(),
        _ => mask.as_f32()?.iter().filter(|v| v.is_finite()).count(),
    })
}

impl FakeDecoderSession {
    fn next_state(step: usize, inputs: &TensorMap, name: &str) -> Result<Tensor, InferenceError> {
        let current = inputs.require(name)?;
        let data = current
            .as_f32()?
            .iter()
            .enumerate()
            .map(|(i, v)| (0.5 * v + 0.01 * (step + i) as f32).tanh())
            .collect();
        Ok(Tensor::from_f32(current.shape().to_vec(), data).unwrap())
    }
}

impl Session for FakeDecoderSession {
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        murmur_core::check_inputs(&self.inputs, inputs)?;
        let names = &self.names;
        let cumulative: f32 = inputs.require(&names.attention_weights_cum)?.as_f32()?.iter().sum();
        let step = cumulative.round() as usize;
        if let Some(delay) = self.script.step_delay {
            std::thread::sleep(delay);
        }
        if self.script.fail_at == Some(step) {
            return Err(InferenceError::Runtime(format!("injected fault at step {}", step)));
        }
        if let Some((at, token)) = &self.script.cancel_at {
            if *at == step {
                token.cancel();
            }
        }

        let mask = inputs.require(&names.mask)?;
        let max_len = mask.len();
        let valid = valid_len(mask)?.max(1);

        // Gaussian bump over the valid positions only.
        let position = (step / FRAMES_PER_SYMBOL).min(valid - 1) as f32;
        let mut weights: Vec<f32> = (0..max_len)
            .map(|i| {
                if i < valid {
                    (-(i as f32 - position).powi(2)).exp()
                } else {
                    0.0
                }
            })
            .collect();
        let total: f32 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);

        let memory = inputs.require(&names.memory)?;
        let width = memory.shape()[2];
        let memory = memory.as_f32()?;
        let mut context = vec![0.0f32; width];
        for (t, w) in weights.iter().enumerate() {
            for (e, c) in context.iter_mut().enumerate() {
                *c += w * memory[t * width + e];
            }
        }

        let previous = inputs.require(&names.decoder_input)?.as_f32()?;
        let frame: Vec<f32> = (0..N_MELS)
            .map(|m| {
                let prev = previous.get(m).copied().unwrap_or(0.0);
                context[m % width] - 0.1 * m as f32 + 0.5 * prev - 4.0
            })
            .collect();

        let done = match self.script.stop_after {
            Some(n) => step + 1 >= n,
            None => step + 1 >= valid * FRAMES_PER_SYMBOL,
        };
        let stop = match (self.script.never_stop || !done, self.script.emit_probability) {
            (true, false) => -10.0,
            (false, false) => 10.0,
            (true, true) => 0.01,
            (false, true) => 0.99,
        };

        let mut out = TensorMap::new();
        out.insert(
            names.decoder_output.as_str(),
            Tensor::from_f32([1, N_MELS], frame).unwrap(),
        );
        out.insert(names.stop_token.as_str(), Tensor::from_f32([1, 1], vec![stop]).unwrap());
        for name in [
            &names.attention_hidden,
            &names.attention_cell,
            &names.decoder_hidden,
            &names.decoder_cell,
        ] {
            out.insert(names.output_for(name), Self::next_state(step, inputs, name)?);
        }
        out.insert(
            names.output_for(&names.attention_weights),
            Tensor::from_f32([1, max_len], weights).unwrap(),
        );
        out.insert(
            names.output_for(&names.attention_weights_cum),
            Tensor::zeros_f32([1, max_len]),
        );
        out.insert(
            names.output_for(&names.attention_context),
            Tensor::from_f32([1, width], context).unwrap(),
        );

        Ok(out)
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePostnet {
    /// Emit one frame more than it was given.
    pub extra_frame: bool,
}

struct FakePostnetSession {
    script: FakePostnet,
    names: PostnetNames,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

pub fn fake_postnet(script: FakePostnet) -> Box<dyn Session> {
    let names = PostnetNames::default();
    Box::new(FakePostnetSession {
        script,
        inputs: vec![names.input.clone()],
        outputs: vec![names.output.clone()],
        names,
    })
}

impl Session for FakePostnetSession {
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        murmur_core::check_inputs(&self.inputs, inputs)?;
        let mel = inputs.require(&self.names.input)?;
        let (n_mels, frames) = (mel.shape()[1], mel.shape()[2]);
        let refined = if self.script.extra_frame {
            Tensor::zeros_f32([1, n_mels, frames + 1])
        } else {
            let data = mel.as_f32()?.iter().map(|v| v + POSTNET_OFFSET).collect();
            Tensor::from_f32([1, n_mels, frames], data).unwrap()
        };
        let mut out = TensorMap::new();
        out.insert(self.names.output.as_str(), refined);
        Ok(out)
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

/// Serves the fakes by artifact file name.
pub struct FakeBackend {
    pub config: InferenceConfig,
    pub decoder: FakeDecoder,
}

impl FakeBackend {
    pub fn new(decoder: FakeDecoder) -> Self {
        Self {
            config: InferenceConfig::default(),
            decoder,
        }
    }
}

impl InferenceBackend for FakeBackend {
    fn load(&self, path: &Path) -> Result<Box<dyn Session>, LoadError> {
        match path.file_name().and_then(|n| n.to_str()) {
            Some("encoder.onnx") => Ok(fake_encoder(FakeEncoder::default())),
            Some("decoder_iter.onnx") => Ok(fake_decoder(self.decoder.clone())),
            Some("postnet.onnx") => Ok(fake_postnet(FakePostnet::default())),
            _ => Err(LoadError::Missing(path.to_path_buf())),
        }
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "fake".into(),
            kind: BackendKind::Interpreted,
            dynamic_shapes: true,
            graph_optimization: false,
        }
    }

    fn config(&self) -> &InferenceConfig {
        &self.config
    }
}
