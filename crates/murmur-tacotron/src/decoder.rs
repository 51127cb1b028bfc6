//! Autoregressive decode loop.
//!
//! The exported decode-step graph is stateless: every step is fed the full
//! recurrent state and returns the next one. This module owns that state and
//! drives the loop as an explicit state machine:
//!
//! ```text
//! Init --> Stepping --> Stopped(StopToken | MaxSteps)
//! ```
//!
//! Termination is guaranteed by `max_decoder_steps`. Hitting it is a normal
//! outcome, reported as [`StopReason::MaxSteps`] rather than an error.

use crate::config::{DecoderConfig, StopTokenKind};
use crate::encoder::EncoderOutput;
use crate::error::{Error, Result};
use crate::state::DecoderState;
use murmur_core::{CancelToken, InferenceError, Session, TensorMap};
use ndarray::Array2;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop probability crossed the threshold.
    StopToken,
    /// The step limit was reached first; the output may be cut short.
    MaxSteps,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopToken => f.write_str("stop token"),
            Self::MaxSteps => f.write_str("max steps"),
        }
    }
}

/// Append-only sequence of fixed-width mel frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MelSequence {
    n_mels: usize,
    /// Frame-major.
    data: Vec<f32>,
}

impl MelSequence {
    pub fn new(n_mels: usize) -> Self {
        Self {
            n_mels,
            data: Vec::new(),
        }
    }

    /// Build from `[n_mels, T]` channel-major data, as the postnet emits it.
    pub fn from_channel_major(n_mels: usize, data: &[f32]) -> Self {
        let frames = if n_mels == 0 { 0 } else { data.len() / n_mels };
        let mut out = Vec::with_capacity(frames * n_mels);
        for t in 0..frames {
            for m in 0..n_mels {
                out.push(data[m * frames + t]);
            }
        }
        Self { n_mels, data: out }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn frames(&self) -> usize {
        if self.n_mels == 0 {
            0
        } else {
            self.data.len() / self.n_mels
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Caller guarantees `frame.len() == n_mels`.
    pub fn push_frame(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.n_mels);
        self.data.extend_from_slice(frame);
    }

    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.n_mels)?;
        self.data.get(start..start + self.n_mels)
    }

    pub fn iter_frames(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.n_mels.max(1))
    }

    /// Append every frame of `other`. Channel counts must agree.
    pub fn extend(&mut self, other: &MelSequence) {
        debug_assert_eq!(self.n_mels, other.n_mels);
        self.data.extend_from_slice(&other.data);
    }

    /// `[n_mels, T]` channel-major copy.
    pub fn to_channel_major(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = vec![0.0; self.data.len()];
        for (t, frame) in self.iter_frames().enumerate() {
            for (m, &v) in frame.iter().enumerate() {
                out[m * frames + t] = v;
            }
        }
        out
    }

    /// `[n_mels, T]` matrix for the vocoder.
    pub fn to_array(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.n_mels, self.frames()), |(m, t)| {
            self.data[t * self.n_mels + m]
        })
    }

    pub fn as_frame_major(&self) -> &[f32] {
        &self.data
    }
}

/// Result of decoding one window.
#[derive(Debug, Clone)]
pub struct DecodeOutput {
    pub mel: MelSequence,
    pub stop_reason: StopReason,
    pub steps: usize,
    /// Attention weights per step, when recording was enabled.
    pub alignments: Option<Vec<Vec<f32>>>,
}

/// Per-call controls checked between steps.
#[derive(Debug, Clone, Default)]
pub struct DecodeControl {
    pub cancel: Option<CancelToken>,
    /// Overrides `max_decode_time_ms` when set.
    pub time_budget: Option<Duration>,
}

impl DecodeControl {
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel: Some(cancel),
            time_budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Stepping,
    Stopped(StopReason),
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Drives the decode-step graph.
pub struct Decoder {
    session: Box<dyn Session>,
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(session: Box<dyn Session>, config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        let declared = session.input_names();
        let names = &config.tensor_names.decoder;
        if let Some(missing) = names
            .inputs()
            .iter()
            .find(|name| !declared.iter().any(|d| d == *name))
        {
            return Err(Error::InvalidConfig(format!(
                "decode-step graph does not declare input '{}'",
                missing
            )));
        }
        Ok(Self { session, config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode one window to completion.
    pub fn decode(&mut self, encoded: &EncoderOutput, control: &DecodeControl) -> Result<DecodeOutput> {
        let names = &self.config.tensor_names.decoder;
        let budget = control.time_budget.or_else(|| self.config.max_decode_time());
        let started = Instant::now();

        let mut state = DecoderState::new(&self.config, encoded)?;
        let mut inputs = TensorMap::with_capacity(names.inputs().len());
        let mut mel = MelSequence::new(self.config.n_mels);
        let mut alignments = self.config.record_alignments.then(Vec::new);

        let mut phase = Phase::Init;
        let reason = loop {
            phase = match phase {
                Phase::Init => {
                    // Memory and mask stay fixed for the whole window.
                    inputs.insert(names.memory.as_str(), encoded.memory().clone());
                    inputs.insert(
                        names.processed_memory.as_str(),
                        encoded.processed_memory().clone(),
                    );
                    tracing::trace!(
                        max_len = encoded.max_len(),
                        valid_len = encoded.valid_len(),
                        "Decoder initialised"
                    );
                    Phase::Stepping
                }
                Phase::Stepping => {
                    let step = mel.frames();

                    if control.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                        tracing::info!(step, "Decoding cancelled");
                        return Err(Error::Cancelled { step });
                    }
                    if let Some(budget) = budget {
                        let elapsed = started.elapsed();
                        if elapsed > budget {
                            tracing::warn!(step, ?elapsed, "Decoding exceeded its time budget");
                            return Err(Error::DeadlineExceeded { step, elapsed });
                        }
                    }

                    state.write_inputs(names, &mut inputs);
                    let decode_err = |source: InferenceError| Error::Decode { step, source };
                    let outputs = self.session.run(&inputs).map_err(decode_err)?;
                    let output = state.absorb(names, outputs).map_err(decode_err)?;

                    mel.push_frame(&output.frame);
                    if let Some(alignments) = alignments.as_mut() {
                        alignments.push(output.attention_weights);
                    }

                    let probability = match self.config.stop_token {
                        StopTokenKind::Logit => sigmoid(output.stop_value),
                        StopTokenKind::Probability => output.stop_value,
                    };
                    tracing::debug!(step, probability, "Decoder step");

                    // A stop token on the last allowed step still counts as a stop.
                    if probability > self.config.stop_threshold {
                        Phase::Stopped(StopReason::StopToken)
                    } else if mel.frames() >= self.config.max_decoder_steps {
                        Phase::Stopped(StopReason::MaxSteps)
                    } else {
                        Phase::Stepping
                    }
                }
                Phase::Stopped(reason) => break reason,
            };
        };

        let steps = mel.frames();
        match reason {
            StopReason::StopToken => tracing::info!(steps, reason = %reason, "Decoding finished"),
            StopReason::MaxSteps => tracing::warn!(
                steps,
                "Decoder hit max_decoder_steps without a stop token; output may be truncated"
            ),
        }

        Ok(DecodeOutput {
            mel,
            stop_reason: reason,
            steps,
            alignments,
        })
    }
}
