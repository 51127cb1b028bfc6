//! The three Tacotron2 graphs wired together.

use crate::config::DecoderConfig;
use crate::decoder::{DecodeControl, Decoder, MelSequence, StopReason};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::postnet::Postnet;
use crate::sequence::{segment, PhonemeSequence};
use crate::symbols::{Symbol, SymbolTable};
use murmur_core::{InferenceBackend, Session};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Graph artifacts on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub encoder: PathBuf,
    pub decoder: PathBuf,
    pub postnet: Option<PathBuf>,
}

impl ModelPaths {
    pub const ENCODER_FILE: &'static str = "encoder.onnx";
    pub const DECODER_FILE: &'static str = "decoder_iter.onnx";
    pub const POSTNET_FILE: &'static str = "postnet.onnx";

    /// The usual export layout: `encoder.onnx`, `decoder_iter.onnx` and
    /// `postnet.onnx` side by side.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            encoder: dir.join(Self::ENCODER_FILE),
            decoder: dir.join(Self::DECODER_FILE),
            postnet: Some(dir.join(Self::POSTNET_FILE)),
        }
    }

    pub fn without_postnet(mut self) -> Self {
        self.postnet = None;
        self
    }
}

/// Per-window decode report.
#[derive(Debug, Clone)]
pub struct WindowSummary {
    /// Real symbols in the window.
    pub input_len: usize,
    pub steps: usize,
    pub stop_reason: StopReason,
    pub alignments: Option<Vec<Vec<f32>>>,
}

/// Mel frames for a whole utterance, windows concatenated in order.
#[derive(Debug, Clone)]
pub struct MelOutput {
    pub mel: MelSequence,
    pub windows: Vec<WindowSummary>,
}

impl MelOutput {
    /// Whether any window stopped on `max_decoder_steps`.
    pub fn truncated(&self) -> bool {
        self.windows
            .iter()
            .any(|w| w.stop_reason == StopReason::MaxSteps)
    }

    pub fn stop_reasons(&self) -> impl Iterator<Item = StopReason> + '_ {
        self.windows.iter().map(|w| w.stop_reason)
    }
}

/// Tacotron2 acoustic model: encoder, decode-step graph and optional postnet.
///
/// Holds the sessions exclusively; `infer` takes `&mut self`.
pub struct Tacotron2 {
    table: SymbolTable,
    encoder: Encoder,
    decoder: Decoder,
    postnet: Option<Postnet>,
    config: DecoderConfig,
}

impl Tacotron2 {
    /// Validate `config`, then load every artifact through `backend`.
    pub fn load(
        backend: &dyn InferenceBackend,
        paths: &ModelPaths,
        config: DecoderConfig,
    ) -> Result<Self> {
        config.validate()?;
        let backend_name = backend.capabilities().name;

        let load = |path: &Path| -> Result<Box<dyn Session>> {
            let started = Instant::now();
            let session = backend.load(path)?;
            tracing::info!(
                path = %path.display(),
                backend = %backend_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Loaded graph"
            );
            Ok(session)
        };

        let encoder = load(paths.encoder.as_path())?;
        let decoder = load(paths.decoder.as_path())?;
        let postnet = paths.postnet.as_deref().map(load).transpose()?;
        Self::from_sessions(encoder, decoder, postnet, config)
    }

    /// Wire already-loaded sessions together.
    pub fn from_sessions(
        encoder: Box<dyn Session>,
        decoder: Box<dyn Session>,
        postnet: Option<Box<dyn Session>>,
        config: DecoderConfig,
    ) -> Result<Self> {
        config.validate()?;
        let names = config.tensor_names.clone();
        Ok(Self {
            table: SymbolTable::tacotron2(),
            encoder: Encoder::new(encoder, names.encoder, config.plen),
            decoder: Decoder::new(decoder, config.clone())?,
            postnet: postnet.map(|session| Postnet::new(session, names.postnet)),
            config,
        })
    }

    /// Replace the vocabulary, for exports trained on a different symbol set.
    pub fn with_symbol_table(mut self, table: SymbolTable) -> Self {
        self.table = table;
        self
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn has_postnet(&self) -> bool {
        self.postnet.is_some()
    }

    /// Symbols to mel. Symbols without an id are skipped; nothing left means
    /// an empty output.
    pub fn infer(&mut self, symbols: &[Symbol], control: &DecodeControl) -> Result<MelOutput> {
        let (known, ids): (Vec<Symbol>, Vec<i64>) = symbols
            .iter()
            .filter_map(|s| match self.table.id_of(s) {
                Some(id) => Some((*s, id)),
                None => {
                    tracing::warn!(symbol = %s, "No model id for symbol, skipping");
                    None
                }
            })
            .unzip();
        self.run_windows(&known, &ids, control)
    }

    /// Model ids to mel. Every id must be in the vocabulary.
    pub fn infer_ids(&mut self, ids: &[i64], control: &DecodeControl) -> Result<MelOutput> {
        let symbols = ids
            .iter()
            .map(|&id| {
                self.table
                    .get(id)
                    .ok_or_else(|| Error::UnknownSymbol(format!("id {}", id)))
            })
            .collect::<Result<Vec<_>>>()?;
        self.run_windows(&symbols, ids, control)
    }

    fn run_windows(
        &mut self,
        symbols: &[Symbol],
        ids: &[i64],
        control: &DecodeControl,
    ) -> Result<MelOutput> {
        let capacity = self.config.max_input_len;
        let windows = segment(symbols, capacity);
        if windows.len() > 1 {
            tracing::debug!(
                symbols = symbols.len(),
                windows = windows.len(),
                capacity,
                "Split utterance into windows"
            );
        }

        let mut output = MelOutput {
            mel: MelSequence::new(self.config.n_mels),
            windows: Vec::with_capacity(windows.len()),
        };
        for range in windows {
            let sequence = PhonemeSequence::new(ids[range].to_vec(), capacity, self.table.len())?;
            let encoded = self.encoder.encode(&sequence)?;
            let decoded = self.decoder.decode(&encoded, control)?;
            let mel = match self.postnet.as_mut() {
                Some(postnet) => postnet.refine(&decoded.mel)?,
                None => decoded.mel,
            };

            output.mel.extend(&mel);
            output.windows.push(WindowSummary {
                input_len: sequence.len(),
                steps: decoded.steps,
                stop_reason: decoded.stop_reason,
                alignments: decoded.alignments,
            });
        }
        Ok(output)
    }
}
