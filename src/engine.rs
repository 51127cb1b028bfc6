//! Synthesizer that runs symbols through the acoustic model and the vocoder.

use crate::config::SynthesisConfig;
use crate::waveform::Waveform;
use crate::Result;
use murmur_core::BackendCapabilities;
use murmur_tacotron::{DecodeControl, MelOutput, MelSequence, StopReason, Symbol, Tacotron2, WindowSummary};
use murmur_vocoder::GriffinLim;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// One unit of upstream input.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// Joins the current utterance.
    Symbols(Vec<Symbol>),
    /// Ends the current utterance and inserts silence.
    Break(Duration),
}

impl From<Vec<Symbol>> for Chunk {
    fn from(symbols: Vec<Symbol>) -> Self {
        Chunk::Symbols(symbols)
    }
}

impl From<Duration> for Chunk {
    fn from(pause: Duration) -> Self {
        Chunk::Break(pause)
    }
}

/// Audio plus what the decoder reported while producing it.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub waveform: Waveform,
    /// One entry per decoded window, across every utterance.
    pub windows: Vec<WindowSummary>,
    pub mel_frames: usize,
}

impl SynthesisOutput {
    fn empty(sample_rate: u32) -> Self {
        Self {
            waveform: Waveform::empty(sample_rate),
            windows: Vec::new(),
            mel_frames: 0,
        }
    }

    /// Whether any window hit `max_decoder_steps`. The audio may be cut short.
    pub fn truncated(&self) -> bool {
        self.windows
            .iter()
            .any(|w| w.stop_reason == StopReason::MaxSteps)
    }

    pub fn stop_reasons(&self) -> Vec<StopReason> {
        self.windows.iter().map(|w| w.stop_reason).collect()
    }

    fn append(&mut self, other: SynthesisOutput) {
        self.waveform.append(&other.waveform);
        self.windows.extend(other.windows);
        self.mel_frames += other.mel_frames;
    }
}

/// Text-to-speech engine: Tacotron2 graphs plus a Griffin-Lim vocoder.
///
/// `Send + Sync`. The graph sessions sit behind one lock, so concurrent
/// callers decode one at a time while vocoding runs unlocked. For parallel
/// decoding build one `Synthesizer` per worker.
///
/// # Example
///
/// ```ignore
/// use murmur::prelude::*;
///
/// let synth = Synthesizer::builder().models_dir("models/tacotron2").build()?;
///
/// let out = synth.synthesize_chunks(
///     [
///         Chunk::Symbols(Symbol::parse_phones("HH AH0 L OW1")?),
///         Chunk::Break(Duration::from_millis(300)),
///         Chunk::Symbols(Symbol::parse_phones("W ER1 L D")?),
///     ],
///     &DecodeControl::default(),
/// )?;
/// if out.truncated() {
///     eprintln!("decoder hit its step limit");
/// }
/// out.waveform.write_wav("out.wav")?;
/// ```
pub struct Synthesizer {
    config: SynthesisConfig,
    capabilities: BackendCapabilities,
    model: Mutex<Tacotron2>,
    vocoder: GriffinLim,
    utterances: AtomicUsize,
}

impl Synthesizer {
    pub fn builder() -> crate::SynthesizerBuilder {
        crate::SynthesizerBuilder::default()
    }

    pub(crate) fn from_parts(
        config: SynthesisConfig,
        capabilities: BackendCapabilities,
        model: Tacotron2,
        vocoder: GriffinLim,
    ) -> Self {
        Self {
            config,
            capabilities,
            model: Mutex::new(model),
            vocoder,
            utterances: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn backend(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    pub fn vocoder(&self) -> &GriffinLim {
        &self.vocoder
    }

    /// One utterance of symbols.
    pub fn synthesize(&self, symbols: &[Symbol]) -> Result<SynthesisOutput> {
        self.synthesize_with(symbols, &DecodeControl::default())
    }

    pub fn synthesize_with(
        &self,
        symbols: &[Symbol],
        control: &DecodeControl,
    ) -> Result<SynthesisOutput> {
        self.utterance(|model| model.infer(symbols, control))
    }

    /// One utterance of model ids.
    pub fn synthesize_ids(&self, ids: &[i64], control: &DecodeControl) -> Result<SynthesisOutput> {
        self.utterance(|model| model.infer_ids(ids, control))
    }

    /// Character-level input for models trained on text.
    pub fn synthesize_text(&self, text: &str) -> Result<SynthesisOutput> {
        self.synthesize(&Symbol::from_text(text))
    }

    /// Run a chunk stream. Each `Break` flushes the pending utterance and
    /// appends its silence; whatever is left is flushed at the end.
    pub fn synthesize_chunks(
        &self,
        chunks: impl IntoIterator<Item = Chunk>,
        control: &DecodeControl,
    ) -> Result<SynthesisOutput> {
        let mut output = SynthesisOutput::empty(self.sample_rate());
        let mut pending: Vec<Symbol> = Vec::new();

        for chunk in chunks {
            match chunk {
                Chunk::Symbols(symbols) => pending.extend(symbols),
                Chunk::Break(pause) => {
                    if !pending.is_empty() {
                        output.append(self.synthesize_with(&pending, control)?);
                        pending.clear();
                    }
                    output
                        .waveform
                        .append(&Waveform::silence(pause, self.sample_rate()));
                }
            }
        }
        if !pending.is_empty() {
            output.append(self.synthesize_with(&pending, control)?);
        }
        Ok(output)
    }

    /// Mel spectrogram to audio.
    pub fn vocode(&self, mel: &MelSequence) -> Result<Waveform> {
        if mel.is_empty() {
            return Ok(Waveform::empty(self.sample_rate()));
        }
        let samples = self.vocoder.infer(&mel.to_array())?;
        Ok(Waveform::new(samples, self.sample_rate()))
    }

    fn utterance(
        &self,
        infer: impl FnOnce(&mut Tacotron2) -> murmur_tacotron::Result<MelOutput>,
    ) -> Result<SynthesisOutput> {
        let started = Instant::now();
        let decoded = {
            let mut model = self.model.lock();
            infer(&mut *model)?
        };
        if decoded.mel.is_empty() {
            tracing::debug!("Nothing to synthesize");
            return Ok(SynthesisOutput::empty(self.sample_rate()));
        }
        let decode_time = started.elapsed();

        self.dump_spectrogram(&decoded.mel)?;
        let waveform = self.vocode(&decoded.mel)?;

        let elapsed = started.elapsed();
        let audio = waveform.duration();
        let rtf = elapsed.as_secs_f64() / audio.as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            frames = decoded.mel.frames(),
            windows = decoded.windows.len(),
            stop_reasons = ?decoded.stop_reasons().collect::<Vec<_>>(),
            audio_secs = audio.as_secs_f64(),
            decode_ms = decode_time.as_millis() as u64,
            total_ms = elapsed.as_millis() as u64,
            real_time_factor = rtf,
            "Synthesized utterance"
        );
        if decoded.truncated() {
            tracing::warn!("Utterance truncated by max_decoder_steps");
        }

        Ok(SynthesisOutput {
            waveform,
            mel_frames: decoded.mel.frames(),
            windows: decoded.windows,
        })
    }

    /// `<dir>/mel_<n>.npy`, `[n_mels, frames]`, when a dump directory is set.
    fn dump_spectrogram(&self, mel: &MelSequence) -> Result<()> {
        let Some(dir) = self.config.dump_spectrogram.as_ref() else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;
        let index = self.utterances.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("mel_{:04}.npy", index));
        ndarray_npy::write_npy(&path, &mel.to_array())?;
        tracing::debug!(path = %path.display(), "Wrote mel spectrogram");
        Ok(())
    }
}
