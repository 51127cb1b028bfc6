//! End-to-end synthesis through the scripted graphs
//!
//! Covers the builder, the decode loop scenarios (stop token, step limit),
//! determinism, masking, failure propagation and cancellation.

use crate::helpers::*;
use murmur::prelude::*;
use murmur::tacotron::Error as ModelError;
use murmur::tacotron::SymbolTable;
use murmur::{BackendKind, Error};
use std::sync::Arc;

#[test]
fn test_kat_stops_on_token() {
    let synth = test_synth(Script::default());
    let out = synth.synthesize(&phones("K AE1 T")).unwrap();

    assert_eq!(out.stop_reasons(), vec![StopReason::StopToken]);
    assert!(!out.truncated());
    assert_eq!(out.mel_frames, 3 * FRAMES_PER_SYMBOL);
    assert!(out.mel_frames >= 10 && out.mel_frames < 100);

    // hop * (frames - 1) samples from the vocoder
    assert_eq!(out.waveform.len(), 16 * (out.mel_frames - 1));
    assert_eq!(out.waveform.sample_rate(), TEST_SAMPLE_RATE);
    assert!(out.waveform.samples().iter().all(|s| s.is_finite()));
}

#[test]
fn test_never_stopping_graph_is_truncated() {
    let synth = test_synth(Script {
        never_stop: true,
        ..Default::default()
    });
    let out = synth.synthesize(&phones("K AE1 T")).unwrap();

    assert_eq!(out.stop_reasons(), vec![StopReason::MaxSteps]);
    assert!(out.truncated());
    assert_eq!(out.mel_frames, 500);
}

#[test]
fn test_synthesis_is_deterministic() {
    let a = test_synth(Script::default())
        .synthesize(&phones("HH AH0 L OW1"))
        .unwrap();
    let b = test_synth(Script::default())
        .synthesize(&phones("HH AH0 L OW1"))
        .unwrap();
    assert_eq!(a.waveform, b.waveform);
}

#[test]
fn test_repeated_calls_on_one_synthesizer_agree() {
    let synth = test_synth(Script::default());
    let a = synth.synthesize(&phones("W ER1 L D")).unwrap();
    let b = synth.synthesize(&phones("W ER1 L D")).unwrap();
    assert_eq!(a.waveform, b.waveform);
}

#[test]
fn test_additive_mask_matches_bool_mask() {
    let bool_mask = test_synth(Script::default())
        .synthesize(&phones("K AE1 T"))
        .unwrap();
    let additive = test_synth_with(additive_mask_config(), Script::default())
        .synthesize(&phones("K AE1 T"))
        .unwrap();
    assert_eq!(bool_mask.waveform, additive.waveform);
}

#[test]
fn test_long_input_is_split_into_windows() {
    // 22 symbols against a capacity of 16
    let symbols = phones("DH AH0 K AE1 T , S AE1 T . AA1 N DH AH0 M AE1 T , AH0 G EH1 N");
    assert!(symbols.len() > TEST_CAPACITY);

    let synth = test_synth(Script::default());
    let out = synth.synthesize(&symbols).unwrap();

    assert_eq!(out.windows.len(), 2);
    let per_window: usize = out.windows.iter().map(|w| w.steps).sum();
    assert_eq!(out.mel_frames, per_window);
    assert!(out.windows.iter().all(|w| w.input_len <= TEST_CAPACITY));
    // Break after the full stop, the best boundary in range.
    assert_eq!(out.windows[0].input_len, 10);
}

#[test]
fn test_ids_and_symbols_agree() {
    let synth = test_synth(Script::default());
    let symbols = phones("K AE1 T");
    let ids = SymbolTable::tacotron2().encode(&symbols);

    let from_symbols = synth.synthesize(&symbols).unwrap();
    let from_ids = synth.synthesize_ids(&ids, &DecodeControl::default()).unwrap();
    assert_eq!(from_symbols.waveform, from_ids.waveform);
}

#[test]
fn test_text_input() {
    let synth = test_synth(Script::default());
    let out = synth.synthesize_text("Hello, world.").unwrap();
    assert_eq!(out.mel_frames, 13 * FRAMES_PER_SYMBOL);
}

#[test]
fn test_empty_input_is_empty_audio() {
    let synth = test_synth(Script::default());
    let out = synth.synthesize(&[]).unwrap();
    assert!(out.waveform.is_empty());
    assert!(out.windows.is_empty());
}

#[test]
fn test_decoder_fault_fails_utterance_with_step() {
    let synth = test_synth(Script {
        fail_from: Some(4),
        ..Default::default()
    });
    let err = synth.synthesize(&phones("K AE1 T")).unwrap_err();
    assert!(err.is_per_utterance());
    match err {
        Error::Model(ModelError::Decode { step, .. }) => assert_eq!(step, 4),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_cancelled_utterance_returns_no_audio() {
    let synth = test_synth(Script::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = synth
        .synthesize_with(&phones("K AE1 T"), &DecodeControl::with_cancel(cancel.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::Model(ModelError::Cancelled { step: 0 })));

    // The token can be reused once reset.
    cancel.reset();
    synth
        .synthesize_with(&phones("K AE1 T"), &DecodeControl::with_cancel(cancel))
        .unwrap();
}

#[test]
fn test_postnet_can_be_disabled() {
    let mut config = test_config();
    config.models.use_postnet = false;
    let without = test_synth_with(config, Script::default())
        .synthesize(&phones("K AE1 T"))
        .unwrap();
    let with = test_synth(Script::default())
        .synthesize(&phones("K AE1 T"))
        .unwrap();

    assert_eq!(with.mel_frames, without.mel_frames);
    assert_ne!(with.waveform, without.waveform);
}

#[test]
fn test_missing_artifact_fails_build() {
    let mut config = test_config();
    config.models.encoder = Some("elsewhere/model.onnx".into());
    let err = Synthesizer::builder()
        .config(config)
        .backend(scripted_backend(Script::default()))
        .build()
        .err()
        .expect("build should fail");
    assert!(matches!(
        err,
        Error::Model(ModelError::Load(murmur::core::LoadError::Missing(_)))
    ));
    assert!(!err.is_per_utterance());
}

#[test]
fn test_backend_reported() {
    let synth = test_synth(Script::default());
    assert_eq!(synth.backend().name, "scripted");
    assert_eq!(synth.backend().kind, BackendKind::Interpreted);
}

#[test]
fn test_synthesizer_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Synthesizer>();

    let synth = Arc::new(test_synth(Script::default()));
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let synth = Arc::clone(&synth);
            std::thread::spawn(move || synth.synthesize(&phones("K AE1 T")).unwrap().waveform)
        })
        .collect();
    let waveforms: Vec<Waveform> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(waveforms.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_spectrogram_dump() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.dump_spectrogram = Some(dir.path().join("mels"));

    let synth = test_synth_with(config, Script::default());
    let out = synth.synthesize(&phones("K AE1 T")).unwrap();
    synth.synthesize(&phones("AE1")).unwrap();

    let first: ndarray::Array2<f32> =
        ndarray_npy::read_npy(dir.path().join("mels").join("mel_0000.npy")).unwrap();
    assert_eq!(first.dim(), (TEST_N_MELS, out.mel_frames));
    assert!(dir.path().join("mels").join("mel_0001.npy").exists());
}
