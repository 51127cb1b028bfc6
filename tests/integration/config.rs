//! Configuration loading and builder validation

use crate::helpers::*;
use murmur::prelude::*;
use murmur::{BackendFactory, Error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wraps the scripted backend and records whether it was ever created.
fn watched_backend(created: Arc<AtomicBool>) -> BackendFactory {
    let inner = scripted_backend(Script::default());
    Box::new(move |config| {
        created.store(true, Ordering::SeqCst);
        inner(config)
    })
}

#[test]
fn test_config_file_drives_the_builder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("murmur.toml");
    std::fs::write(
        &path,
        r#"
        sample_rate = 8000

        [models]
        dir = "fake-models"

        [decoder]
        n_mels = 8
        attention_rnn_dim = 6
        decoder_rnn_dim = 6
        max_input_len = 16
        max_decoder_steps = 40

        [vocoder]
        n_fft = 64
        win_length = 64
        hop_length = 16
        fmax = 4000.0
        griffin_lim_iterations = 2
        "#,
    )
    .unwrap();

    let synth = Synthesizer::builder()
        .config_file(&path)
        .unwrap()
        .backend(scripted_backend(Script {
            never_stop: true,
            ..Default::default()
        }))
        .build()
        .unwrap();

    assert_eq!(synth.sample_rate(), 8000);
    assert_eq!(synth.vocoder().config().n_mels, 8);

    let out = synth.synthesize(&phones("AA1")).unwrap();
    assert_eq!(out.mel_frames, 40);
    assert!(out.truncated());
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SynthesisConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_invalid_config_fails_before_backend_is_created() {
    let created = Arc::new(AtomicBool::new(false));
    let mut config = test_config();
    config.sample_rate = 0;

    let err = Synthesizer::builder()
        .config(config)
        .backend(watched_backend(Arc::clone(&created)))
        .build()
        .err()
        .expect("build should fail");

    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(!created.load(Ordering::SeqCst));
}

#[test]
fn test_invalid_vocoder_config_fails_build() {
    let created = Arc::new(AtomicBool::new(false));
    let mut config = test_config();
    config.vocoder.hop_length = 128;

    let result = Synthesizer::builder()
        .config(config)
        .backend(watched_backend(Arc::clone(&created)))
        .build();

    assert!(matches!(result, Err(Error::Vocoder(_))));
    assert!(!created.load(Ordering::SeqCst));
}

#[test]
fn test_valid_config_creates_backend_once() {
    let created = Arc::new(AtomicBool::new(false));
    Synthesizer::builder()
        .config(test_config())
        .backend(watched_backend(Arc::clone(&created)))
        .build()
        .unwrap();
    assert!(created.load(Ordering::SeqCst));
}

#[test]
fn test_models_dir_override() {
    let synth = Synthesizer::builder()
        .config(test_config())
        .models_dir("other-models")
        .backend(scripted_backend(Script::default()))
        .build()
        .unwrap();
    assert_eq!(synth.config().models.dir, std::path::PathBuf::from("other-models"));
}

#[cfg(not(feature = "native"))]
#[test]
fn test_native_backend_unavailable_without_feature() {
    use murmur::core::LoadError;
    use murmur::BackendKind;

    let err = murmur::backend_factory_for(BackendKind::Native)
        .err()
        .expect("native backend is not compiled in");
    assert!(matches!(err, Error::Load(LoadError::BackendUnavailable(_))));
    assert!(err.to_string().contains("native"));
}

#[cfg(feature = "interpreted")]
#[test]
fn test_interpreted_backend_reports_missing_models() {
    let mut config = test_config();
    config.models.dir = tempfile::tempdir().unwrap().path().join("nothing-here");

    let err = Synthesizer::builder()
        .config(config)
        .build()
        .err()
        .expect("no graphs on disk");
    assert!(!err.is_per_utterance());
}
