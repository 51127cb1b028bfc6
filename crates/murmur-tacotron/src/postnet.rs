//! Postnet stage: refines a decoded mel spectrogram in one call.

use crate::config::PostnetNames;
use crate::decoder::MelSequence;
use crate::error::{Error, Result};
use murmur_core::{InferenceError, Session, Tensor, TensorMap};

pub struct Postnet {
    session: Box<dyn Session>,
    names: PostnetNames,
}

impl Postnet {
    pub fn new(session: Box<dyn Session>, names: PostnetNames) -> Self {
        Self { session, names }
    }

    /// Run `[1, n_mels, T]` through the graph. The output must keep the shape.
    pub fn refine(&mut self, mel: &MelSequence) -> Result<MelSequence> {
        let shape = vec![1, mel.n_mels(), mel.frames()];
        let mut inputs = TensorMap::with_capacity(1);
        inputs.insert(
            self.names.input.as_str(),
            Tensor::from_f32(shape.clone(), mel.to_channel_major())?,
        );

        let mut outputs = self.session.run(&inputs).map_err(Error::Postnet)?;
        let refined = outputs.take(&self.names.output).map_err(Error::Postnet)?;
        if refined.shape() != shape.as_slice() {
            return Err(Error::Postnet(InferenceError::ShapeMismatch {
                name: self.names.output.clone(),
                expected: shape,
                found: refined.shape().to_vec(),
            }));
        }
        let data = refined.into_f32().map_err(Error::Postnet)?;
        Ok(MelSequence::from_channel_major(mel.n_mels(), &data))
    }
}
