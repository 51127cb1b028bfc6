//! Encoder stage: one inference call from ids to attention memory.

use crate::config::{EncoderNames, PlenPolicy};
use crate::error::{Error, Result};
use crate::sequence::PhonemeSequence;
use murmur_core::{InferenceError, Session, Tensor, TensorMap};

/// Encoder memory for one window. Read-only once produced.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// `[1, T, E]`
    memory: Tensor,
    /// `[1, T, A]`
    processed_memory: Tensor,
    valid_len: usize,
}

impl EncoderOutput {
    /// Check ranks and lengths of graph outputs.
    pub fn new(memory: Tensor, processed_memory: Tensor, valid_len: usize) -> Result<Self> {
        check_memory("memory", &memory)?;
        check_memory("processed_memory", &processed_memory)?;
        if processed_memory.shape()[1] != memory.shape()[1] {
            return Err(Error::Encode(InferenceError::ShapeMismatch {
                name: "processed_memory".into(),
                expected: vec![1, memory.shape()[1], processed_memory.shape()[2]],
                found: processed_memory.shape().to_vec(),
            }));
        }
        if valid_len == 0 || valid_len > memory.shape()[1] {
            return Err(Error::Encode(InferenceError::ShapeMismatch {
                name: "memory".into(),
                expected: vec![1, valid_len, memory.shape()[2]],
                found: memory.shape().to_vec(),
            }));
        }
        Ok(Self {
            memory,
            processed_memory,
            valid_len,
        })
    }

    pub fn memory(&self) -> &Tensor {
        &self.memory
    }

    pub fn processed_memory(&self) -> &Tensor {
        &self.processed_memory
    }

    /// Encoder time steps, the length the mask is sized to.
    pub fn max_len(&self) -> usize {
        self.memory.shape()[1]
    }

    pub fn embedding_dim(&self) -> usize {
        self.memory.shape()[2]
    }

    /// Real symbols; positions at or past this are masked.
    pub fn valid_len(&self) -> usize {
        self.valid_len
    }
}

fn check_memory(name: &str, tensor: &Tensor) -> Result<()> {
    let shape = tensor.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] == 0 || shape[2] == 0 {
        return Err(Error::Encode(InferenceError::ShapeMismatch {
            name: name.into(),
            expected: vec![1, shape.get(1).copied().unwrap_or(0), shape.get(2).copied().unwrap_or(0)],
            found: shape.to_vec(),
        }));
    }
    tensor.as_f32().map_err(Error::Encode)?;
    Ok(())
}

pub struct Encoder {
    session: Box<dyn Session>,
    names: EncoderNames,
    plen: PlenPolicy,
}

impl Encoder {
    pub fn new(session: Box<dyn Session>, names: EncoderNames, plen: PlenPolicy) -> Self {
        Self {
            session,
            names,
            plen,
        }
    }

    pub fn encode(&mut self, sequence: &PhonemeSequence) -> Result<EncoderOutput> {
        let padded = sequence.padded();
        let plen = match self.plen {
            PlenPolicy::Padded => padded.len(),
            PlenPolicy::Valid => sequence.len(),
        };

        let mut inputs = TensorMap::with_capacity(2);
        inputs.insert(
            self.names.phonemes.as_str(),
            Tensor::from_i64([1, padded.len()], padded)?,
        );
        inputs.insert(
            self.names.plen.as_str(),
            Tensor::from_i64([1], vec![plen as i64])?,
        );

        let mut outputs = self.session.run(&inputs).map_err(Error::Encode)?;
        let memory = outputs.take(&self.names.memory).map_err(Error::Encode)?;
        let processed_memory = outputs
            .take(&self.names.processed_memory)
            .map_err(Error::Encode)?;

        let output = EncoderOutput::new(memory, processed_memory, sequence.len())?;
        tracing::debug!(
            valid_len = output.valid_len(),
            max_len = output.max_len(),
            embedding_dim = output.embedding_dim(),
            "Encoded window"
        );
        Ok(output)
    }
}
