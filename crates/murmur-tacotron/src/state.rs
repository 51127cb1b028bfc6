//! Recurrent state threaded through the decode loop.

use crate::config::{DecoderConfig, DecoderNames, MaskEncoding};
use crate::encoder::EncoderOutput;
use murmur_core::{InferenceError, ShapeError, Tensor, TensorMap};

/// Mask over `max_len` encoder positions; positions `>= valid_len` are
/// padding.
pub fn build_mask(
    encoding: MaskEncoding,
    max_len: usize,
    valid_len: usize,
) -> Result<Tensor, ShapeError> {
    if valid_len > max_len {
        return Err(ShapeError::new(
            "attention mask",
            format!("at most {} valid positions", max_len),
            valid_len.to_string(),
        ));
    }
    let shape = [1, max_len];
    match encoding {
        MaskEncoding::Bool => Tensor::from_bool(shape, (0..max_len).map(|i| i >= valid_len).collect()),
        MaskEncoding::Additive => Tensor::from_f32(
            shape,
            (0..max_len)
                .map(|i| if i >= valid_len { f32::NEG_INFINITY } else { 0.0 })
                .collect(),
        ),
    }
}

/// Output of one decode step after it has been folded into the state.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub frame: Vec<f32>,
    pub stop_value: f32,
    pub attention_weights: Vec<f32>,
}

/// Per-utterance decoder state. Zero at loop start, updated once per step.
#[derive(Debug, Clone)]
pub struct DecoderState {
    pub decoder_input: Tensor,
    pub attention_hidden: Tensor,
    pub attention_cell: Tensor,
    pub decoder_hidden: Tensor,
    pub decoder_cell: Tensor,
    pub attention_weights: Tensor,
    pub attention_weights_cum: Tensor,
    pub attention_context: Tensor,
    pub mask: Tensor,
}

impl DecoderState {
    pub fn new(config: &DecoderConfig, encoded: &EncoderOutput) -> Result<Self, ShapeError> {
        let max_len = encoded.max_len();
        Ok(Self {
            decoder_input: Tensor::zeros_f32([1, config.n_mels]),
            attention_hidden: Tensor::zeros_f32([1, config.attention_rnn_dim]),
            attention_cell: Tensor::zeros_f32([1, config.attention_rnn_dim]),
            decoder_hidden: Tensor::zeros_f32([1, config.decoder_rnn_dim]),
            decoder_cell: Tensor::zeros_f32([1, config.decoder_rnn_dim]),
            attention_weights: Tensor::zeros_f32([1, max_len]),
            attention_weights_cum: Tensor::zeros_f32([1, max_len]),
            attention_context: Tensor::zeros_f32([1, encoded.embedding_dim()]),
            mask: build_mask(config.mask, max_len, encoded.valid_len())?,
        })
    }

    /// Copy the recurrent tensors and the mask into `inputs`.
    pub fn write_inputs(&self, names: &DecoderNames, inputs: &mut TensorMap) {
        inputs.insert(names.decoder_input.as_str(), self.decoder_input.clone());
        inputs.insert(names.attention_hidden.as_str(), self.attention_hidden.clone());
        inputs.insert(names.attention_cell.as_str(), self.attention_cell.clone());
        inputs.insert(names.decoder_hidden.as_str(), self.decoder_hidden.clone());
        inputs.insert(names.decoder_cell.as_str(), self.decoder_cell.clone());
        inputs.insert(names.attention_weights.as_str(), self.attention_weights.clone());
        inputs.insert(
            names.attention_weights_cum.as_str(),
            self.attention_weights_cum.clone(),
        );
        inputs.insert(names.attention_context.as_str(), self.attention_context.clone());
        inputs.insert(names.mask.as_str(), self.mask.clone());
    }

    /// Fold one step's outputs into the state.
    ///
    /// Every recurrent output must keep its input's shape. The cumulative
    /// attention is accumulated here; a cumulative output from the graph is
    /// ignored. On error the state is left untouched.
    pub fn absorb(
        &mut self,
        names: &DecoderNames,
        mut outputs: TensorMap,
    ) -> Result<StepOutput, InferenceError> {
        let decoder_output = outputs.take(&names.decoder_output)?;
        expect_len(&names.decoder_output, &decoder_output, self.decoder_input.len())?;
        let stop_value = outputs.take(&names.stop_token)?.first_f32()?;

        let mut take = |input: &str, like: &Tensor| -> Result<Tensor, InferenceError> {
            let name = names.output_for(input);
            let tensor = outputs.take(&name)?;
            expect_shape(&name, &tensor, like)?;
            tensor.as_f32()?;
            Ok(tensor)
        };
        let attention_hidden = take(&names.attention_hidden, &self.attention_hidden)?;
        let attention_cell = take(&names.attention_cell, &self.attention_cell)?;
        let decoder_hidden = take(&names.decoder_hidden, &self.decoder_hidden)?;
        let decoder_cell = take(&names.decoder_cell, &self.decoder_cell)?;
        let attention_weights = take(&names.attention_weights, &self.attention_weights)?;
        let attention_context = take(&names.attention_context, &self.attention_context)?;

        let weights = attention_weights.as_f32()?.to_vec();
        let cumulative: Vec<f32> = self
            .attention_weights_cum
            .as_f32()?
            .iter()
            .zip(&weights)
            .map(|(c, w)| c + w)
            .collect();
        let frame = decoder_output.into_f32()?;

        self.attention_weights_cum = Tensor::from_f32(self.attention_weights_cum.shape().to_vec(), cumulative)
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        self.decoder_input = Tensor::from_f32(self.decoder_input.shape().to_vec(), frame.clone())
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        self.attention_hidden = attention_hidden;
        self.attention_cell = attention_cell;
        self.decoder_hidden = decoder_hidden;
        self.decoder_cell = decoder_cell;
        self.attention_weights = attention_weights;
        self.attention_context = attention_context;

        Ok(StepOutput {
            frame,
            stop_value,
            attention_weights: weights,
        })
    }
}

fn expect_shape(name: &str, found: &Tensor, like: &Tensor) -> Result<(), InferenceError> {
    if found.shape() != like.shape() {
        return Err(InferenceError::ShapeMismatch {
            name: name.to_string(),
            expected: like.shape().to_vec(),
            found: found.shape().to_vec(),
        });
    }
    Ok(())
}

fn expect_len(name: &str, found: &Tensor, len: usize) -> Result<(), InferenceError> {
    if found.len() != len {
        return Err(InferenceError::ShapeMismatch {
            name: name.to_string(),
            expected: vec![1, len],
            found: found.shape().to_vec(),
        });
    }
    Ok(())
}
