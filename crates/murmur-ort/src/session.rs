//! ONNX Runtime session behind the [`Session`] trait.

use murmur_core::{check_inputs, InferenceError, Session, Tensor, TensorData, TensorMap};
use ort::session::{Session as OrtSession, SessionInputValue};
use ort::value::{DynValue, Tensor as OrtTensor};
use std::borrow::Cow;

pub(crate) struct OrtGraph {
    session: OrtSession,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl OrtGraph {
    pub fn new(session: OrtSession) -> Self {
        let inputs = session.inputs.iter().map(|i| i.name.clone()).collect();
        let outputs = session.outputs.iter().map(|o| o.name.clone()).collect();
        Self {
            session,
            inputs,
            outputs,
        }
    }
}

impl Session for OrtGraph {
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        check_inputs(&self.inputs, inputs)?;

        let mut feed: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
            Vec::with_capacity(self.inputs.len());
        for name in &self.inputs {
            let tensor = inputs.require(name).map_err(|_| {
                InferenceError::MissingInput(name.clone())
            })?;
            feed.push((Cow::Owned(name.clone()), to_ort(tensor)?.into()));
        }

        let results = self.session.run(feed).map_err(runtime)?;

        let mut outputs = TensorMap::with_capacity(self.outputs.len());
        for name in &self.outputs {
            let value = results
                .get(name.as_str())
                .ok_or_else(|| InferenceError::MissingOutput(name.clone()))?;
            outputs.insert(name.clone(), from_ort(name, value)?);
        }
        Ok(outputs)
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }
}

fn runtime(e: ort::Error) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}

fn to_ort(tensor: &Tensor) -> Result<DynValue, InferenceError> {
    let shape = tensor.shape().to_vec();
    let value = match tensor.data() {
        TensorData::F32(v) => OrtTensor::from_array((shape, v.clone())).map(|t| t.into_dyn()),
        TensorData::I64(v) => OrtTensor::from_array((shape, v.clone())).map(|t| t.into_dyn()),
        TensorData::Bool(v) => OrtTensor::from_array((shape, v.clone())).map(|t| t.into_dyn()),
    };
    value.map_err(runtime)
}

fn from_ort(name: &str, value: &DynValue) -> Result<Tensor, InferenceError> {
    fn dims(shape: &[i64]) -> Vec<usize> {
        shape.iter().map(|&d| d.max(0) as usize).collect()
    }

    let converted = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        Tensor::from_f32(dims(shape), data.to_vec())
    } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
        Tensor::from_i64(dims(shape), data.to_vec())
    } else if let Ok((shape, data)) = value.try_extract_tensor::<bool>() {
        Tensor::from_bool(dims(shape), data.to_vec())
    } else {
        return Err(InferenceError::Runtime(format!(
            "output '{}' has an unsupported element type",
            name
        )));
    };
    converted.map_err(|e| InferenceError::Runtime(e.to_string()))
}
