//! Runnable tract plan behind the [`Session`] trait.
//!
//! tract feeds inputs positionally, so the declared input names are captured
//! at load time and the named [`TensorMap`] is reordered to match.

use murmur_core::{
    check_inputs, InferenceError, Session, Tensor, TensorData, TensorMap,
};
use tract_onnx::prelude::{
    DatumType, TValue, TVec, Tensor as TractTensor, TypedModel, TypedRunnableModel,
};

pub(crate) struct TractSession {
    plan: TypedRunnableModel<TypedModel>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    /// Concrete input shapes declared by the graph, `None` where symbolic.
    input_shapes: Vec<Option<Vec<usize>>>,
}

impl TractSession {
    pub fn new(
        plan: TypedRunnableModel<TypedModel>,
        inputs: Vec<String>,
        outputs: Vec<String>,
        input_shapes: Vec<Option<Vec<usize>>>,
    ) -> Self {
        Self {
            plan,
            inputs,
            outputs,
            input_shapes,
        }
    }
}

impl Session for TractSession {
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError> {
        check_inputs(&self.inputs, inputs)?;

        let mut values: TVec<TValue> = TVec::new();
        for (name, declared) in self.inputs.iter().zip(&self.input_shapes) {
            let tensor = inputs.require(name).map_err(|_| {
                InferenceError::MissingInput(name.clone())
            })?;
            if let Some(expected) = declared {
                if expected.as_slice() != tensor.shape() {
                    return Err(InferenceError::ShapeMismatch {
                        name: name.clone(),
                        expected: expected.clone(),
                        found: tensor.shape().to_vec(),
                    });
                }
            }
            values.push(to_tract(tensor)?.into());
        }

        let results = self
            .plan
            .run(values)
            .map_err(|e| InferenceError::Runtime(format!("{:#}", e)))?;

        let mut outputs = TensorMap::with_capacity(results.len());
        for (name, value) in self.outputs.iter().zip(results.iter()) {
            outputs.insert(name.clone(), from_tract(name, value)?);
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

fn to_tract(tensor: &Tensor) -> Result<TractTensor, InferenceError> {
    let shape = tensor.shape();
    let converted = match tensor.data() {
        TensorData::F32(v) => TractTensor::from_shape(shape, v),
        TensorData::I64(v) => TractTensor::from_shape(shape, v),
        TensorData::Bool(v) => TractTensor::from_shape(shape, v),
    };
    converted.map_err(|e| InferenceError::Runtime(format!("tensor conversion: {}", e)))
}

fn from_tract(name: &str, value: &TractTensor) -> Result<Tensor, InferenceError> {
    let shape = value.shape().to_vec();
    let data = match value.datum_type() {
        DatumType::F32 => TensorData::F32(slice_of::<f32>(value)?),
        DatumType::I64 => TensorData::I64(slice_of::<i64>(value)?),
        DatumType::Bool => TensorData::Bool(slice_of::<bool>(value)?),
        other => {
            return Err(InferenceError::Runtime(format!(
                "output '{}' has unsupported element type {:?}",
                name, other
            )))
        }
    };
    Tensor::new(shape, data).map_err(|e| InferenceError::Runtime(e.to_string()))
}

fn slice_of<T: tract_onnx::prelude::Datum + Copy>(
    value: &TractTensor,
) -> Result<Vec<T>, InferenceError> {
    value
        .as_slice::<T>()
        .map(|s| s.to_vec())
        .map_err(|e| InferenceError::Runtime(e.to_string()))
}
