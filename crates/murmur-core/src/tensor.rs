//! Backend-neutral tensors.
//!
//! A [`Tensor`] is a shape plus flat row-major data. Backends convert to and
//! from their own types at the session boundary, so no framework tensor type
//! ever reaches orchestration code.

use crate::error::{InferenceError, ShapeError};

/// Element type of a [`Tensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    I64,
    Bool,
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::F32 => f.write_str("f32"),
            Self::I64 => f.write_str("i64"),
            Self::Bool => f.write_str("bool"),
        }
    }
}

/// Flat tensor storage.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::I64(_) => DType::I64,
            Self::Bool(_) => DType::Bool,
        }
    }
}

/// A dense, row-major tensor with a static shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: impl Into<Vec<usize>>, data: TensorData) -> Result<Self, ShapeError> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ShapeError::new(
                "tensor data",
                format!("{} elements for shape {:?}", expected, shape),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Self { shape, data })
    }

    pub fn from_f32(shape: impl Into<Vec<usize>>, data: Vec<f32>) -> Result<Self, ShapeError> {
        Self::new(shape, TensorData::F32(data))
    }

    pub fn from_i64(shape: impl Into<Vec<usize>>, data: Vec<i64>) -> Result<Self, ShapeError> {
        Self::new(shape, TensorData::I64(data))
    }

    pub fn from_bool(shape: impl Into<Vec<usize>>, data: Vec<bool>) -> Result<Self, ShapeError> {
        Self::new(shape, TensorData::Bool(data))
    }

    pub fn zeros_f32(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: TensorData::F32(vec![0.0; len]),
        }
    }

    /// Rank-0 `f32` tensor.
    pub fn scalar_f32(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: TensorData::F32(vec![value]),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_parts(self) -> (Vec<usize>, TensorData) {
        (self.shape, self.data)
    }

    /// Borrow as `f32`, failing if the tensor holds another element type.
    pub fn as_f32(&self) -> Result<&[f32], InferenceError> {
        match &self.data {
            TensorData::F32(v) => Ok(v),
            other => Err(InferenceError::DTypeMismatch {
                expected: DType::F32,
                found: other.dtype(),
            }),
        }
    }

    pub fn as_i64(&self) -> Result<&[i64], InferenceError> {
        match &self.data {
            TensorData::I64(v) => Ok(v),
            other => Err(InferenceError::DTypeMismatch {
                expected: DType::I64,
                found: other.dtype(),
            }),
        }
    }

    pub fn as_bool(&self) -> Result<&[bool], InferenceError> {
        match &self.data {
            TensorData::Bool(v) => Ok(v),
            other => Err(InferenceError::DTypeMismatch {
                expected: DType::Bool,
                found: other.dtype(),
            }),
        }
    }

    pub fn into_f32(self) -> Result<Vec<f32>, InferenceError> {
        match self.data {
            TensorData::F32(v) => Ok(v),
            other => Err(InferenceError::DTypeMismatch {
                expected: DType::F32,
                found: other.dtype(),
            }),
        }
    }

    /// First element as `f32`. Used for scalar outputs such as the stop token.
    pub fn first_f32(&self) -> Result<f32, InferenceError> {
        self.as_f32()?
            .first()
            .copied()
            .ok_or_else(|| InferenceError::Runtime("empty scalar tensor".into()))
    }

    /// Same data, new shape with the same element count.
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Result<Self, ShapeError> {
        Self::new(shape, self.data)
    }
}

/// Insertion-ordered map of named tensors.
///
/// Graph inputs and outputs are addressed by name; the order is kept so that
/// positional backends can be fed deterministically.
#[derive(Debug, Clone, Default)]
pub struct TensorMap {
    entries: Vec<(String, Tensor)>,
}

impl TensorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace. A replaced tensor keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, tensor)),
            None => {
                self.entries.push((name, tensor));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Like [`get`](Self::get) but reports a missing output as an error.
    pub fn require(&self, name: &str) -> Result<&Tensor, InferenceError> {
        self.get(name)
            .ok_or_else(|| InferenceError::MissingOutput(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Remove a tensor, reporting absence as a missing output.
    pub fn take(&mut self, name: &str) -> Result<Tensor, InferenceError> {
        self.remove(name)
            .ok_or_else(|| InferenceError::MissingOutput(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }
}

impl IntoIterator for TensorMap {
    type Item = (String, Tensor);
    type IntoIter = std::vec::IntoIter<(String, Tensor)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<S: Into<String>> FromIterator<(S, Tensor)> for TensorMap {
    fn from_iter<I: IntoIterator<Item = (S, Tensor)>>(iter: I) -> Self {
        let mut map = TensorMap::new();
        for (name, tensor) in iter {
            map.insert(name, tensor);
        }
        map
    }
}
