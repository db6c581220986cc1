//! Tensors extracted from a source, widened to f32.

use std::fmt;

use crate::error::{ConvertError, Result};

/// Element type a tensor had in its source before widening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDtype {
    F32,
    F16,
    BF16,
}

impl SourceDtype {
    /// Bytes per element in the source encoding.
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 | Self::BF16 => 2,
        }
    }
}

impl fmt::Display for SourceDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "F32"),
            Self::F16 => write!(f, "F16"),
            Self::BF16 => write!(f, "BF16"),
        }
    }
}

/// A named tensor with its values widened to f32.
///
/// Created by a source on demand, consumed by one encode, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    dims: Vec<usize>,
    dtype: SourceDtype,
    data: Vec<f32>,
}

impl Tensor {
    /// Build a tensor, checking that `dims` describes exactly `data.len()` elements.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<usize>,
        dtype: SourceDtype,
        data: Vec<f32>,
    ) -> Result<Self> {
        let name = name.into();
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(ConvertError::format(format!(
                "tensor '{name}' has dims {dims:?} ({expected} elements) but {} values",
                data.len()
            )));
        }
        Ok(Self {
            name,
            dims,
            dtype,
            data,
        })
    }

    /// Convenience constructor for a flat f32 tensor.
    pub fn from_f32(name: impl Into<String>, data: Vec<f32>) -> Self {
        let dims = vec![data.len()];
        Self {
            name: name.into(),
            dims,
            dtype: SourceDtype::F32,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub const fn dtype(&self) -> SourceDtype {
        self.dtype
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn n_elements(&self) -> usize {
        self.data.len()
    }

    /// Size of the tensor as unquantized f32.
    pub fn f32_bytes(&self) -> u64 {
        self.data.len() as u64 * 4
    }

    /// Index and value of the first NaN or infinity, if any.
    pub fn first_non_finite(&self) -> Option<(usize, f32)> {
        self.data
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
    }
}
