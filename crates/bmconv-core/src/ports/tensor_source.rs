//! Tensor source port definition.
//!
//! The serializer pulls tensors by name, one at a time, from anything that
//! implements [`TensorSource`]: an in-memory checkpoint map, a GGUF
//! container, a safetensors file or an earlier fp32 stream.
//!
//! # Design
//!
//! - Signatures use only `bmconv-core` domain types
//! - Implementations decide how a tensor is materialized; the caller owns it
//!   until it has been encoded, then drops it
//! - Conditions an implementation tolerated while opening the source are
//!   surfaced through [`TensorSource::warnings`]

use crate::domain::{RunWarning, Tensor};
use crate::error::Result;

/// Result of fetching one named tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorFetch {
    /// The tensor, widened to f32.
    Loaded(Tensor),
    /// The tensor exists but its element type cannot be widened.
    Unsupported { dtype: String },
}

/// Port for reading named tensors.
pub trait TensorSource {
    /// Short description for logs and reports.
    fn label(&self) -> String;

    /// Whether a tensor named `name` exists, whatever its dtype.
    fn contains(&self, name: &str) -> bool;

    /// Materialize the tensor named `name`.
    ///
    /// Callers check [`contains`](Self::contains) first; asking for an
    /// absent name is a format error.
    fn fetch(&mut self, name: &str) -> Result<TensorFetch>;

    /// Every tensor name, in source order.
    fn tensor_names(&self) -> Vec<String>;

    /// Tolerated conditions met while opening the source.
    fn warnings(&self) -> Vec<RunWarning> {
        Vec::new()
    }
}

impl<S: TensorSource + ?Sized> TensorSource for Box<S> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn fetch(&mut self, name: &str) -> Result<TensorFetch> {
        (**self).fetch(name)
    }

    fn tensor_names(&self) -> Vec<String> {
        (**self).tensor_names()
    }

    fn warnings(&self) -> Vec<RunWarning> {
        (**self).warnings()
    }
}
