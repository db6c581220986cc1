//! In-memory checkpoint dictionary.

use std::collections::HashMap;

use crate::domain::Tensor;
use crate::error::{ConvertError, Result};
use crate::ports::{TensorFetch, TensorSource};

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Loaded(Tensor),
    Unsupported(String),
}

/// A name → tensor map held entirely in memory.
///
/// Insertion order is kept so `tensor_names` is deterministic.
#[derive(Debug, Clone, Default)]
pub struct CheckpointMap {
    label: String,
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl CheckpointMap {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn from_tensors(label: impl Into<String>, tensors: impl IntoIterator<Item = Tensor>) -> Self {
        let mut map = Self::new(label);
        for tensor in tensors {
            map.insert(tensor);
        }
        map
    }

    /// Insert a tensor under its own name, replacing any previous entry.
    pub fn insert(&mut self, tensor: Tensor) {
        let name = tensor.name().to_string();
        self.put(name, Entry::Loaded(tensor));
    }

    /// Record a tensor whose dtype cannot be widened.
    pub fn insert_unsupported(&mut self, name: impl Into<String>, dtype: impl Into<String>) {
        self.put(name.into(), Entry::Unsupported(dtype.into()));
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn put(&mut self, name: String, entry: Entry) {
        if self.entries.insert(name.clone(), entry).is_none() {
            self.order.push(name);
        }
    }
}

impl TensorSource for CheckpointMap {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn fetch(&mut self, name: &str) -> Result<TensorFetch> {
        match self.entries.get(name) {
            Some(Entry::Loaded(tensor)) => Ok(TensorFetch::Loaded(tensor.clone())),
            Some(Entry::Unsupported(dtype)) => Ok(TensorFetch::Unsupported {
                dtype: dtype.clone(),
            }),
            None => Err(ConvertError::format(format!(
                "tensor '{name}' not in {}",
                self.label
            ))),
        }
    }

    fn tensor_names(&self) -> Vec<String> {
        self.order.clone()
    }
}
