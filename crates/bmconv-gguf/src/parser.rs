//! GGUF container parser.
//!
//! Reads the header, the metadata table and the tensor directory. Tensor
//! data is never touched here; [`GgufSource`](crate::GgufSource) reads it
//! lazily by offset.

use std::collections::HashMap;
use std::io::{Read, Seek};

use bmconv_core::{GgufValue, ModelConfig, RunWarning};

use crate::error::{GgufInternalError, GgufResult};
use crate::format::{
    ALIGNMENT_KEY, ARCHITECTURE_KEY, BLOCK_COUNT, CLASSIFIER_TENSOR, CONTEXT_LENGTH,
    DEFAULT_ALIGNMENT, DEFAULT_ARCHITECTURE_PREFIX, EMBEDDING_LENGTH, FEED_FORWARD_LENGTH,
    GgmlDtype, HEAD_COUNT, HEAD_COUNT_KV, ROPE_FREQ_BASE, TOKENS_KEY, VOCAB_SIZE,
};
use crate::reader::{GgufReader, ReadValue};

/// Upper bound on tensor rank; anything larger is a corrupt directory.
const MAX_DIMS: u32 = 8;

/// One tensor directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub name: String,
    /// Dimensions in row-major order (outermost first).
    pub dims: Vec<usize>,
    pub dtype: GgmlDtype,
    /// Offset relative to the tensor-data region.
    pub offset: u64,
}

impl TensorInfo {
    pub fn n_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

/// A parsed GGUF header, metadata table and tensor directory.
#[derive(Debug, Clone)]
pub struct GgufContainer {
    version: u32,
    metadata_order: Vec<String>,
    metadata: HashMap<String, GgufValue>,
    tensors: Vec<TensorInfo>,
    data_start: u64,
    warnings: Vec<RunWarning>,
}

impl GgufContainer {
    /// Parse everything up to the start of the tensor-data region.
    ///
    /// The magic is checked before anything else is read.
    pub fn parse<R: Read + Seek>(reader: &mut GgufReader<R>) -> GgufResult<Self> {
        reader.read_magic()?;
        let version = reader.read_version()?;
        let tensor_count = reader.read_count(version)?;
        let metadata_count = reader.read_count(version)?;

        let mut container = Self {
            version,
            metadata_order: Vec::new(),
            metadata: HashMap::new(),
            tensors: Vec::new(),
            data_start: 0,
            warnings: Vec::new(),
        };

        for _ in 0..metadata_count {
            let key = reader.read_string()?;
            let type_code = reader.read_u32()?;
            match reader.read_value(&key, type_code)? {
                ReadValue::Value(value) => container.insert_metadata(key, value),
                ReadValue::Skipped { type_code } => {
                    tracing::warn!(key = %key, type_code, "Skipping metadata value of unsupported type");
                    container
                        .warnings
                        .push(RunWarning::UnknownMetadataType { key, type_code });
                }
            }
        }

        for _ in 0..tensor_count {
            let info = read_tensor_info(reader)?;
            container.tensors.push(info);
        }

        let alignment = container.alignment();
        let directory_end = reader.position()?;
        container.data_start = align_up(directory_end, alignment);
        for info in &container.tensors {
            check_extent(info, container.data_start)?;
        }

        tracing::debug!(
            version,
            tensors = container.tensors.len(),
            metadata = container.metadata.len(),
            data_start = container.data_start,
            "Parsed GGUF container"
        );
        Ok(container)
    }

    fn insert_metadata(&mut self, key: String, value: GgufValue) {
        if self.metadata.insert(key.clone(), value).is_none() {
            self.metadata_order.push(key);
        }
    }

    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Metadata entries in file order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &GgufValue)> {
        self.metadata_order
            .iter()
            .filter_map(|key| self.metadata.get(key).map(|value| (key.as_str(), value)))
    }

    pub fn get(&self, key: &str) -> Option<&GgufValue> {
        self.metadata.get(key)
    }

    pub fn tensors(&self) -> &[TensorInfo] {
        &self.tensors
    }

    pub fn tensor(&self, name: &str) -> Option<&TensorInfo> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Absolute offset of the tensor-data region.
    pub const fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Metadata values that were skipped during parsing.
    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    /// Data alignment from `general.alignment`, else 32.
    pub fn alignment(&self) -> u64 {
        self.get(ALIGNMENT_KEY)
            .and_then(GgufValue::as_u64)
            .filter(|&a| a > 0)
            .unwrap_or(DEFAULT_ALIGNMENT)
    }

    /// Metadata key prefix (`general.architecture`, else `llama`).
    pub fn architecture(&self) -> &str {
        self.get(ARCHITECTURE_KEY)
            .and_then(GgufValue::as_str)
            .unwrap_or(DEFAULT_ARCHITECTURE_PREFIX)
    }

    /// Seed a model config from the architecture-scoped keys.
    ///
    /// Absent keys take their documented defaults. The vocabulary size
    /// falls back to the token table length before its default, and the
    /// presence of a classifier tensor marks the config as unshared.
    pub fn model_config(&self) -> ModelConfig {
        let arch = self.architecture();
        let field = |(key, default): (&str, i32)| {
            self.get(&format!("{arch}.{key}"))
                .and_then(GgufValue::as_i32)
                .unwrap_or(default)
        };

        let vocab = self
            .get(&format!("{arch}.{}", VOCAB_SIZE.0))
            .and_then(GgufValue::as_i32)
            .or_else(|| {
                self.get(TOKENS_KEY)
                    .and_then(GgufValue::array_len)
                    .and_then(|len| i32::try_from(len).ok())
            })
            .unwrap_or(VOCAB_SIZE.1);

        let mut config = ModelConfig::new(
            field(EMBEDDING_LENGTH),
            field(FEED_FORWARD_LENGTH),
            field(BLOCK_COUNT),
            field(HEAD_COUNT),
            field(HEAD_COUNT_KV),
            vocab,
            field(CONTEXT_LENGTH),
        );

        if let Some(theta) = self
            .get(&format!("{arch}.{ROPE_FREQ_BASE}"))
            .and_then(GgufValue::as_f32)
        {
            config = config.with_rope_theta(theta);
        }
        if self.tensor(CLASSIFIER_TENSOR).is_some() {
            config = config.with_shared_classifier(false);
        }
        config
    }
}

fn read_tensor_info<R: Read + Seek>(reader: &mut GgufReader<R>) -> GgufResult<TensorInfo> {
    let name = reader.read_string()?;
    let offset = reader.position()?;
    let n_dims = reader.read_u32()?;
    if n_dims > MAX_DIMS {
        return Err(GgufInternalError::InvalidField {
            field: "n_dims",
            offset,
            reason: format!("tensor '{name}' has {n_dims} dimensions"),
        });
    }

    let mut dims = Vec::with_capacity(n_dims as usize);
    for _ in 0..n_dims {
        let dim = reader.read_u64()?;
        let dim = usize::try_from(dim).map_err(|_| GgufInternalError::InvalidField {
            field: "dims",
            offset,
            reason: format!("tensor '{name}' dimension {dim} out of range"),
        })?;
        dims.push(dim);
    }
    // GGUF lists the innermost dimension first.
    dims.reverse();

    if dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).is_none() {
        return Err(GgufInternalError::InvalidField {
            field: "dims",
            offset,
            reason: format!("tensor '{name}' element count overflows"),
        });
    }

    let dtype = GgmlDtype::from_code(reader.read_u32()?);
    let data_offset = reader.read_u64()?;

    Ok(TensorInfo {
        name,
        dims,
        dtype,
        offset: data_offset,
    })
}

/// Reject tensors whose byte range cannot be addressed.
fn check_extent(info: &TensorInfo, data_start: u64) -> GgufResult<()> {
    let start = data_start
        .checked_add(info.offset)
        .ok_or_else(|| GgufInternalError::InvalidField {
            field: "tensor offset",
            offset: data_start,
            reason: format!("tensor '{}' offset {} overflows", info.name, info.offset),
        })?;
    if let Some(size) = info.dtype.element_size() {
        let end = info
            .n_elements()
            .checked_mul(size)
            .and_then(|bytes| start.checked_add(bytes as u64));
        if end.is_none() {
            return Err(GgufInternalError::InvalidField {
                field: "tensor size",
                offset: data_start,
                reason: format!("tensor '{}' byte length overflows", info.name),
            });
        }
    }
    Ok(())
}

const fn align_up(offset: u64, alignment: u64) -> u64 {
    offset.div_ceil(alignment) * alignment
}
