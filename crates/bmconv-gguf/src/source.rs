//! GGUF container as a [`TensorSource`].

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use bmconv_core::{
    ConvertError, ModelConfig, Result, RunWarning, SourceDtype, Tensor, TensorFetch, TensorSource,
};

use crate::format::GgmlDtype;
use crate::parser::{GgufContainer, TensorInfo};
use crate::reader::GgufReader;

/// Reads tensors out of a GGUF container one at a time.
pub struct GgufSource<R> {
    label: String,
    reader: GgufReader<R>,
    container: GgufContainer,
}

impl GgufSource<BufReader<File>> {
    /// Open and parse a GGUF file.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = GgufReader::open(path)?;
        Self::from_reader(path.display().to_string(), reader)
    }
}

impl<R: Read + Seek> GgufSource<R> {
    /// Parse a container from an already opened reader.
    pub fn from_reader(label: impl Into<String>, mut reader: GgufReader<R>) -> Result<Self> {
        let container = GgufContainer::parse(&mut reader)?;
        Ok(Self {
            label: label.into(),
            reader,
            container,
        })
    }

    pub const fn container(&self) -> &GgufContainer {
        &self.container
    }

    /// Model config seeded from the container metadata.
    pub fn model_config(&self) -> ModelConfig {
        self.container.model_config()
    }

    fn read_tensor(&mut self, info: &TensorInfo) -> Result<TensorFetch> {
        let dtype = match info.dtype {
            GgmlDtype::F32 => SourceDtype::F32,
            GgmlDtype::F16 => SourceDtype::F16,
            GgmlDtype::BF16 => SourceDtype::BF16,
            GgmlDtype::Other(_) => {
                return Ok(TensorFetch::Unsupported {
                    dtype: info.dtype.to_string(),
                });
            }
        };

        let start = self
            .container
            .data_start()
            .checked_add(info.offset)
            .ok_or_else(|| {
                ConvertError::format(format!("tensor '{}' offset {} overflows", info.name, info.offset))
            })?;
        self.reader.seek_to(start)?;
        let data = self
            .reader
            .read_f32_values(info.dtype, info.n_elements())?
            .ok_or_else(|| ConvertError::format(format!("cannot widen {}", info.dtype)))?;
        let tensor = Tensor::new(info.name.clone(), info.dims.clone(), dtype, data)?;
        Ok(TensorFetch::Loaded(tensor))
    }
}

impl<R: Read + Seek> TensorSource for GgufSource<R> {
    fn label(&self) -> String {
        format!("gguf v{} {}", self.container.version(), self.label)
    }

    fn contains(&self, name: &str) -> bool {
        self.container.tensor(name).is_some()
    }

    fn fetch(&mut self, name: &str) -> Result<TensorFetch> {
        let info = self
            .container
            .tensor(name)
            .cloned()
            .ok_or_else(|| ConvertError::format(format!("no tensor '{name}' in container")))?;
        tracing::trace!(name = %name, dtype = %info.dtype, "Reading GGUF tensor");
        self.read_tensor(&info)
    }

    fn tensor_names(&self) -> Vec<String> {
        self.container
            .tensors()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    fn warnings(&self) -> Vec<RunWarning> {
        self.container.warnings().to_vec()
    }
}
