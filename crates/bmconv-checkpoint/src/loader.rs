//! Memory-mapped safetensors checkpoints.
//!
//! A checkpoint is a single `.safetensors` file or a directory of shards.
//! Every shard is mapped once and indexed by tensor name; values are widened
//! to f32 only when the serializer asks for them.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use bmconv_core::{
    ConvertError, KeyFamily, ModelConfig, Result, SourceDtype, Tensor, TensorFetch, TensorSource,
    WeightKind,
};
use half::{bf16, f16};
use memmap2::Mmap;
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, info, warn};

use crate::config::{config_path, load_hf_config};
use crate::error::{CheckpointError, CheckpointResult};

/// Location of a tensor within a mapped shard.
#[derive(Debug, Clone)]
struct TensorLocation {
    shard: usize,
    offset: usize,
    len: usize,
    dtype: Dtype,
    shape: Vec<usize>,
}

/// A safetensors checkpoint as a tensor source.
#[derive(Debug)]
pub struct SafetensorsSource {
    path: PathBuf,
    shards: Vec<Mmap>,
    names: Vec<String>,
    locations: HashMap<String, TensorLocation>,
}

impl SafetensorsSource {
    /// Map a `.safetensors` file, or every `.safetensors` file in a directory.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::open_internal(path)?)
    }

    fn open_internal(path: &Path) -> CheckpointResult<Self> {
        let files = shard_files(path)?;
        info!(path = %path.display(), shards = files.len(), "Mapping safetensors checkpoint");

        let mut shards = Vec::with_capacity(files.len());
        let mut names = Vec::new();
        let mut locations = HashMap::new();

        for (shard, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "Mapping shard");
            let file = File::open(file_path)?;
            // SAFETY: the file is opened read-only and the map lives as long
            // as this source.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file)? };

            let tensors = SafeTensors::deserialize(&mmap)?;
            let mut shard_names: Vec<&String> = tensors.names();
            shard_names.sort();
            for name in shard_names {
                if locations.contains_key(name) {
                    warn!(tensor = %name, file = %file_path.display(), "Duplicate tensor name, keeping first");
                    continue;
                }
                let view = tensors.tensor(name)?;
                let data = view.data();
                let offset = data.as_ptr() as usize - mmap.as_ptr() as usize;
                locations.insert(
                    name.clone(),
                    TensorLocation {
                        shard,
                        offset,
                        len: data.len(),
                        dtype: view.dtype(),
                        shape: view.shape().to_vec(),
                    },
                );
                names.push(name.clone());
            }
            shards.push(mmap);
        }

        info!(tensors = names.len(), "Indexed checkpoint");
        Ok(Self {
            path: path.to_path_buf(),
            shards,
            names,
            locations,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Model config from the `config.json` next to the checkpoint, if any.
    ///
    /// When the file does not say whether embeddings are tied, a checkpoint
    /// without a classifier tensor is treated as tied.
    pub fn model_config(&self) -> Result<Option<ModelConfig>> {
        let path = config_path(&self.path);
        if !path.is_file() {
            debug!(path = %path.display(), "No config.json beside checkpoint");
            return Ok(None);
        }
        self.model_config_from(&path).map(Some)
    }

    /// Model config from an explicit `config.json`.
    pub fn model_config_from(&self, path: &Path) -> Result<ModelConfig> {
        let hf = load_hf_config(path)?;
        let mut config = hf.to_model_config(path)?;
        if hf.tie_word_embeddings.is_none() {
            config = config.with_shared_classifier(!self.has_classifier());
        }
        Ok(config)
    }

    fn has_classifier(&self) -> bool {
        [KeyFamily::Meta, KeyFamily::HuggingFace, KeyFamily::Gguf]
            .iter()
            .any(|family| self.contains(&family.key(WeightKind::Classifier, None)))
    }
}

fn shard_files(path: &Path) -> CheckpointResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().is_some_and(|e| e == "safetensors") {
                files.push(file_path);
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    }

    if files.is_empty() {
        return Err(CheckpointError::NoFiles {
            path: path.to_path_buf(),
        });
    }
    // Shard order decides which duplicate wins.
    files.sort();
    Ok(files)
}

fn widen(dtype: Dtype, bytes: &[u8]) -> Option<(SourceDtype, Vec<f32>)> {
    match dtype {
        Dtype::F32 => Some((
            SourceDtype::F32,
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )),
        Dtype::F16 => Some((
            SourceDtype::F16,
            bytes
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
        )),
        Dtype::BF16 => Some((
            SourceDtype::BF16,
            bytes
                .chunks_exact(2)
                .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
        )),
        _ => None,
    }
}

impl TensorSource for SafetensorsSource {
    fn label(&self) -> String {
        format!("safetensors {}", self.path.display())
    }

    fn contains(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    fn fetch(&mut self, name: &str) -> Result<TensorFetch> {
        let loc = self
            .locations
            .get(name)
            .ok_or_else(|| ConvertError::format(format!("no tensor '{name}' in checkpoint")))?;
        let bytes = self
            .shards
            .get(loc.shard)
            .and_then(|mmap| mmap.get(loc.offset..loc.offset + loc.len))
            .ok_or_else(|| ConvertError::format(format!("tensor '{name}' lies outside its shard")))?;

        let Some((dtype, data)) = widen(loc.dtype, bytes) else {
            return Ok(TensorFetch::Unsupported {
                dtype: format!("{:?}", loc.dtype),
            });
        };
        let tensor = Tensor::new(name, loc.shape.clone(), dtype, data)?;
        Ok(TensorFetch::Loaded(tensor))
    }

    fn tensor_names(&self) -> Vec<String> {
        self.names.clone()
    }
}
