//! Internal error types for checkpoint loading.
//!
//! These convert to `ConvertError` from `bmconv-core` for the public API.

use std::io;
use std::path::PathBuf;

use bmconv_core::ConvertError;
use safetensors::SafeTensorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid safetensors file: {0}")]
    Safetensors(#[from] SafeTensorError),

    #[error("No .safetensors files found in {}", path.display())]
    NoFiles { path: PathBuf },

    #[error("Invalid model config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl From<CheckpointError> for ConvertError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::Io(e) => Self::Io(e),
            other => Self::Format(other.to_string()),
        }
    }
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;
