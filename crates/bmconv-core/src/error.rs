//! Conversion error taxonomy.
//!
//! Every failure the pipeline can surface maps onto one of these variants.
//! Adapter crates keep richer internal errors and convert into
//! `ConvertError` via `From`, so callers only ever match on this type.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::settings::SettingsError;

/// Errors raised by the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Bad magic, unsupported version or an inconsistent structural field.
    #[error("Format error: {0}")]
    Format(String),

    /// Fewer header bytes than the smallest auto-detectable header.
    #[error("Truncated header: need at least {needed} bytes, got {actual}")]
    TruncatedHeader { needed: usize, actual: usize },

    /// A resolved weight slot matched none of its alias spellings.
    #[error("Missing tensor for slot {slot}; tried: {}", attempted.join(", "))]
    MissingTensor { slot: String, attempted: Vec<String> },

    /// A metadata value type the container reader does not decode.
    #[error("Unknown metadata type {type_code} for key '{key}'")]
    UnknownMetadataType { key: String, type_code: u32 },

    /// A tensor whose element type cannot be widened to f32.
    #[error("Tensor '{name}' has unsupported dtype {dtype}")]
    SkippedUnsupportedDtype { name: String, dtype: String },

    /// Values the quantizer cannot encode faithfully. Never recoverable.
    #[error("Fatal data error in tensor '{tensor}': {fault}")]
    FatalData { tensor: String, fault: DataFault },

    /// Invalid conversion settings.
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// I/O failure while reading a source or writing the output stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What made a tensor unencodable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataFault {
    /// A NaN or infinity in the input.
    NonFinite { index: usize, value: f32 },
    /// A group whose range overflows or underflows its scale.
    Scale { group: usize, scale: f32 },
}

impl fmt::Display for DataFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { index, value } => {
                write!(f, "non-finite value {value} at element {index}")
            }
            Self::Scale { group, scale } => write!(f, "group {group} has unusable scale {scale}"),
        }
    }
}

impl ConvertError {
    /// Build a format error from anything displayable.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Whether this error can be downgraded to a per-tensor warning.
    ///
    /// `FatalData` and structural errors always abort the job.
    pub const fn is_tolerable(&self) -> bool {
        matches!(
            self,
            Self::MissingTensor { .. }
                | Self::UnknownMetadataType { .. }
                | Self::SkippedUnsupportedDtype { .. }
        )
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tensor_lists_every_alias() {
        let err = ConvertError::MissingTensor {
            slot: "token_embedding".to_string(),
            attempted: vec![
                "tok_embeddings.weight".to_string(),
                "model.embed_tokens.weight".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("tok_embeddings.weight"));
        assert!(msg.contains("model.embed_tokens.weight"));
    }

    #[test]
    fn test_fatal_data_is_not_tolerable() {
        let err = ConvertError::FatalData {
            tensor: "wq".to_string(),
            fault: DataFault::NonFinite {
                index: 3,
                value: f32::NAN,
            },
        };
        assert!(!err.is_tolerable());
        assert!(
            ConvertError::SkippedUnsupportedDtype {
                name: "x".to_string(),
                dtype: "Q4_0".to_string()
            }
            .is_tolerable()
        );
    }

    #[test]
    fn test_scale_fault_names_group() {
        let err = ConvertError::FatalData {
            tensor: "w2".to_string(),
            fault: DataFault::Scale {
                group: 4,
                scale: f32::INFINITY,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("'w2'"));
        assert!(msg.contains("group 4"));
    }

    #[test]
    fn test_io_conversion() {
        let err: ConvertError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, ConvertError::Io(_)));
    }
}
