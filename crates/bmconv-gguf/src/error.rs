//! Internal error types for GGUF parsing.
//!
//! These errors carry the byte offset or field that failed. They convert to
//! `ConvertError` from `bmconv-core` for the public API.

use std::io;

use bmconv_core::ConvertError;
use thiserror::Error;

/// Internal errors that can occur during GGUF parsing.
#[derive(Debug, Error)]
pub enum GgufInternalError {
    /// The file does not have a valid GGUF magic number.
    #[error("Invalid GGUF file: wrong magic number {found:02X?}")]
    InvalidMagic { found: [u8; 4] },

    /// The GGUF version is not supported (only versions 1-3 are supported).
    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),

    /// An I/O error occurred while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid UTF-8 was encountered in a string field.
    #[error("Invalid UTF-8 string at offset {offset}")]
    Utf8Error { offset: u64 },

    /// A value type code outside the format; the reader cannot resync.
    #[error("Unknown GGUF value type {type_code} for key '{key}' at offset {offset}")]
    InvalidValueType {
        key: String,
        type_code: u32,
        offset: u64,
    },

    /// A structural field is out of range.
    #[error("Invalid GGUF field {field} at offset {offset}: {reason}")]
    InvalidField {
        field: &'static str,
        offset: u64,
        reason: String,
    },
}

/// Convert internal errors to the domain-facing error.
impl From<GgufInternalError> for ConvertError {
    fn from(err: GgufInternalError) -> Self {
        match err {
            GgufInternalError::Io(e) => Self::Io(e),
            other => Self::Format(other.to_string()),
        }
    }
}

/// Result type for internal GGUF operations.
pub type GgufResult<T> = Result<T, GgufInternalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_error_maps_to_format() {
        let err: ConvertError = GgufInternalError::InvalidMagic { found: [0; 4] }.into();
        assert!(matches!(err, ConvertError::Format(ref msg) if msg.contains("magic")));
    }

    #[test]
    fn test_io_error_is_preserved() {
        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let err: ConvertError = GgufInternalError::from(io).into();
        assert!(matches!(err, ConvertError::Io(_)));
    }
}
