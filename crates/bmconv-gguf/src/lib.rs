#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod error;
mod format;
mod parser;
mod reader;
mod source;

// =============================================================================
// Public API: Container + Source (minimal surface)
// =============================================================================

/// The parsed container and its tensor directory entries.
pub use parser::{GgufContainer, TensorInfo};

/// The GGUF tensor source.
pub use source::GgufSource;

/// Low-level reader, for callers that only need the metadata table.
pub use reader::GgufReader;

pub use error::GgufInternalError;
pub use format::{DEFAULT_ALIGNMENT, GGUF_MAGIC, GgmlDtype};

// Re-export the domain value type from core for convenience
pub use bmconv_core::GgufValue;

#[cfg(test)]
use tempfile as _;
