//! Domain types shared by every crate in the workspace.

pub mod config;
pub mod gguf;
pub mod report;
pub mod tensor;

pub use config::{LEGACY_ROPE_THETA, MODERN_ROPE_THETA, ModelConfig};
pub use gguf::GgufValue;
pub use report::{CompressionStats, ConversionReport, RunWarning, TensorOutcome};
pub use tensor::{SourceDtype, Tensor};
