//! Port definitions (trait abstractions) for tensor sources.
//!
//! Adapter crates (`bmconv-gguf`, `bmconv-checkpoint`) implement these
//! against their container formats; nothing here knows about files.

pub mod tensor_source;

pub use tensor_source::{TensorFetch, TensorSource};
