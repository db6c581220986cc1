//! Built-in tensor sources that need no container parser.

pub mod checkpoint;
pub mod legacy;

pub use checkpoint::CheckpointMap;
pub use legacy::LegacyStreamSource;
