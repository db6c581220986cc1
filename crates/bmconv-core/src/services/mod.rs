//! Core services: the conversion pipeline's orchestration layer.
//!
//! Services drive the codecs, the layout resolver and the quantizers
//! against a [`TensorSource`](crate::ports::TensorSource); they never open
//! container formats themselves.

pub mod serializer;
pub mod upgrade;
pub mod validator;

pub use serializer::{SerializeOptions, Serializer, estimate_output_size};
pub use upgrade::{UpgradeOptions, UpgradeSummary, upgrade_header, upgrade_header_file};
pub use validator::{
    AttentionProfile, RopeFormat, StreamWalk, ValidateOptions, ValidationReport, validate,
    validate_file,
};
