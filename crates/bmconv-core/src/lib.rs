#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod codec;
pub mod domain;
pub mod error;
pub mod layout;
pub mod ports;
pub mod quant;
pub mod services;
pub mod settings;
pub mod sources;

// Re-export commonly used types for convenience
pub use codec::{HeaderGeneration, decode_header, decode_header_as, encode_header, read_header};
pub use domain::{
    CompressionStats, ConversionReport, GgufValue, LEGACY_ROPE_THETA, MODERN_ROPE_THETA,
    ModelConfig, RunWarning, SourceDtype, Tensor, TensorOutcome,
};
pub use error::{ConvertError, DataFault, Result};
pub use layout::{KeyFamily, Layout, WeightKind, WeightPlan, WeightSlot, resolve};
pub use ports::{TensorFetch, TensorSource};
pub use quant::{QuantScheme, SchemeKind};
pub use services::{
    AttentionProfile, RopeFormat, SerializeOptions, Serializer, StreamWalk, UpgradeOptions,
    UpgradeSummary, ValidateOptions, ValidationReport, estimate_output_size, upgrade_header,
    upgrade_header_file, validate, validate_file,
};
pub use settings::{ConvertSettings, SettingsError, load_settings, validate_settings};
pub use sources::{CheckpointMap, LegacyStreamSource};

// Property tests live in tests/
#[cfg(test)]
use proptest as _;
