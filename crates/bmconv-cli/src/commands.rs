//! Main commands enum and their arguments.
//!
//! This module defines the available commands for the CLI tool.

use std::path::PathBuf;

use bmconv_core::{ConvertSettings, HeaderGeneration, SchemeKind};
use clap::{Args, Subcommand, ValueEnum};

/// Available commands for the converter.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a checkpoint, GGUF container or fp32 stream into a weight stream
    Convert(ConvertArgs),

    /// Check a written stream's header and, with --scheme, its block layout
    Validate(ValidateArgs),

    /// Show a source's config, tensors and resolved weight plan
    Inspect(InspectArgs),

    /// Rewrite a stream's header in a newer generation
    UpgradeHeader(UpgradeArgs),
}

/// Weight encoding.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeArg {
    Fp32,
    Int4,
    Q6,
}

impl From<SchemeArg> for SchemeKind {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Fp32 => Self::Fp32,
            SchemeArg::Int4 => Self::Int4,
            SchemeArg::Q6 => Self::Q6,
        }
    }
}

/// Header generation: legacy (28 bytes), typed (32) or rope (36).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderArg {
    Legacy,
    Typed,
    Rope,
}

impl From<HeaderArg> for HeaderGeneration {
    fn from(arg: HeaderArg) -> Self {
        match arg {
            HeaderArg::Legacy => Self::Legacy,
            HeaderArg::Typed => Self::Typed,
            HeaderArg::Rope => Self::Rope,
        }
    }
}

/// Options shared by commands that write or read a stream.
#[derive(Args, Debug, Clone, Default)]
pub struct EncodingArgs {
    /// Weight encoding
    #[arg(long, value_enum, env = "BMCONV_SCHEME")]
    pub scheme: Option<SchemeArg>,

    /// INT4 group size (even, 2 to 4096)
    #[arg(long, env = "BMCONV_GROUP_SIZE")]
    pub group_size: Option<usize>,

    /// Architecture tag selecting weight order and key spellings
    #[arg(long = "arch", env = "BMCONV_ARCH")]
    pub arch: Option<String>,

    /// Header generation
    #[arg(long, value_enum, env = "BMCONV_HEADER")]
    pub header: Option<HeaderArg>,
}

impl EncodingArgs {
    /// Settings carrying only the flags that were given.
    pub fn to_settings(&self) -> ConvertSettings {
        ConvertSettings {
            scheme: self.scheme.map(Into::into),
            group_size: self.group_size,
            architecture: self.arch.clone(),
            header: self.header.map(Into::into),
            ..ConvertSettings::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input: .gguf, .safetensors (file or directory), or an fp32 stream
    pub input: PathBuf,

    /// Output stream path
    pub output: PathBuf,

    #[command(flatten)]
    pub encoding: EncodingArgs,

    /// Fail on missing tensors, unsupported dtypes and shape mismatches
    #[arg(long, env = "BMCONV_STRICT")]
    pub strict: bool,

    /// Rotary base frequency to write (needs a rope header)
    #[arg(long)]
    pub rope_theta: Option<f32>,

    /// Model type tag to write (needs a typed or rope header)
    #[arg(long)]
    pub model_type: Option<i32>,

    /// Write a separate classifier instead of sharing the embedding table
    #[arg(long)]
    pub separate_classifier: bool,

    /// JSON settings file; flags override its values
    #[arg(long, env = "BMCONV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Transformers config.json for a safetensors input without one beside it
    #[arg(long)]
    pub hf_config: Option<PathBuf>,

    /// Header generation of an fp32 stream input (inferred from its length if omitted)
    #[arg(long, value_enum)]
    pub input_header: Option<HeaderArg>,
}

impl ConvertArgs {
    /// Settings from the flags alone, to be merged over a settings file.
    pub fn to_settings(&self) -> ConvertSettings {
        ConvertSettings {
            strict: self.strict.then_some(true),
            rope_theta: self.rope_theta,
            model_type: self.model_type,
            shared_classifier: self.separate_classifier.then_some(false),
            ..self.encoding.to_settings()
        }
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Stream to validate
    pub file: PathBuf,

    #[command(flatten)]
    pub encoding: EncodingArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input: .gguf, .safetensors (file or directory), or an fp32 stream
    pub input: PathBuf,

    /// Architecture tag used to resolve the weight plan
    #[arg(long = "arch", env = "BMCONV_ARCH")]
    pub arch: Option<String>,

    /// Transformers config.json for a safetensors input without one beside it
    #[arg(long)]
    pub hf_config: Option<PathBuf>,

    /// Header generation of an fp32 stream input (inferred from its length if omitted)
    #[arg(long, value_enum)]
    pub input_header: Option<HeaderArg>,
}

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Existing stream
    pub input: PathBuf,

    /// Upgraded stream path
    pub output: PathBuf,

    /// Generation of the existing header
    #[arg(long, value_enum, default_value = "legacy")]
    pub from: HeaderArg,

    /// Generation to write
    #[arg(long, value_enum, default_value = "rope")]
    pub to: HeaderArg,

    /// Rotary base frequency to write
    #[arg(long)]
    pub rope_theta: Option<f32>,

    /// Model type tag to write
    #[arg(long)]
    pub model_type: Option<i32>,
}
