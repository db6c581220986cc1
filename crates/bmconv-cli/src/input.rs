//! Input selection.
//!
//! Picks a tensor source from the input path and seeds the model config
//! from it.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bmconv_checkpoint::SafetensorsSource;
use bmconv_core::{HeaderGeneration, LegacyStreamSource, ModelConfig, TensorSource};
use bmconv_gguf::GgufSource;

use crate::error::CliError;

/// Kind of input, decided by the path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Gguf,
    Safetensors,
    /// A previously written fp32 stream.
    Stream,
}

impl InputKind {
    /// `.gguf` files are GGUF; `.safetensors` files and directories are
    /// checkpoints; anything else is an fp32 stream.
    pub fn detect(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gguf") => Self::Gguf,
            Some("safetensors") => Self::Safetensors,
            _ if path.is_dir() => Self::Safetensors,
            _ => Self::Stream,
        }
    }
}

/// An opened source.
pub enum Input {
    Gguf(GgufSource<BufReader<File>>),
    Safetensors(SafetensorsSource),
    Stream(LegacyStreamSource<BufReader<File>>),
}

impl Input {
    pub fn source_mut(&mut self) -> &mut dyn TensorSource {
        match self {
            Self::Gguf(source) => source,
            Self::Safetensors(source) => source,
            Self::Stream(source) => source,
        }
    }

    pub fn source(&self) -> &dyn TensorSource {
        match self {
            Self::Gguf(source) => source,
            Self::Safetensors(source) => source,
            Self::Stream(source) => source,
        }
    }
}

/// Options for opening an input.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions<'a> {
    /// Architecture the weights are laid out for; used by fp32 streams.
    pub architecture: &'a str,
    /// Explicit `config.json` for a safetensors checkpoint.
    pub hf_config: Option<&'a Path>,
    /// Header generation of an fp32 stream.
    pub input_header: Option<HeaderGeneration>,
}

/// Open `path` and read the model config it carries.
pub fn open_input(path: &Path, options: OpenOptions<'_>) -> Result<(Input, ModelConfig), CliError> {
    if !path.exists() {
        return Err(CliError::Input(format!("{} does not exist", path.display())));
    }

    let kind = InputKind::detect(path);
    tracing::debug!(path = %path.display(), ?kind, "Opening input");
    match kind {
        InputKind::Gguf => {
            let source = GgufSource::open(path)?;
            let config = source.model_config();
            Ok((Input::Gguf(source), config))
        }
        InputKind::Safetensors => {
            let source = SafetensorsSource::open(path)?;
            let config = match options.hf_config {
                Some(hf_config) => source.model_config_from(hf_config)?,
                None => source.model_config()?.ok_or_else(|| {
                    CliError::Input(format!(
                        "no config.json beside {}; pass --hf-config",
                        path.display()
                    ))
                })?,
            };
            Ok((Input::Safetensors(source), config))
        }
        InputKind::Stream => {
            let reader = BufReader::new(File::open(path)?);
            let source = LegacyStreamSource::open(reader, options.input_header, options.architecture)?;
            let config = *source.config();
            Ok((Input::Stream(source), config))
        }
    }
}
