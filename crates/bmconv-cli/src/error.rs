//! CLI-specific error types and mappings.
//!
//! This module maps `ConvertError` and `SettingsError` onto exit codes and
//! user-facing messages.

use bmconv_core::{ConvertError, SettingsError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing or combination error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The input is malformed or cannot be converted.
    #[error("{0}")]
    Data(String),

    /// The input file is missing or of an unknown kind.
    #[error("Input error: {0}")]
    Input(String),

    /// IO error while reading or writing.
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid settings file or values.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h:
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 65: EX_DATAERR
    /// - 66: EX_NOINPUT
    /// - 74: EX_IOERR
    /// - 78: EX_CONFIG
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Data(_) => 65,
            Self::Input(_) => 66,
            Self::Io(_) => 74,
            Self::Config(_) => 78,
        }
    }
}

impl From<ConvertError> for CliError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Io(e) => Self::Io(e.to_string()),
            ConvertError::Settings(e) => Self::Config(e.to_string()),
            other => Self::Data(other.to_string()),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
