#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use tracing_subscriber as _;

use anyhow::Context;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod input;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;

/// Dispatch a parsed command to its handler.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::Convert(args) => handlers::convert::execute(args, false),
        Commands::Validate(args) => handlers::validate::execute(args),
        Commands::Inspect(args) => handlers::inspect::execute(args),
        Commands::UpgradeHeader(args) => handlers::upgrade::execute(args),
    }
}

/// Load `.env` if one exists. A missing file is fine; a malformed one is not.
pub fn load_dotenv() -> anyhow::Result<()> {
    tolerate_missing(dotenvy::dotenv().map(|_| ()))
}

fn tolerate_missing(result: Result<(), dotenvy::Error>) -> anyhow::Result<()> {
    match result {
        Err(err) if err.not_found() => Ok(()),
        other => other.context("Failed to load .env"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tolerate_missing(dotenvy::from_path(dir.path().join(".env"))).is_ok());
    }

    #[test]
    fn test_malformed_env_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "not valid\n").unwrap();
        let err = tolerate_missing(dotenvy::from_path(&path)).unwrap_err();
        assert!(err.to_string().contains(".env"));
    }
}
