//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the weight stream converter.
///
/// This is the top-level parser that handles global options and dispatches
/// to subcommands.
#[derive(Parser, Debug)]
#[command(name = "bmconv")]
#[command(about = "Convert model weights into bare-metal inference streams")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{HeaderArg, SchemeArg};
    use bmconv_core::{QuantScheme, SchemeKind};
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        // Verify the CLI parser can be constructed
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_flags() {
        let cli = Cli::parse_from([
            "bmconv",
            "--verbose",
            "convert",
            "model.gguf",
            "model.bin",
            "--scheme",
            "int4",
            "--group-size",
            "64",
            "--strict",
            "--header",
            "rope",
        ]);
        assert!(cli.verbose);
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.encoding.scheme, Some(SchemeArg::Int4));
        assert_eq!(args.encoding.header, Some(HeaderArg::Rope));

        let settings = args.to_settings();
        assert_eq!(settings.scheme, Some(SchemeKind::Int4));
        assert_eq!(settings.effective_scheme(), QuantScheme::Int4 { group_size: 64 });
        assert!(settings.effective_strict());
        assert_eq!(settings.shared_classifier, None);
    }

    #[test]
    fn test_unset_flags_leave_settings_empty() {
        let cli = Cli::parse_from(["bmconv", "convert", "in.safetensors", "out.bin"]);
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.to_settings(), bmconv_core::ConvertSettings::default());
    }

    #[test]
    fn test_upgrade_defaults() {
        let cli = Cli::parse_from(["bmconv", "upgrade-header", "a.bin", "b.bin"]);
        let Commands::UpgradeHeader(args) = cli.command else {
            panic!("expected upgrade-header");
        };
        assert_eq!(args.from, HeaderArg::Legacy);
        assert_eq!(args.to, HeaderArg::Rope);
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        assert!(Cli::try_parse_from(["bmconv", "convert", "a", "b", "--scheme", "q8"]).is_err());
    }
}
