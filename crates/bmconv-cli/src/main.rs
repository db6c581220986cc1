//! CLI entry point - the composition root.
//!
//! Loads `.env`, installs logging, parses arguments and maps handler errors
//! onto exit codes. A malformed `.env` fails through `anyhow` before any
//! command runs.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bmconv_cli::{Cli, load_dotenv, run};

fn init_logging(verbose: bool) {
    // RUST_LOG wins; otherwise --verbose selects debug.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    // Load environment variables before parsing so BMCONV_* flags see them
    load_dotenv()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
    Ok(())
}
