//! Upgrade-header command handler.

use bmconv_core::{UpgradeOptions, upgrade_header_file};

use crate::commands::UpgradeArgs;
use crate::error::CliError;
use crate::presentation::{format_bytes, print_config};

/// Execute the upgrade-header command.
pub fn execute(args: &UpgradeArgs) -> Result<(), CliError> {
    if let Some(theta) = args.rope_theta {
        if !theta.is_finite() || theta <= 0.0 {
            return Err(CliError::Arguments(format!(
                "rope theta must be a positive finite number, got {theta}"
            )));
        }
    }

    let options = UpgradeOptions {
        from: args.from.into(),
        to: args.to.into(),
        model_type: args.model_type,
        rope_theta: args.rope_theta,
    };
    let summary = upgrade_header_file(&args.input, &args.output, &options)?;

    println!(
        "Upgraded header {:?} ({} bytes) -> {:?} ({} bytes), copied {} of weights",
        summary.from,
        summary.from.size(),
        summary.to,
        summary.to.size(),
        format_bytes(summary.weight_bytes)
    );
    print_config(&summary.config);
    println!("Output: {}", args.output.display());
    Ok(())
}
