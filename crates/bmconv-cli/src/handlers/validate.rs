//! Validate command handler.

use bmconv_core::{ValidateOptions, validate_file, validate_settings};

use crate::commands::ValidateArgs;
use crate::error::CliError;
use crate::presentation::print_validation_report;

/// Build validator options from the flags.
///
/// Blocks are only walked when a scheme is given.
pub fn options_from_args(args: &ValidateArgs) -> Result<ValidateOptions, CliError> {
    let settings = args.encoding.to_settings();
    validate_settings(&settings)?;
    Ok(ValidateOptions {
        scheme: settings.scheme.map(|_| settings.effective_scheme()),
        architecture: settings.effective_architecture().to_string(),
        generation: settings.header,
    })
}

/// Execute the validate command.
///
/// An incomplete block walk is reported and then fails with a data error.
pub fn execute(args: &ValidateArgs) -> Result<(), CliError> {
    let options = options_from_args(args)?;
    let report = validate_file(&args.file, &options)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Data(format!("cannot encode report: {e}")))?;
        println!("{json}");
    } else {
        println!("Stream: {}", args.file.display());
        print_validation_report(&report);
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::Data(format!(
            "{} does not match the expected block layout",
            args.file.display()
        )))
    }
}
