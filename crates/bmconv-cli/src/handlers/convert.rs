//! Convert command handler.

use std::fs::File;
use std::io::BufWriter;

use bmconv_core::{
    ConvertSettings, HeaderGeneration, SerializeOptions, Serializer, estimate_output_size,
    load_settings, resolve, validate_settings,
};
use tracing::{info, warn};

use crate::commands::ConvertArgs;
use crate::error::CliError;
use crate::input::{OpenOptions, open_input};
use crate::presentation::{ConversionProgress, format_bytes, print_config, print_conversion_report};

/// Settings file, then flags, over the defaults.
pub fn resolve_settings(args: &ConvertArgs) -> Result<ConvertSettings, CliError> {
    let mut settings = ConvertSettings::with_defaults();
    if let Some(path) = &args.config {
        settings.merge(&load_settings(path)?);
    }
    settings.merge(&args.to_settings());
    validate_settings(&settings)?;
    Ok(settings)
}

/// Execute the convert command.
pub fn execute(args: &ConvertArgs, quiet: bool) -> Result<(), CliError> {
    if args.input == args.output {
        return Err(CliError::Arguments(
            "input and output must be different files".to_string(),
        ));
    }

    let settings = resolve_settings(args)?;
    let architecture = settings.effective_architecture();
    let (mut input, source_config) = open_input(
        &args.input,
        OpenOptions {
            architecture,
            hf_config: args.hf_config.as_deref(),
            input_header: args.input_header.map(Into::into),
        },
    )?;

    let config = settings.apply_to(source_config);
    config.validate()?;
    let plan = resolve(architecture, &config)?;
    let options = SerializeOptions::from_settings(&settings, &config);
    if options.generation < HeaderGeneration::for_config(&config) {
        warn!(
            header = ?options.generation,
            "Header generation drops model_type or rope_theta from the config"
        );
    }

    println!("Converting {}", input.source().label());
    print_config(&config);
    let estimate = estimate_output_size(&config, &plan, options.scheme, options.generation);
    info!(
        architecture,
        scheme = %options.scheme,
        estimate,
        "Planned {} tensors",
        plan.len()
    );
    println!(
        "Plan: {} tensors, {} order, {} encoding, ~{}",
        plan.len(),
        plan.architecture().tag,
        options.scheme,
        format_bytes(estimate)
    );

    let progress = ConversionProgress::new(plan.len(), quiet);
    let mut out = BufWriter::new(File::create(&args.output)?);
    let result = Serializer::new(&config, &plan, options).write_with_progress(
        input.source_mut(),
        &mut out,
        |done, total| progress.update(done, total),
    );
    progress.finish();

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            drop(out);
            // A failed job leaves no partial stream behind.
            if let Err(remove_err) = std::fs::remove_file(&args.output) {
                warn!(path = %args.output.display(), error = %remove_err, "Could not remove partial output");
            }
            return Err(err.into());
        }
    };

    println!();
    print_conversion_report(&report);
    println!("Output: {}", args.output.display());
    Ok(())
}
