//! Report rendering for conversion, validation and config output.

use bmconv_core::{ConversionReport, ModelConfig, TensorOutcome, ValidationReport};

use super::tables::{format_bytes, print_separator, truncate_string};

/// Print the header fields of a model config.
pub fn print_config(config: &ModelConfig) {
    println!("  dim:          {}", config.dim());
    println!("  hidden_dim:   {}", config.hidden_dim());
    println!("  n_layers:     {}", config.n_layers());
    println!("  n_heads:      {}", config.n_heads());
    println!("  n_kv_heads:   {}", config.n_kv_heads());
    println!(
        "  vocab_size:   {} ({} classifier)",
        config.vocab_size(),
        if config.shared_classifier() {
            "shared"
        } else {
            "separate"
        }
    );
    println!("  seq_len:      {}", config.seq_len());
    if let Some(model_type) = config.model_type() {
        println!("  model_type:   {model_type}");
    }
    if let Some(theta) = config.rope_theta() {
        println!("  rope_theta:   {theta}");
    }
}

/// Savings of `encoded` relative to `original`, in percent.
fn savings(original: u64, encoded: u64) -> f64 {
    if original == 0 {
        0.0
    } else {
        (1.0 - encoded as f64 / original as f64) * 100.0
    }
}

/// Print per-tensor outcomes, warnings and the compression summary.
pub fn print_conversion_report(report: &ConversionReport) {
    println!(
        "{:<28} {:<40} {:>10} {:>10} {:>8}",
        "Slot", "Tensor", "Original", "Encoded", "Saved"
    );
    print_separator(100);

    for outcome in &report.outcomes {
        match outcome {
            TensorOutcome::Written {
                slot,
                name,
                original_bytes,
                encoded_bytes,
            } => println!(
                "{:<28} {:<40} {:>10} {:>10} {:>7.1}%",
                truncate_string(slot, 27),
                truncate_string(name, 39),
                format_bytes(*original_bytes),
                format_bytes(*encoded_bytes),
                savings(*original_bytes, *encoded_bytes)
            ),
            TensorOutcome::SkippedMissing { slot, .. } => {
                println!("{:<28} {:<40} {:>10}", truncate_string(slot, 27), "--", "missing");
            }
            TensorOutcome::SkippedUnsupportedDtype { slot, name, dtype } => println!(
                "{:<28} {:<40} {:>10}",
                truncate_string(slot, 27),
                truncate_string(name, 39),
                format!("skip {dtype}")
            ),
        }
    }
    print_separator(100);

    if !report.warnings.is_empty() {
        println!("\n{} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }

    println!(
        "\nWrote {} of {} tensors: {} ({} header), {:.2}x smaller than f32 ({:.1}% saved)",
        report.written_count(),
        report.outcomes.len(),
        format_bytes(report.total_bytes()),
        format_bytes(report.header_bytes),
        report.stats.ratio(),
        report.stats.savings_percent()
    );
}

/// Print a validation report.
pub fn print_validation_report(report: &ValidationReport) {
    println!(
        "Header:     {:?} ({} bytes{})",
        report.generation,
        report.generation.size(),
        if report.generation_assumed {
            ", assumed from length; pass --header if the stream was written otherwise"
        } else {
            ""
        }
    );
    print_config(&report.config);
    println!("Rope:       {}", report.rope_format);
    println!("Attention:  {}", report.attention);

    match &report.walk {
        Some(walk) => {
            println!(
                "Blocks:     {}/{} read{}",
                walk.blocks_read,
                walk.blocks_expected,
                if walk.truncated { ", stream truncated" } else { "" }
            );
            if walk.trailing_bytes > 0 {
                println!("Trailing:   {} unexpected bytes", walk.trailing_bytes);
            }
        }
        None => println!("Blocks:     not checked (pass --scheme to walk them)"),
    }

    println!("Result:     {}", if report.is_valid() { "OK" } else { "INVALID" });
}
