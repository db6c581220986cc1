//! Command flow tests over fp32 streams written in-test.

use std::path::Path;

use bmconv_cli::{Cli, run};
use bmconv_core::{
    HeaderGeneration, ModelConfig, QuantScheme, ValidateOptions, encode_header, resolve,
    validate_file,
};
use clap::Parser;

fn tiny() -> ModelConfig {
    ModelConfig::new(8, 16, 1, 2, 1, 10, 4)
}

/// A legacy-header fp32 stream for the llama2 plan.
fn write_stream(path: &Path, config: &ModelConfig, generation: HeaderGeneration) {
    let plan = resolve("llama2", config).unwrap();
    let mut bytes = encode_header(config, generation);
    for (i, slot) in plan.slots().iter().enumerate() {
        for j in 0..slot.kind.element_count(config) {
            let value = (i as f32 - 5.0) * 0.1 + (j % 3) as f32 * 0.01;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    std::fs::write(path, bytes).unwrap();
}

fn bmconv(args: &[&str]) -> Result<(), bmconv_cli::CliError> {
    let mut argv = vec!["bmconv"];
    argv.extend_from_slice(args);
    run(&Cli::parse_from(argv))
}

#[test]
fn test_requantize_stream_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("model.bin");
    let output = dir.path().join("model-q6.bin");
    write_stream(&input, &tiny(), HeaderGeneration::Legacy);

    bmconv(&[
        "convert",
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--scheme",
        "q6",
        "--header",
        "typed",
        "--model-type",
        "1",
        "--strict",
    ])
    .unwrap();

    let report = validate_file(
        &output,
        &ValidateOptions {
            scheme: Some(QuantScheme::Q6),
            generation: Some(HeaderGeneration::Typed),
            ..ValidateOptions::default()
        },
    )
    .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.config.model_type(), Some(1));
    assert_eq!(report.attention.group_ratio, 2);

    bmconv(&[
        "validate",
        output.to_str().unwrap(),
        "--scheme",
        "q6",
        "--header",
        "typed",
    ])
    .unwrap();
}

#[test]
fn test_validate_with_wrong_scheme_fails_with_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("model.bin");
    let output = dir.path().join("model-int4.bin");
    write_stream(&input, &tiny(), HeaderGeneration::Legacy);

    bmconv(&[
        "convert",
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--scheme",
        "int4",
        "--group-size",
        "8",
        "--header",
        "typed",
    ])
    .unwrap();

    let err = bmconv(&["validate", output.to_str().unwrap(), "--scheme", "fp32", "--header", "typed"])
        .unwrap_err();
    assert_eq!(err.exit_code(), 65);
}

#[test]
fn test_upgrade_header_and_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("legacy.bin");
    let upgraded = dir.path().join("rope.bin");
    write_stream(&input, &tiny(), HeaderGeneration::Legacy);

    bmconv(&[
        "upgrade-header",
        input.to_str().unwrap(),
        upgraded.to_str().unwrap(),
        "--rope-theta",
        "500000",
    ])
    .unwrap();

    let before = std::fs::read(&input).unwrap();
    let after = std::fs::read(&upgraded).unwrap();
    assert_eq!(after.len(), before.len() + 8);
    assert_eq!(after[36..], before[28..]);

    // The upgraded stream's generation is inferred from its length.
    bmconv(&["inspect", upgraded.to_str().unwrap()]).unwrap();
}

#[test]
fn test_missing_input_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let err = bmconv(&[
        "convert",
        dir.path().join("absent.gguf").to_str().unwrap(),
        dir.path().join("out.bin").to_str().unwrap(),
    ])
    .unwrap_err();
    assert_eq!(err.exit_code(), 66);
    assert!(!dir.path().join("out.bin").exists());
}
