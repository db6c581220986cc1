//! Header upgrade.
//!
//! Rewrites a stream's header in a newer generation and copies every weight
//! byte after it unchanged.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use crate::codec::{HeaderGeneration, read_header, write_header};
use crate::domain::ModelConfig;
use crate::error::{ConvertError, Result};

/// What to upgrade from and to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeOptions {
    /// Generation of the existing header. Weights follow the header, so it
    /// cannot be detected from the byte count.
    pub from: HeaderGeneration,
    pub to: HeaderGeneration,
    pub model_type: Option<i32>,
    pub rope_theta: Option<f32>,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            from: HeaderGeneration::Legacy,
            to: HeaderGeneration::Rope,
            model_type: None,
            rope_theta: None,
        }
    }
}

/// Result of an upgrade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeSummary {
    pub config: ModelConfig,
    pub from: HeaderGeneration,
    pub to: HeaderGeneration,
    pub weight_bytes: u64,
}

/// Copy `input` to `out` with its header rewritten.
pub fn upgrade_header<R, W>(input: &mut R, out: &mut W, options: &UpgradeOptions) -> Result<UpgradeSummary>
where
    R: Read + Seek,
    W: Write,
{
    if options.to < options.from {
        return Err(ConvertError::format(format!(
            "cannot downgrade a {:?} header to {:?}",
            options.from, options.to
        )));
    }

    let (mut config, from) = read_header(input, Some(options.from))?;
    if let Some(model_type) = options.model_type {
        config = config.with_model_type(model_type);
    }
    if let Some(theta) = options.rope_theta {
        config = config.with_rope_theta(theta);
    }
    if HeaderGeneration::for_config(&config) > options.to {
        return Err(ConvertError::format(format!(
            "a {:?} header cannot carry the requested fields",
            options.to
        )));
    }

    write_header(out, &config, options.to)?;
    let weight_bytes = io::copy(input, out)?;
    out.flush()?;

    tracing::info!(?from, to = ?options.to, weight_bytes, "Upgraded header");
    Ok(UpgradeSummary {
        config,
        from,
        to: options.to,
        weight_bytes,
    })
}

/// Upgrade the stream at `input` into a new file at `output`.
pub fn upgrade_header_file(input: &Path, output: &Path, options: &UpgradeOptions) -> Result<UpgradeSummary> {
    if output.exists() && input.canonicalize()? == output.canonicalize()? {
        return Err(ConvertError::format(format!(
            "refusing to upgrade {} in place",
            input.display()
        )));
    }
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    upgrade_header(&mut reader, &mut writer, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_header;
    use std::io::Cursor;

    fn legacy_stream() -> Vec<u8> {
        let mut bytes = encode_header(&ModelConfig::new(8, 16, 1, 2, 1, 10, 4), HeaderGeneration::Legacy);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        bytes
    }

    #[test]
    fn test_legacy_to_rope_keeps_weights() {
        let options = UpgradeOptions {
            model_type: Some(2),
            rope_theta: Some(500_000.0),
            ..UpgradeOptions::default()
        };
        let mut out = Vec::new();
        let summary = upgrade_header(&mut Cursor::new(legacy_stream()), &mut out, &options).unwrap();

        assert_eq!(summary.weight_bytes, 8);
        assert_eq!(out.len(), 36 + 8);
        assert_eq!(&out[36..], [1, 2, 3, 4, 5, 6, 7, 8]);

        let (config, generation) = read_header(&mut Cursor::new(&out), Some(HeaderGeneration::Rope)).unwrap();
        assert_eq!(generation, HeaderGeneration::Rope);
        assert_eq!(config.model_type(), Some(2));
        assert_eq!(config.rope_theta(), Some(500_000.0));
        assert_eq!(config.dim(), 8);
    }

    #[test]
    fn test_downgrade_is_rejected() {
        let options = UpgradeOptions {
            from: HeaderGeneration::Rope,
            to: HeaderGeneration::Typed,
            ..UpgradeOptions::default()
        };
        let err = upgrade_header(&mut Cursor::new(vec![0; 40]), &mut Vec::new(), &options).unwrap_err();
        assert!(matches!(err, ConvertError::Format(_)));
    }

    #[test]
    fn test_target_too_small_for_overrides() {
        let options = UpgradeOptions {
            to: HeaderGeneration::Typed,
            rope_theta: Some(500_000.0),
            ..UpgradeOptions::default()
        };
        assert!(upgrade_header(&mut Cursor::new(legacy_stream()), &mut Vec::new(), &options).is_err());
    }

    #[test]
    fn test_in_place_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, legacy_stream()).unwrap();
        let err = upgrade_header_file(&path, &path, &UpgradeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("in place"));
        assert_eq!(std::fs::read(&path).unwrap(), legacy_stream());
    }
}
