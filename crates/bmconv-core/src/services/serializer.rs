//! Stream serializer.
//!
//! Drives header, plan and quantizer to produce the output stream. Tensors
//! are processed strictly one at a time (fetch, encode, write, drop), so
//! peak memory is bounded by the largest single tensor rather than the
//! model.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::codec::{HeaderGeneration, write_header};
use crate::domain::{ConversionReport, ModelConfig, RunWarning, TensorOutcome};
use crate::error::{ConvertError, Result};
use crate::layout::{WeightPlan, WeightSlot};
use crate::ports::{TensorFetch, TensorSource};
use crate::quant::QuantScheme;
use crate::settings::ConvertSettings;

// ============================================================================
// Options
// ============================================================================

/// Per-job serializer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    pub scheme: QuantScheme,
    /// Abort on the first missing or unsupported tensor instead of skipping.
    pub strict: bool,
    pub generation: HeaderGeneration,
}

impl SerializeOptions {
    /// Resolve options from settings for a given config.
    pub fn from_settings(settings: &ConvertSettings, config: &ModelConfig) -> Self {
        Self {
            scheme: settings.effective_scheme(),
            strict: settings.effective_strict(),
            generation: settings.effective_header(config),
        }
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// Writes one conversion job.
#[derive(Debug)]
pub struct Serializer<'a> {
    config: &'a ModelConfig,
    plan: &'a WeightPlan,
    options: SerializeOptions,
}

impl<'a> Serializer<'a> {
    pub const fn new(config: &'a ModelConfig, plan: &'a WeightPlan, options: SerializeOptions) -> Self {
        Self {
            config,
            plan,
            options,
        }
    }

    pub const fn options(&self) -> &SerializeOptions {
        &self.options
    }

    /// Serialize `source` into `out`.
    pub fn write<S, W>(&self, source: &mut S, out: &mut W) -> Result<ConversionReport>
    where
        S: TensorSource + ?Sized,
        W: Write,
    {
        self.write_with_progress(source, out, |_, _| {})
    }

    /// Serialize `source` into `out`, calling `progress(done, total)` after
    /// each slot.
    pub fn write_with_progress<S, W, F>(
        &self,
        source: &mut S,
        out: &mut W,
        mut progress: F,
    ) -> Result<ConversionReport>
    where
        S: TensorSource + ?Sized,
        W: Write,
        F: FnMut(usize, usize),
    {
        self.config.validate()?;
        info!(
            source = %source.label(),
            architecture = self.plan.architecture().tag,
            scheme = %self.options.scheme,
            slots = self.plan.len(),
            "Starting conversion"
        );

        let mut report = ConversionReport {
            header_bytes: write_header(out, self.config, self.options.generation)?,
            warnings: source.warnings(),
            ..ConversionReport::default()
        };

        let total = self.plan.len();
        for (done, &slot) in self.plan.slots().iter().enumerate() {
            let outcome = self.write_slot(slot, source, out, &mut report.warnings)?;
            if let TensorOutcome::Written {
                original_bytes,
                encoded_bytes,
                ..
            } = &outcome
            {
                report.stats.record(*original_bytes, *encoded_bytes);
            }
            report.outcomes.push(outcome);
            progress(done + 1, total);
        }
        out.flush()?;

        info!(
            written = report.written_count(),
            skipped = report.skipped_count(),
            bytes = report.total_bytes(),
            ratio = report.stats.ratio(),
            "Conversion finished"
        );
        Ok(report)
    }

    /// Serialize `source` into a new file at `path`.
    pub fn write_file<S>(&self, source: &mut S, path: &Path) -> Result<ConversionReport>
    where
        S: TensorSource + ?Sized,
    {
        let mut out = BufWriter::new(File::create(path)?);
        self.write(source, &mut out)
    }

    fn write_slot<S, W>(
        &self,
        slot: WeightSlot,
        source: &mut S,
        out: &mut W,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<TensorOutcome>
    where
        S: TensorSource + ?Sized,
        W: Write,
    {
        let slot_label = slot.to_string();
        let aliases = self.plan.aliases(slot);
        let Some(name) = aliases.iter().find(|alias| source.contains(alias)).cloned() else {
            if self.options.strict {
                return Err(ConvertError::MissingTensor {
                    slot: slot_label,
                    attempted: aliases,
                });
            }
            warn!(slot = %slot_label, tried = %aliases.join(", "), "Tensor missing, skipping");
            warnings.push(RunWarning::MissingTensor {
                slot: slot_label.clone(),
                attempted: aliases.clone(),
            });
            return Ok(TensorOutcome::SkippedMissing {
                slot: slot_label,
                attempted: aliases,
            });
        };

        let tensor = match source.fetch(&name)? {
            TensorFetch::Loaded(tensor) => tensor,
            TensorFetch::Unsupported { dtype } => {
                if self.options.strict {
                    return Err(ConvertError::SkippedUnsupportedDtype { name, dtype });
                }
                warn!(tensor = %name, %dtype, "Unsupported dtype, skipping");
                warnings.push(RunWarning::UnsupportedDtype {
                    name: name.clone(),
                    dtype: dtype.clone(),
                });
                return Ok(TensorOutcome::SkippedUnsupportedDtype {
                    slot: slot_label,
                    name,
                    dtype,
                });
            }
        };

        let expected = slot.kind.element_count(self.config);
        if tensor.n_elements() != expected {
            if self.options.strict {
                return Err(ConvertError::format(format!(
                    "tensor '{name}' has {} elements, {slot_label} needs {expected}",
                    tensor.n_elements()
                )));
            }
            warn!(tensor = %name, expected, actual = tensor.n_elements(), "Element count mismatch");
            warnings.push(RunWarning::ShapeMismatch {
                name: name.clone(),
                expected,
                actual: tensor.n_elements(),
            });
        }

        let encoded_bytes = self.options.scheme.encode(&tensor, out)?;
        debug!(slot = %slot_label, tensor = %name, encoded_bytes, "Wrote tensor");
        Ok(TensorOutcome::Written {
            slot: slot_label,
            original_bytes: tensor.f32_bytes(),
            name,
            encoded_bytes,
        })
    }
}

/// Expected output size for `plan` under `scheme`, header included.
pub fn estimate_output_size(
    config: &ModelConfig,
    plan: &WeightPlan,
    scheme: QuantScheme,
    generation: HeaderGeneration,
) -> u64 {
    let body: usize = plan
        .slots()
        .iter()
        .map(|slot| scheme.encoded_len(slot.kind.element_count(config)))
        .sum();
    (generation.size() + body) as u64
}
