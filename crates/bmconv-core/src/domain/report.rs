//! End-of-run reporting types.
//!
//! Per-tensor outcomes are tagged rather than discarded, so every skipped
//! slot, unsupported dtype or ignored metadata key is visible after the run.

use std::fmt;

/// Outcome of one resolved weight slot.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorOutcome {
    /// The tensor was encoded and appended.
    Written {
        slot: String,
        name: String,
        original_bytes: u64,
        encoded_bytes: u64,
    },
    /// No alias of the slot exists in the source.
    SkippedMissing { slot: String, attempted: Vec<String> },
    /// The tensor exists but its dtype cannot be widened.
    SkippedUnsupportedDtype {
        slot: String,
        name: String,
        dtype: String,
    },
}

impl TensorOutcome {
    pub fn slot(&self) -> &str {
        match self {
            Self::Written { slot, .. }
            | Self::SkippedMissing { slot, .. }
            | Self::SkippedUnsupportedDtype { slot, .. } => slot,
        }
    }

    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// A tolerated condition surfaced in the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    MissingTensor { slot: String, attempted: Vec<String> },
    UnsupportedDtype { name: String, dtype: String },
    UnknownMetadataType { key: String, type_code: u32 },
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTensor { slot, attempted } => {
                write!(f, "missing tensor for {slot} (tried {})", attempted.join(", "))
            }
            Self::UnsupportedDtype { name, dtype } => {
                write!(f, "skipped {name}: unsupported dtype {dtype}")
            }
            Self::UnknownMetadataType { key, type_code } => {
                write!(f, "ignored metadata key {key}: value type {type_code}")
            }
            Self::ShapeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "{name} has {actual} elements, config expects {expected}"
            ),
        }
    }
}

/// Original-vs-encoded byte totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionStats {
    /// Bytes the written tensors occupy as f32.
    pub original_bytes: u64,
    /// Bytes appended to the stream for those tensors, block framing included.
    pub encoded_bytes: u64,
}

impl CompressionStats {
    pub const fn record(&mut self, original: u64, encoded: u64) {
        self.original_bytes += original;
        self.encoded_bytes += encoded;
    }

    /// Original size divided by encoded size (`1.0` when nothing was written).
    pub fn ratio(&self) -> f64 {
        if self.encoded_bytes == 0 {
            1.0
        } else {
            self.original_bytes as f64 / self.encoded_bytes as f64
        }
    }

    /// Percentage of bytes saved relative to f32.
    pub fn savings_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            0.0
        } else {
            (1.0 - self.encoded_bytes as f64 / self.original_bytes as f64) * 100.0
        }
    }
}

/// Everything a conversion run produced besides the output bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    pub header_bytes: u64,
    pub outcomes: Vec<TensorOutcome>,
    pub warnings: Vec<RunWarning>,
    pub stats: CompressionStats,
}

impl ConversionReport {
    pub fn written_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.written_count()
    }

    /// Total bytes in the output stream.
    pub const fn total_bytes(&self) -> u64 {
        self.header_bytes + self.stats.encoded_bytes
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
