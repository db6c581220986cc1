//! Weight encodings for the output stream.
//!
//! One tensor is encoded at a time. Every scheme refuses non-finite input
//! with [`ConvertError::FatalData`] before any byte is written, and the
//! grouped schemes also refuse groups whose scale overflows or underflows.

pub mod fp32;
pub mod int4;
pub mod q6;

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Tensor;
use crate::error::{ConvertError, DataFault, Result};

pub use int4::{DEFAULT_GROUP_SIZE, Int4Block};
pub use q6::Q6Block;

/// Scheme selector as it appears in settings files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Fp32,
    Int4,
    Q6,
}

impl SchemeKind {
    pub const ALL: [Self; 3] = [Self::Fp32, Self::Int4, Self::Q6];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Int4 => "int4",
            Self::Q6 => "q6",
        }
    }

    /// Concrete scheme; `group_size` only matters for INT4.
    pub const fn with_group_size(self, group_size: usize) -> QuantScheme {
        match self {
            Self::Fp32 => QuantScheme::Fp32,
            Self::Int4 => QuantScheme::Int4 { group_size },
            Self::Q6 => QuantScheme::Q6,
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeKind {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConvertError::format(format!("unknown quantization scheme '{s}'")))
    }
}

/// A fully parameterized encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuantScheme {
    #[default]
    Fp32,
    Int4 { group_size: usize },
    Q6,
}

impl QuantScheme {
    pub const fn kind(self) -> SchemeKind {
        match self {
            Self::Fp32 => SchemeKind::Fp32,
            Self::Int4 { .. } => SchemeKind::Int4,
            Self::Q6 => SchemeKind::Q6,
        }
    }

    /// Group size used by the scheme, if grouped.
    pub const fn group_size(self) -> Option<usize> {
        match self {
            Self::Fp32 => None,
            Self::Int4 { group_size } => Some(group_size),
            Self::Q6 => Some(q6::GROUP_SIZE),
        }
    }

    /// Encode one tensor and append it to `out`. Returns bytes written.
    pub fn encode<W: Write>(self, tensor: &Tensor, out: &mut W) -> Result<u64> {
        if let Some((index, value)) = tensor.first_non_finite() {
            return Err(fatal(tensor, DataFault::NonFinite { index, value }));
        }
        match self {
            Self::Fp32 => fp32::write_values(tensor.data(), out),
            Self::Int4 { group_size } => {
                let block = Int4Block::quantize(tensor.data(), group_size);
                if let Some((group, scale)) = block.degenerate_group() {
                    return Err(fatal(tensor, DataFault::Scale { group, scale }));
                }
                block.write_to(out)
            }
            Self::Q6 => {
                let block = Q6Block::quantize(tensor.data());
                if let Some((group, scale)) = block.degenerate_group() {
                    return Err(fatal(tensor, DataFault::Scale { group, scale }));
                }
                block.write_to(out)
            }
        }
    }

    /// Read back one block holding `n_elements` values.
    pub fn decode<R: Read>(self, input: &mut R, n_elements: usize) -> Result<Vec<f32>> {
        let values = match self {
            Self::Fp32 => return fp32::read_values(input, n_elements),
            Self::Int4 { group_size } => Int4Block::read_from(input, group_size)?.dequantize(),
            Self::Q6 => Q6Block::read_from(input)?.dequantize(),
        };
        if values.len() != n_elements {
            return Err(ConvertError::format(format!(
                "block holds {} elements, expected {n_elements}",
                values.len()
            )));
        }
        Ok(values)
    }

    /// Exact bytes one encoded block of `n_elements` occupies, framing included.
    pub const fn encoded_len(self, n_elements: usize) -> usize {
        match self {
            Self::Fp32 => fp32::encoded_len(n_elements),
            Self::Int4 { group_size } => int4::PREFIX_LEN + int4::estimate_size(n_elements, group_size),
            Self::Q6 => q6::encoded_len(n_elements),
        }
    }

    /// Payload size estimate, excluding per-block framing.
    pub const fn estimate_size(self, n_elements: usize) -> usize {
        match self {
            Self::Fp32 => fp32::encoded_len(n_elements),
            Self::Int4 { group_size } => int4::estimate_size(n_elements, group_size),
            Self::Q6 => q6::encoded_len(n_elements) - q6::HEADER_LEN,
        }
    }
}

fn fatal(tensor: &Tensor, fault: DataFault) -> ConvertError {
    ConvertError::FatalData {
        tensor: tensor.name().to_string(),
        fault,
    }
}

impl fmt::Display for QuantScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fp32 => write!(f, "fp32"),
            Self::Int4 { group_size } => write!(f, "int4 (group size {group_size})"),
            Self::Q6 => write!(f, "q6 (group size {})", q6::GROUP_SIZE),
        }
    }
}
