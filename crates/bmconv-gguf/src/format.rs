//! GGUF format constants and definitions.
//!
//! This module contains magic numbers, type codes, and the metadata keys the
//! converter reads from a GGUF container.

/// GGUF magic number (4 bytes): "GGUF" in little-endian.
pub const GGUF_MAGIC: [u8; 4] = [0x47, 0x47, 0x55, 0x46];

/// Supported container versions.
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 1..=3;

/// Tensor data alignment when `general.alignment` is absent.
pub const DEFAULT_ALIGNMENT: u64 = 32;

pub const ALIGNMENT_KEY: &str = "general.alignment";
pub const ARCHITECTURE_KEY: &str = "general.architecture";

/// Metadata prefix used when `general.architecture` is absent.
pub const DEFAULT_ARCHITECTURE_PREFIX: &str = "llama";

/// Tokenizer vocabulary; its length stands in for a missing vocab size.
pub const TOKENS_KEY: &str = "tokenizer.ggml.tokens";

/// Tensor whose presence means the classifier is not shared.
pub const CLASSIFIER_TENSOR: &str = "output.weight";

/// Metadata value type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    Bool,
    String,
    Array,
    U64,
    I64,
    F64,
}

impl ValueType {
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::U8,
            1 => Self::I8,
            2 => Self::U16,
            3 => Self::I16,
            4 => Self::U32,
            5 => Self::I32,
            6 => Self::F32,
            7 => Self::Bool,
            8 => Self::String,
            9 => Self::Array,
            10 => Self::U64,
            11 => Self::I64,
            12 => Self::F64,
            _ => return None,
        })
    }

    /// Encoded size of a scalar of this type; `None` for strings and arrays.
    pub const fn fixed_size(self) -> Option<u64> {
        match self {
            Self::U8 | Self::I8 | Self::Bool => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::String | Self::Array => None,
        }
    }
}

/// Tensor element types, by GGML type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GgmlDtype {
    F32,
    F16,
    BF16,
    /// Block-quantized or integer types the converter does not widen.
    Other(u32),
}

impl GgmlDtype {
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::F32,
            1 => Self::F16,
            30 => Self::BF16,
            other => Self::Other(other),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "F32",
            Self::F16 => "F16",
            Self::BF16 => "BF16",
            Self::Other(code) => match code {
                2 => "Q4_0",
                3 => "Q4_1",
                6 => "Q5_0",
                7 => "Q5_1",
                8 => "Q8_0",
                9 => "Q8_1",
                10 => "Q2_K",
                11 => "Q3_K",
                12 => "Q4_K",
                13 => "Q5_K",
                14 => "Q6_K",
                15 => "Q8_K",
                24 => "I8",
                25 => "I16",
                26 => "I32",
                27 => "I64",
                28 => "F64",
                _ => "unknown",
            },
        }
    }

    /// Bytes per element for widenable types.
    pub const fn element_size(self) -> Option<usize> {
        match self {
            Self::F32 => Some(4),
            Self::F16 | Self::BF16 => Some(2),
            Self::Other(_) => None,
        }
    }
}

impl std::fmt::Display for GgmlDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(code) if self.name() == "unknown" => write!(f, "type {code}"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Architecture-scoped keys that seed the model config, with the value
/// used when a key is absent.
pub const EMBEDDING_LENGTH: (&str, i32) = ("embedding_length", 2048);
pub const FEED_FORWARD_LENGTH: (&str, i32) = ("feed_forward_length", 5632);
pub const BLOCK_COUNT: (&str, i32) = ("block_count", 22);
pub const HEAD_COUNT: (&str, i32) = ("attention.head_count", 32);
pub const HEAD_COUNT_KV: (&str, i32) = ("attention.head_count_kv", 4);
pub const VOCAB_SIZE: (&str, i32) = ("vocab_size", 32000);
pub const CONTEXT_LENGTH: (&str, i32) = ("context_length", 2048);

/// Rotary base frequency key suffix.
pub const ROPE_FREQ_BASE: &str = "rope.freq_base";
