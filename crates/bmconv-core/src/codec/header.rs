//! Versioned fixed-size stream header.
//!
//! Three generations exist, all little-endian:
//!
//! | generation | bytes | fields |
//! |---|---|---|
//! | `Legacy` | 28 | 7 × i32: dim, hidden_dim, n_layers, n_heads, n_kv_heads, vocab_size, seq_len |
//! | `Typed` | 32 | legacy + i32 model_type |
//! | `Rope` | 36 | typed + f32 rope_theta |
//!
//! Nothing in the header says which generation it is. Auto-detection reads up
//! to 36 bytes: fewer than 32 is a truncated header, exactly 32 is `Typed`
//! with no rope field, 36 or more is `Rope`. A 28-byte header can only be
//! decoded when the caller names the generation.

use std::io::{Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};

use crate::domain::ModelConfig;
use crate::error::{ConvertError, Result};

/// Smallest header auto-detection accepts.
pub const MIN_DETECTABLE_HEADER: usize = 32;

/// Largest header generation.
pub const MAX_HEADER: usize = 36;

/// Header layout generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderGeneration {
    /// Seven i32 fields.
    Legacy,
    /// Adds `model_type`.
    Typed,
    /// Adds `rope_theta`.
    Rope,
}

impl HeaderGeneration {
    /// Encoded size in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Legacy => 28,
            Self::Typed => 32,
            Self::Rope => 36,
        }
    }

    /// Smallest generation able to carry every field set on `config`.
    pub const fn for_config(config: &ModelConfig) -> Self {
        if config.rope_theta().is_some() {
            Self::Rope
        } else if config.model_type().is_some() {
            Self::Typed
        } else {
            Self::Legacy
        }
    }

    /// Generation detected from the number of header bytes available.
    pub fn detect(available: usize) -> Result<Self> {
        if available < MIN_DETECTABLE_HEADER {
            Err(ConvertError::TruncatedHeader {
                needed: MIN_DETECTABLE_HEADER,
                actual: available,
            })
        } else if available < MAX_HEADER {
            Ok(Self::Typed)
        } else {
            Ok(Self::Rope)
        }
    }
}

/// Encode `config` using the given generation.
///
/// Fields are always written in the fixed order. A `Typed` or `Rope` header
/// writes `0` for an unset `model_type`, and a `Rope` header writes `0.0`
/// for an unset `rope_theta` (read downstream as the legacy base).
pub fn encode_header(config: &ModelConfig, generation: HeaderGeneration) -> Vec<u8> {
    let mut out = Vec::with_capacity(generation.size());
    for field in [
        config.dim(),
        config.hidden_dim(),
        config.n_layers(),
        config.n_heads(),
        config.n_kv_heads(),
        config.vocab_size(),
        config.seq_len(),
    ] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    if matches!(generation, HeaderGeneration::Typed | HeaderGeneration::Rope) {
        out.extend_from_slice(&config.model_type().unwrap_or(0).to_le_bytes());
    }
    if generation == HeaderGeneration::Rope {
        out.extend_from_slice(&config.rope_theta_raw().to_le_bytes());
    }
    out
}

/// Write the header for `config` and return its length.
pub fn write_header<W: Write>(
    out: &mut W,
    config: &ModelConfig,
    generation: HeaderGeneration,
) -> Result<u64> {
    let bytes = encode_header(config, generation);
    out.write_all(&bytes)?;
    Ok(bytes.len() as u64)
}

/// Decode a header, detecting its generation from the bytes available.
pub fn decode_header(bytes: &[u8]) -> Result<(ModelConfig, HeaderGeneration)> {
    let generation = HeaderGeneration::detect(bytes.len())?;
    let config = decode_header_as(bytes, generation)?;
    Ok((config, generation))
}

/// Decode a header of a known generation.
pub fn decode_header_as(bytes: &[u8], generation: HeaderGeneration) -> Result<ModelConfig> {
    if bytes.len() < generation.size() {
        return Err(ConvertError::TruncatedHeader {
            needed: generation.size(),
            actual: bytes.len(),
        });
    }
    let field = |i: usize| read_i32(bytes, i * 4);
    let mut config = ModelConfig::new(
        field(0),
        field(1),
        field(2),
        field(3),
        field(4),
        field(5),
        field(6),
    );
    if matches!(generation, HeaderGeneration::Typed | HeaderGeneration::Rope) {
        config = config.with_model_type(field(7));
    }
    if generation == HeaderGeneration::Rope {
        config = config.with_rope_theta(f32::from_le_bytes(word(bytes, 32)));
    }
    Ok(config)
}

/// Read a header from a stream and leave the cursor at the first block.
///
/// With `hint = None` the generation is auto-detected; the reader is then
/// repositioned to the end of the detected header, since detection may read
/// past a shorter one.
pub fn read_header<R: Read + Seek>(
    reader: &mut R,
    hint: Option<HeaderGeneration>,
) -> Result<(ModelConfig, HeaderGeneration)> {
    let start = reader.stream_position()?;
    let wanted = hint.map_or(MAX_HEADER, HeaderGeneration::size);
    let mut buf = Vec::with_capacity(wanted);
    reader.by_ref().take(wanted as u64).read_to_end(&mut buf)?;

    let (config, generation) = match hint {
        Some(generation) => (decode_header_as(&buf, generation)?, generation),
        None => decode_header(&buf)?,
    };
    reader.seek(SeekFrom::Start(start + generation.size() as u64))?;
    Ok((config, generation))
}

fn word(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(word(bytes, offset))
}
