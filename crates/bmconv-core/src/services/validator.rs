//! Stream validator.
//!
//! Re-reads a written stream's header, classifies its rotary encoding and
//! attention layout, and optionally walks every weight block to check the
//! stream is complete for a given scheme.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde::Serialize;

use crate::codec::{HeaderGeneration, read_header};
use crate::domain::{LEGACY_ROPE_THETA, MODERN_ROPE_THETA, ModelConfig};
use crate::error::{ConvertError, Result};
use crate::layout::{DEFAULT_ARCHITECTURE, resolve};
use crate::quant::{QuantScheme, int4, q6};

/// How the stream specifies its rotary base frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RopeFormat {
    /// No usable rope field, or the legacy base written explicitly.
    Legacy,
    /// The modern base frequency written explicitly.
    ExplicitModern,
    /// Any other explicit base.
    Custom { theta: f32 },
}

impl RopeFormat {
    #[allow(clippy::float_cmp)]
    pub fn classify(config: &ModelConfig) -> Self {
        match config.rope_theta() {
            None => Self::Legacy,
            Some(theta) if theta <= 0.0 || theta == LEGACY_ROPE_THETA => Self::Legacy,
            Some(theta) if theta == MODERN_ROPE_THETA => Self::ExplicitModern,
            Some(theta) => Self::Custom { theta },
        }
    }
}

impl fmt::Display for RopeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy (theta {LEGACY_ROPE_THETA})"),
            Self::ExplicitModern => write!(f, "explicit modern (theta {MODERN_ROPE_THETA})"),
            Self::Custom { theta } => write!(f, "custom (theta {theta})"),
        }
    }
}

/// Query versus key/value head layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttentionProfile {
    pub n_heads: i32,
    pub n_kv_heads: i32,
    /// Query heads per key/value head.
    pub group_ratio: i32,
    /// KV cache reduction relative to one KV head per query head.
    pub cache_savings_percent: f64,
}

impl AttentionProfile {
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let (n_heads, n_kv_heads) = (config.n_heads(), config.n_kv_heads());
        if n_kv_heads <= 0 || n_heads <= 0 {
            return Err(ConvertError::format(format!(
                "n_heads {n_heads} and n_kv_heads {n_kv_heads} must be positive"
            )));
        }
        Ok(Self {
            n_heads,
            n_kv_heads,
            group_ratio: n_heads / n_kv_heads,
            cache_savings_percent: (1.0 - f64::from(n_kv_heads) / f64::from(n_heads)) * 100.0,
        })
    }

    pub const fn is_grouped(&self) -> bool {
        self.n_kv_heads < self.n_heads
    }
}

impl fmt::Display for AttentionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_grouped() {
            write!(
                f,
                "grouped-query: {} query heads share {} KV heads ({}x), KV cache -{:.1}%",
                self.n_heads, self.n_kv_heads, self.group_ratio, self.cache_savings_percent
            )
        } else {
            write!(f, "multi-head: {} heads", self.n_heads)
        }
    }
}

/// Result of walking the weight blocks after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamWalk {
    pub blocks_read: usize,
    pub blocks_expected: usize,
    /// Bytes left after the last expected block.
    pub trailing_bytes: u64,
    /// The stream ended inside or before an expected block.
    pub truncated: bool,
}

impl StreamWalk {
    pub const fn is_complete(&self) -> bool {
        !self.truncated && self.blocks_read == self.blocks_expected && self.trailing_bytes == 0
    }
}

/// What to check beyond the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Scheme the blocks were written with; `None` checks the header only.
    pub scheme: Option<QuantScheme>,
    pub architecture: String,
    /// Header generation, when known. Needed for 28-byte headers.
    pub generation: Option<HeaderGeneration>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            scheme: None,
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            generation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub config: ModelConfig,
    pub generation: HeaderGeneration,
    /// The generation was picked from the byte count because none was given.
    /// With weights after the header that always reads as the largest one.
    pub generation_assumed: bool,
    pub rope_format: RopeFormat,
    pub attention: AttentionProfile,
    pub walk: Option<StreamWalk>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.walk.is_none_or(|walk| walk.is_complete())
    }
}

/// Validate a stream.
pub fn validate<R: Read + Seek>(reader: &mut R, options: &ValidateOptions) -> Result<ValidationReport> {
    let (config, generation) = read_header(reader, options.generation)?;
    let generation_assumed = options.generation.is_none();
    if generation_assumed {
        let header_end = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(header_end))?;
        if end > header_end {
            tracing::warn!(
                ?generation,
                "Header generation assumed from stream length; pass the generation the stream was written with"
            );
        }
    }
    let rope_format = RopeFormat::classify(&config);
    let attention = AttentionProfile::from_config(&config)?;
    tracing::debug!(%config, ?generation, %rope_format, "Read stream header");

    let walk = match options.scheme {
        Some(scheme) => Some(walk_blocks(reader, &config, &options.architecture, scheme)?),
        None => None,
    };

    Ok(ValidationReport {
        config,
        generation,
        generation_assumed,
        rope_format,
        attention,
        walk,
    })
}

/// Validate the stream stored at `path`.
pub fn validate_file(path: &Path, options: &ValidateOptions) -> Result<ValidationReport> {
    let mut reader = BufReader::new(File::open(path)?);
    validate(&mut reader, options)
}

fn walk_blocks<R: Read + Seek>(
    reader: &mut R,
    config: &ModelConfig,
    architecture: &str,
    scheme: QuantScheme,
) -> Result<StreamWalk> {
    config.validate()?;
    let plan = resolve(architecture, config)?;
    let mut pos = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(pos))?;

    let mut walk = StreamWalk {
        blocks_read: 0,
        blocks_expected: plan.len(),
        trailing_bytes: 0,
        truncated: false,
    };

    for slot in plan.slots() {
        let block_len = match scheme {
            QuantScheme::Fp32 => (slot.kind.element_count(config) * 4) as u64,
            QuantScheme::Int4 { .. } => {
                if end - pos < int4::PREFIX_LEN as u64 {
                    walk.truncated = true;
                    break;
                }
                let (n_elements, n_groups) = int4::read_prefix(reader)?;
                (int4::PREFIX_LEN + int4::payload_len(n_elements, n_groups)) as u64
            }
            QuantScheme::Q6 => {
                if end - pos < q6::HEADER_LEN as u64 {
                    walk.truncated = true;
                    break;
                }
                (q6::HEADER_LEN + q6::BlockHeader::read_from(reader)?.payload_len()) as u64
            }
        };
        if end - pos < block_len {
            walk.truncated = true;
            break;
        }
        pos += block_len;
        reader.seek(SeekFrom::Start(pos))?;
        walk.blocks_read += 1;
    }

    if !walk.truncated {
        walk.trailing_bytes = end - pos;
    }
    tracing::debug!(
        blocks_read = walk.blocks_read,
        expected = walk.blocks_expected,
        trailing = walk.trailing_bytes,
        truncated = walk.truncated,
        "Walked stream"
    );
    Ok(walk)
}
