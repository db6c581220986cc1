//! Model configuration carried in the stream header.

use std::fmt;

use serde::Serialize;

use crate::error::{ConvertError, Result};

/// Rotary base frequency implied when a header carries no explicit value.
pub const LEGACY_ROPE_THETA: f32 = 10_000.0;

/// Rotary base frequency used by the newer model generation.
pub const MODERN_ROPE_THETA: f32 = 500_000.0;

/// Transformer hyper-parameters for one conversion job.
///
/// Built once and passed by reference into every component. The sign of
/// `vocab_size` is structural: positive means the classifier shares the
/// token embedding, negative means a separate classifier tensor follows the
/// final norm in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelConfig {
    dim: i32,
    hidden_dim: i32,
    n_layers: i32,
    n_heads: i32,
    n_kv_heads: i32,
    vocab_size: i32,
    seq_len: i32,
    model_type: Option<i32>,
    rope_theta: Option<f32>,
}

impl ModelConfig {
    /// Create a config from the seven base header fields.
    #[must_use]
    pub const fn new(
        dim: i32,
        hidden_dim: i32,
        n_layers: i32,
        n_heads: i32,
        n_kv_heads: i32,
        vocab_size: i32,
        seq_len: i32,
    ) -> Self {
        Self {
            dim,
            hidden_dim,
            n_layers,
            n_heads,
            n_kv_heads,
            vocab_size,
            seq_len,
            model_type: None,
            rope_theta: None,
        }
    }

    #[must_use]
    pub const fn with_model_type(mut self, model_type: i32) -> Self {
        self.model_type = Some(model_type);
        self
    }

    #[must_use]
    pub const fn with_rope_theta(mut self, rope_theta: f32) -> Self {
        self.rope_theta = Some(rope_theta);
        self
    }

    /// Return a copy whose vocab sign encodes `shared`, keeping the magnitude.
    #[must_use]
    pub const fn with_shared_classifier(mut self, shared: bool) -> Self {
        let magnitude = self.vocab_size.abs();
        self.vocab_size = if shared { magnitude } else { -magnitude };
        self
    }

    pub const fn dim(&self) -> i32 {
        self.dim
    }

    pub const fn hidden_dim(&self) -> i32 {
        self.hidden_dim
    }

    pub const fn n_layers(&self) -> i32 {
        self.n_layers
    }

    pub const fn n_heads(&self) -> i32 {
        self.n_heads
    }

    pub const fn n_kv_heads(&self) -> i32 {
        self.n_kv_heads
    }

    /// Signed vocabulary size exactly as written in the header.
    pub const fn vocab_size(&self) -> i32 {
        self.vocab_size
    }

    pub const fn seq_len(&self) -> i32 {
        self.seq_len
    }

    pub const fn model_type(&self) -> Option<i32> {
        self.model_type
    }

    pub const fn rope_theta(&self) -> Option<f32> {
        self.rope_theta
    }

    /// The header's rope field: `0.0` when the header predates it.
    pub fn rope_theta_raw(&self) -> f32 {
        self.rope_theta.unwrap_or(0.0)
    }

    /// Rotary base the runtime will actually use.
    pub fn effective_rope_theta(&self) -> f32 {
        match self.rope_theta {
            Some(theta) if theta > 0.0 => theta,
            _ => LEGACY_ROPE_THETA,
        }
    }

    /// Whether the classifier reuses the token embedding.
    pub const fn shared_classifier(&self) -> bool {
        self.vocab_size > 0
    }

    /// Vocabulary size with the sharing directive stripped.
    #[allow(clippy::cast_sign_loss)]
    pub const fn vocab_len(&self) -> usize {
        self.vocab_size.unsigned_abs() as usize
    }

    /// Per-head dimension.
    pub fn head_size(&self) -> usize {
        to_usize(self.dim) / to_usize(self.n_heads).max(1)
    }

    /// Width of the key/value projections.
    pub fn kv_dim(&self) -> usize {
        to_usize(self.dim) * to_usize(self.n_kv_heads) / to_usize(self.n_heads).max(1)
    }

    /// Reject configurations no runtime could load.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dim", self.dim),
            ("hidden_dim", self.hidden_dim),
            ("n_layers", self.n_layers),
            ("n_heads", self.n_heads),
            ("n_kv_heads", self.n_kv_heads),
            ("seq_len", self.seq_len),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(ConvertError::format(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }
        if self.vocab_size == 0 {
            return Err(ConvertError::format("vocab_size must be non-zero"));
        }
        if self.dim % self.n_heads != 0 {
            return Err(ConvertError::format(format!(
                "dim {} is not divisible by n_heads {}",
                self.dim, self.n_heads
            )));
        }
        if self.n_heads % self.n_kv_heads != 0 {
            return Err(ConvertError::format(format!(
                "n_heads {} is not a multiple of n_kv_heads {}",
                self.n_heads, self.n_kv_heads
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dim={} hidden_dim={} n_layers={} n_heads={} n_kv_heads={} vocab_size={} seq_len={}",
            self.dim,
            self.hidden_dim,
            self.n_layers,
            self.n_heads,
            self.n_kv_heads,
            self.vocab_size,
            self.seq_len
        )?;
        if let Some(model_type) = self.model_type {
            write!(f, " model_type={model_type}")?;
        }
        if let Some(theta) = self.rope_theta {
            write!(f, " rope_theta={theta}")?;
        }
        Ok(())
    }
}

#[allow(clippy::cast_sign_loss)]
const fn to_usize(value: i32) -> usize {
    if value < 0 { 0 } else { value as usize }
}
