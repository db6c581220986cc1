//! Declarative per-architecture key-alias table.
//!
//! Each logical weight has one spelling per checkpoint key family. An
//! architecture lists the families it accepts, in lookup priority order, so
//! resolving a slot is a single pass over a static table.

use super::{Layout, WeightKind};

/// A naming convention used by some upstream tensor producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// Reference checkpoints (`tok_embeddings.weight`, `layers.N.attention.wq.weight`).
    Meta,
    /// Transformers-style checkpoints (`model.layers.N.self_attn.q_proj.weight`).
    HuggingFace,
    /// GGUF tensor names (`blk.N.attn_q.weight`).
    Gguf,
}

impl KeyFamily {
    /// Key template for `kind`. `{layer}` is replaced by the layer index.
    pub const fn template(self, kind: WeightKind) -> &'static str {
        match self {
            Self::Meta => match kind {
                WeightKind::TokenEmbedding => "tok_embeddings.weight",
                WeightKind::AttentionNorm => "layers.{layer}.attention_norm.weight",
                WeightKind::Query => "layers.{layer}.attention.wq.weight",
                WeightKind::Key => "layers.{layer}.attention.wk.weight",
                WeightKind::Value => "layers.{layer}.attention.wv.weight",
                WeightKind::AttentionOutput => "layers.{layer}.attention.wo.weight",
                WeightKind::FfnNorm => "layers.{layer}.ffn_norm.weight",
                WeightKind::FfnGate => "layers.{layer}.feed_forward.w1.weight",
                WeightKind::FfnDown => "layers.{layer}.feed_forward.w2.weight",
                WeightKind::FfnUp => "layers.{layer}.feed_forward.w3.weight",
                WeightKind::FinalNorm => "norm.weight",
                WeightKind::Classifier => "output.weight",
            },
            Self::HuggingFace => match kind {
                WeightKind::TokenEmbedding => "model.embed_tokens.weight",
                WeightKind::AttentionNorm => "model.layers.{layer}.input_layernorm.weight",
                WeightKind::Query => "model.layers.{layer}.self_attn.q_proj.weight",
                WeightKind::Key => "model.layers.{layer}.self_attn.k_proj.weight",
                WeightKind::Value => "model.layers.{layer}.self_attn.v_proj.weight",
                WeightKind::AttentionOutput => "model.layers.{layer}.self_attn.o_proj.weight",
                WeightKind::FfnNorm => "model.layers.{layer}.post_attention_layernorm.weight",
                WeightKind::FfnGate => "model.layers.{layer}.mlp.gate_proj.weight",
                WeightKind::FfnDown => "model.layers.{layer}.mlp.down_proj.weight",
                WeightKind::FfnUp => "model.layers.{layer}.mlp.up_proj.weight",
                WeightKind::FinalNorm => "model.norm.weight",
                WeightKind::Classifier => "lm_head.weight",
            },
            Self::Gguf => match kind {
                WeightKind::TokenEmbedding => "token_embd.weight",
                WeightKind::AttentionNorm => "blk.{layer}.attn_norm.weight",
                WeightKind::Query => "blk.{layer}.attn_q.weight",
                WeightKind::Key => "blk.{layer}.attn_k.weight",
                WeightKind::Value => "blk.{layer}.attn_v.weight",
                WeightKind::AttentionOutput => "blk.{layer}.attn_output.weight",
                WeightKind::FfnNorm => "blk.{layer}.ffn_norm.weight",
                WeightKind::FfnGate => "blk.{layer}.ffn_gate.weight",
                WeightKind::FfnDown => "blk.{layer}.ffn_down.weight",
                WeightKind::FfnUp => "blk.{layer}.ffn_up.weight",
                WeightKind::FinalNorm => "output_norm.weight",
                WeightKind::Classifier => "output.weight",
            },
        }
    }

    /// Concrete key for `kind` at `layer`.
    pub fn key(self, kind: WeightKind, layer: Option<usize>) -> String {
        let template = self.template(kind);
        match layer {
            Some(layer) => template.replace("{layer}", &layer.to_string()),
            None => template.to_string(),
        }
    }
}

/// One supported architecture: its emission layout and accepted key families.
#[derive(Debug, PartialEq, Eq)]
pub struct ArchitectureSpec {
    pub tag: &'static str,
    pub layout: Layout,
    pub families: &'static [KeyFamily],
    pub description: &'static str,
}

/// Every architecture tag the resolver understands.
pub const ARCHITECTURES: &[ArchitectureSpec] = &[
    ArchitectureSpec {
        tag: "llama2",
        layout: Layout::GroupedByKind,
        families: &[KeyFamily::Meta, KeyFamily::HuggingFace, KeyFamily::Gguf],
        description: "grouped-by-kind stream read by the llama2-style runtime",
    },
    ArchitectureSpec {
        tag: "llama",
        layout: Layout::InterleavedByLayer,
        families: &[KeyFamily::HuggingFace, KeyFamily::Meta, KeyFamily::Gguf],
        description: "interleaved-by-layer stream",
    },
    ArchitectureSpec {
        tag: "llama3",
        layout: Layout::InterleavedByLayer,
        families: &[KeyFamily::HuggingFace, KeyFamily::Gguf, KeyFamily::Meta],
        description: "interleaved-by-layer stream with explicit rope base",
    },
    ArchitectureSpec {
        tag: "tinyllama",
        layout: Layout::InterleavedByLayer,
        families: &[KeyFamily::HuggingFace, KeyFamily::Gguf],
        description: "interleaved-by-layer stream, transformers key spelling",
    },
];

/// Default architecture when neither settings nor flags name one.
pub const DEFAULT_ARCHITECTURE: &str = "llama2";

/// Look up an architecture by tag (case-insensitive).
pub fn architecture(tag: &str) -> Option<&'static ArchitectureSpec> {
    ARCHITECTURES
        .iter()
        .find(|spec| spec.tag.eq_ignore_ascii_case(tag))
}

/// All known tags, for diagnostics.
pub fn known_tags() -> Vec<&'static str> {
    ARCHITECTURES.iter().map(|spec| spec.tag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_substitutes_layer() {
        assert_eq!(
            KeyFamily::Gguf.key(WeightKind::Query, Some(7)),
            "blk.7.attn_q.weight"
        );
        assert_eq!(
            KeyFamily::HuggingFace.key(WeightKind::TokenEmbedding, None),
            "model.embed_tokens.weight"
        );
    }

    #[test]
    fn test_every_per_layer_template_mentions_layer() {
        for family in [KeyFamily::Meta, KeyFamily::HuggingFace, KeyFamily::Gguf] {
            for kind in WeightKind::ALL {
                let template = family.template(kind);
                assert_eq!(
                    template.contains("{layer}"),
                    kind.is_per_layer(),
                    "{family:?} {kind:?}"
                );
            }
        }
    }

    #[test]
    fn test_architecture_lookup() {
        assert_eq!(architecture("LLAMA2").map(|a| a.layout), Some(Layout::GroupedByKind));
        assert_eq!(
            architecture("tinyllama").map(|a| a.layout),
            Some(Layout::InterleavedByLayer)
        );
        assert!(architecture("gpt2").is_none());
        assert!(known_tags().contains(&DEFAULT_ARCHITECTURE));
    }
}
