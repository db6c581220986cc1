//! Weight order resolution.
//!
//! The output stream has no per-tensor names or lengths, so the order in
//! which slots are emitted is the only contract with the reading runtime.
//! [`resolve`] turns an architecture tag and a [`ModelConfig`] into a
//! [`WeightPlan`]: one static ordered list consumed identically by the
//! serializer, the validator and the legacy stream source.

pub mod aliases;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ModelConfig;
use crate::error::{ConvertError, Result};

pub use aliases::{
    ARCHITECTURES, ArchitectureSpec, DEFAULT_ARCHITECTURE, KeyFamily, architecture, known_tags,
};

/// Logical weight kinds of a llama-family transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightKind {
    TokenEmbedding,
    AttentionNorm,
    Query,
    Key,
    Value,
    AttentionOutput,
    FfnNorm,
    /// First feed-forward projection (`w1`).
    FfnGate,
    /// Output feed-forward projection (`w2`).
    FfnDown,
    /// Second input feed-forward projection (`w3`).
    FfnUp,
    FinalNorm,
    Classifier,
}

impl WeightKind {
    pub const ALL: [Self; 12] = [
        Self::TokenEmbedding,
        Self::AttentionNorm,
        Self::Query,
        Self::Key,
        Self::Value,
        Self::AttentionOutput,
        Self::FfnNorm,
        Self::FfnGate,
        Self::FfnDown,
        Self::FfnUp,
        Self::FinalNorm,
        Self::Classifier,
    ];

    /// Per-layer kinds in grouped-by-kind emission order (`w1`, `w2`, `w3`).
    const GROUPED: [Self; 9] = [
        Self::AttentionNorm,
        Self::Query,
        Self::Key,
        Self::Value,
        Self::AttentionOutput,
        Self::FfnNorm,
        Self::FfnGate,
        Self::FfnDown,
        Self::FfnUp,
    ];

    /// Per-layer kinds in interleaved emission order (gate, up, down).
    const INTERLEAVED: [Self; 9] = [
        Self::AttentionNorm,
        Self::Query,
        Self::Key,
        Self::Value,
        Self::AttentionOutput,
        Self::FfnNorm,
        Self::FfnGate,
        Self::FfnUp,
        Self::FfnDown,
    ];

    pub const fn is_per_layer(self) -> bool {
        !matches!(
            self,
            Self::TokenEmbedding | Self::FinalNorm | Self::Classifier
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::TokenEmbedding => "token_embedding",
            Self::AttentionNorm => "attention_norm",
            Self::Query => "wq",
            Self::Key => "wk",
            Self::Value => "wv",
            Self::AttentionOutput => "wo",
            Self::FfnNorm => "ffn_norm",
            Self::FfnGate => "w1",
            Self::FfnDown => "w2",
            Self::FfnUp => "w3",
            Self::FinalNorm => "final_norm",
            Self::Classifier => "classifier",
        }
    }

    /// Number of elements the runtime reads for one tensor of this kind.
    pub fn element_count(self, config: &ModelConfig) -> usize {
        let dim = usize::try_from(config.dim()).unwrap_or(0);
        let hidden = usize::try_from(config.hidden_dim()).unwrap_or(0);
        let vocab = config.vocab_len();
        match self {
            Self::TokenEmbedding | Self::Classifier => vocab * dim,
            Self::AttentionNorm | Self::FfnNorm | Self::FinalNorm => dim,
            Self::Query | Self::AttentionOutput => dim * config.head_size() * n_heads(config),
            Self::Key | Self::Value => dim * config.kv_dim(),
            Self::FfnGate | Self::FfnDown | Self::FfnUp => dim * hidden,
        }
    }
}

fn n_heads(config: &ModelConfig) -> usize {
    usize::try_from(config.n_heads()).unwrap_or(0)
}

/// Order in which per-layer tensors are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// All layers of one kind, then the next kind.
    GroupedByKind,
    /// All kinds of one layer, then the next layer.
    InterleavedByLayer,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupedByKind => write!(f, "grouped-by-kind"),
            Self::InterleavedByLayer => write!(f, "interleaved-by-layer"),
        }
    }
}

/// One logical weight position in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightSlot {
    pub kind: WeightKind,
    pub layer: Option<usize>,
}

impl WeightSlot {
    pub const fn global(kind: WeightKind) -> Self {
        Self { kind, layer: None }
    }

    pub const fn layered(kind: WeightKind, layer: usize) -> Self {
        Self {
            kind,
            layer: Some(layer),
        }
    }
}

impl fmt::Display for WeightSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layer {
            Some(layer) => write!(f, "layers.{layer}.{}", self.kind.label()),
            None => write!(f, "{}", self.kind.label()),
        }
    }
}

/// The resolved, ordered emission plan for one job.
#[derive(Debug, Clone)]
pub struct WeightPlan {
    architecture: &'static ArchitectureSpec,
    slots: Vec<WeightSlot>,
}

impl WeightPlan {
    pub const fn architecture(&self) -> &'static ArchitectureSpec {
        self.architecture
    }

    pub fn slots(&self) -> &[WeightSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every key spelling accepted for `slot`, in lookup priority order.
    pub fn aliases(&self, slot: WeightSlot) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.architecture.families.len());
        for family in self.architecture.families {
            let key = family.key(slot.kind, slot.layer);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Concrete key of `slot` in one family.
    pub fn key_in(slot: WeightSlot, family: KeyFamily) -> String {
        family.key(slot.kind, slot.layer)
    }
}

/// Resolve the emission plan for `tag` and `config`.
///
/// The classifier slot is present iff `config.vocab_size()` is negative.
pub fn resolve(tag: &str, config: &ModelConfig) -> Result<WeightPlan> {
    let spec = architecture(tag).ok_or_else(|| {
        ConvertError::format(format!(
            "unknown architecture '{tag}' (known: {})",
            known_tags().join(", ")
        ))
    })?;
    let n_layers = usize::try_from(config.n_layers())
        .map_err(|_| ConvertError::format(format!("negative n_layers {}", config.n_layers())))?;

    let mut slots = Vec::with_capacity(3 + n_layers * WeightKind::GROUPED.len());
    slots.push(WeightSlot::global(WeightKind::TokenEmbedding));
    match spec.layout {
        Layout::GroupedByKind => {
            for kind in WeightKind::GROUPED {
                slots.extend((0..n_layers).map(|layer| WeightSlot::layered(kind, layer)));
            }
        }
        Layout::InterleavedByLayer => {
            for layer in 0..n_layers {
                slots.extend(
                    WeightKind::INTERLEAVED
                        .iter()
                        .map(|&kind| WeightSlot::layered(kind, layer)),
                );
            }
        }
    }
    slots.push(WeightSlot::global(WeightKind::FinalNorm));
    if !config.shared_classifier() {
        slots.push(WeightSlot::global(WeightKind::Classifier));
    }

    Ok(WeightPlan {
        architecture: spec,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layers() -> ModelConfig {
        ModelConfig::new(8, 16, 2, 2, 1, 10, 4)
    }

    fn labels(plan: &WeightPlan) -> Vec<String> {
        plan.slots().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_grouped_by_kind_order() {
        let plan = resolve("llama2", &two_layers()).unwrap();
        assert_eq!(
            labels(&plan),
            vec![
                "token_embedding",
                "layers.0.attention_norm",
                "layers.1.attention_norm",
                "layers.0.wq",
                "layers.1.wq",
                "layers.0.wk",
                "layers.1.wk",
                "layers.0.wv",
                "layers.1.wv",
                "layers.0.wo",
                "layers.1.wo",
                "layers.0.ffn_norm",
                "layers.1.ffn_norm",
                "layers.0.w1",
                "layers.1.w1",
                "layers.0.w2",
                "layers.1.w2",
                "layers.0.w3",
                "layers.1.w3",
                "final_norm",
            ]
        );
    }

    #[test]
    fn test_interleaved_by_layer_order() {
        let plan = resolve("llama", &two_layers()).unwrap();
        let labels = labels(&plan);
        assert_eq!(labels.len(), 1 + 2 * 9 + 1);
        assert_eq!(
            &labels[1..10],
            &[
                "layers.0.attention_norm",
                "layers.0.wq",
                "layers.0.wk",
                "layers.0.wv",
                "layers.0.wo",
                "layers.0.ffn_norm",
                "layers.0.w1",
                "layers.0.w3",
                "layers.0.w2",
            ]
        );
        assert_eq!(labels[10], "layers.1.attention_norm");
        assert_eq!(labels.last().map(String::as_str), Some("final_norm"));
    }

    #[test]
    fn test_classifier_follows_negative_vocab() {
        let config = two_layers().with_shared_classifier(false);
        for tag in known_tags() {
            let plan = resolve(tag, &config).unwrap();
            assert_eq!(
                plan.slots().last(),
                Some(&WeightSlot::global(WeightKind::Classifier))
            );
        }
        let shared = resolve("llama2", &two_layers()).unwrap();
        assert!(
            !shared
                .slots()
                .iter()
                .any(|s| s.kind == WeightKind::Classifier)
        );
    }

    #[test]
    fn test_aliases_follow_family_priority() {
        let plan = resolve("llama2", &two_layers()).unwrap();
        let aliases = plan.aliases(WeightSlot::global(WeightKind::TokenEmbedding));
        assert_eq!(
            aliases,
            vec![
                "tok_embeddings.weight",
                "model.embed_tokens.weight",
                "token_embd.weight"
            ]
        );
        // Meta and GGUF spell the classifier identically; listed once.
        let classifier = plan.aliases(WeightSlot::global(WeightKind::Classifier));
        assert_eq!(classifier, vec!["output.weight", "lm_head.weight"]);
    }

    #[test]
    fn test_unknown_architecture() {
        let err = resolve("gpt2", &two_layers()).unwrap_err();
        assert!(err.to_string().contains("llama2"));
    }

    #[test]
    fn test_element_counts_for_gqa() {
        let config = ModelConfig::new(8, 16, 1, 2, 1, 10, 4);
        assert_eq!(WeightKind::TokenEmbedding.element_count(&config), 80);
        assert_eq!(WeightKind::Query.element_count(&config), 64);
        assert_eq!(WeightKind::Key.element_count(&config), 32);
        assert_eq!(WeightKind::FfnDown.element_count(&config), 128);
        assert_eq!(WeightKind::FinalNorm.element_count(&config), 8);
    }
}
