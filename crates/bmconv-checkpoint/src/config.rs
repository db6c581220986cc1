//! Transformers-style `config.json` next to a checkpoint.

use std::path::{Path, PathBuf};

use bmconv_core::ModelConfig;
use serde::Deserialize;

use crate::error::{CheckpointError, CheckpointResult};

pub const CONFIG_FILE: &str = "config.json";

/// The subset of `config.json` that maps onto the stream header.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HfConfig {
    pub hidden_size: u32,
    pub intermediate_size: u32,
    pub num_hidden_layers: u32,
    pub num_attention_heads: u32,
    /// Absent in configs written before grouped-query attention.
    #[serde(default)]
    pub num_key_value_heads: Option<u32>,
    pub vocab_size: u32,
    pub max_position_embeddings: u32,
    #[serde(default)]
    pub rope_theta: Option<f32>,
    #[serde(default)]
    pub tie_word_embeddings: Option<bool>,
}

impl HfConfig {
    /// Header config; `tie_word_embeddings` is applied when present.
    pub fn to_model_config(&self, path: &Path) -> CheckpointResult<ModelConfig> {
        let field = |name: &str, value: u32| {
            i32::try_from(value).map_err(|_| CheckpointError::Config {
                path: path.to_path_buf(),
                reason: format!("{name} = {value} is out of range"),
            })
        };

        let mut config = ModelConfig::new(
            field("hidden_size", self.hidden_size)?,
            field("intermediate_size", self.intermediate_size)?,
            field("num_hidden_layers", self.num_hidden_layers)?,
            field("num_attention_heads", self.num_attention_heads)?,
            field(
                "num_key_value_heads",
                self.num_key_value_heads.unwrap_or(self.num_attention_heads),
            )?,
            field("vocab_size", self.vocab_size)?,
            field("max_position_embeddings", self.max_position_embeddings)?,
        );
        if let Some(theta) = self.rope_theta {
            config = config.with_rope_theta(theta);
        }
        if let Some(tied) = self.tie_word_embeddings {
            config = config.with_shared_classifier(tied);
        }
        Ok(config)
    }
}

/// Path of the `config.json` belonging to a checkpoint file or directory.
pub fn config_path(checkpoint: &Path) -> PathBuf {
    if checkpoint.is_dir() {
        checkpoint.join(CONFIG_FILE)
    } else {
        checkpoint
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE)
    }
}

pub fn load_hf_config(path: &Path) -> CheckpointResult<HfConfig> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| CheckpointError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINYLLAMA: &str = r#"{
        "architectures": ["LlamaForCausalLM"],
        "hidden_size": 2048,
        "intermediate_size": 5632,
        "num_hidden_layers": 22,
        "num_attention_heads": 32,
        "num_key_value_heads": 4,
        "vocab_size": 32000,
        "max_position_embeddings": 2048,
        "rope_theta": 10000.0,
        "tie_word_embeddings": false,
        "torch_dtype": "bfloat16"
    }"#;

    #[test]
    fn test_tinyllama_config() {
        let hf: HfConfig = serde_json::from_str(TINYLLAMA).unwrap();
        let config = hf.to_model_config(Path::new("config.json")).unwrap();
        assert_eq!(config.dim(), 2048);
        assert_eq!(config.n_kv_heads(), 4);
        assert_eq!(config.vocab_size(), -32000);
        assert_eq!(config.rope_theta(), Some(10_000.0));
    }

    #[test]
    fn test_missing_kv_heads_defaults_to_heads() {
        let hf: HfConfig = serde_json::from_str(
            r#"{"hidden_size": 8, "intermediate_size": 16, "num_hidden_layers": 1,
                "num_attention_heads": 2, "vocab_size": 10, "max_position_embeddings": 4}"#,
        )
        .unwrap();
        let config = hf.to_model_config(Path::new("config.json")).unwrap();
        assert_eq!(config.n_kv_heads(), 2);
        assert_eq!(config.vocab_size(), 10);
    }

    #[test]
    fn test_out_of_range_field() {
        let hf = HfConfig {
            hidden_size: u32::MAX,
            intermediate_size: 1,
            num_hidden_layers: 1,
            num_attention_heads: 1,
            num_key_value_heads: None,
            vocab_size: 1,
            max_position_embeddings: 1,
            rope_theta: None,
            tie_word_embeddings: None,
        };
        let err = hf.to_model_config(Path::new("config.json")).unwrap_err();
        assert!(err.to_string().contains("hidden_size"));
    }

    #[test]
    fn test_config_path_for_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(config_path(dir.path()), dir.path().join("config.json"));
        let file = dir.path().join("model.safetensors");
        assert_eq!(config_path(&file), dir.path().join("config.json"));
    }
}
