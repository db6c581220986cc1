//! Safetensors source tests over checkpoints written in-test.

use std::path::Path;

use bmconv_checkpoint::SafetensorsSource;
use bmconv_core::{
    ConvertError, HeaderGeneration, KeyFamily, ModelConfig, QuantScheme, SerializeOptions,
    Serializer, TensorFetch, TensorSource, WeightPlan, resolve,
};
use half::bf16;
use safetensors::Dtype;
use safetensors::tensor::TensorView;

fn tiny() -> ModelConfig {
    ModelConfig::new(8, 16, 1, 2, 1, 10, 4)
}

/// Write one shard holding `(name, dtype, shape, bytes)` entries.
fn write_shard(path: &Path, tensors: &[(String, Dtype, Vec<usize>, Vec<u8>)]) {
    let views: Vec<(String, TensorView<'_>)> = tensors
        .iter()
        .map(|(name, dtype, shape, bytes)| {
            (
                name.clone(),
                TensorView::new(*dtype, shape.clone(), bytes).unwrap(),
            )
        })
        .collect();
    let bytes = safetensors::serialize(views, &None).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn f32_bytes(values: impl IntoIterator<Item = f32>) -> Vec<u8> {
    values.into_iter().flat_map(f32::to_le_bytes).collect()
}

/// Every tensor of the llama2 plan in transformers spelling; the embedding
/// table is BF16.
fn hf_tensors(config: &ModelConfig) -> Vec<(String, Dtype, Vec<usize>, Vec<u8>)> {
    let plan = resolve("llama2", config).unwrap();
    plan.slots()
        .iter()
        .enumerate()
        .map(|(i, &slot)| {
            let name = WeightPlan::key_in(slot, KeyFamily::HuggingFace);
            let n = slot.kind.element_count(config);
            if i == 0 {
                let bytes = (0..n)
                    .flat_map(|j| bf16::from_f32(j as f32 * 0.5).to_le_bytes())
                    .collect();
                (name, Dtype::BF16, vec![config.vocab_len(), 8], bytes)
            } else {
                (name, Dtype::F32, vec![n], f32_bytes((0..n).map(|j| j as f32 / n as f32)))
            }
        })
        .collect()
}

#[test]
fn test_single_file_converts() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny();
    let file = dir.path().join("model.safetensors");
    write_shard(&file, &hf_tensors(&config));

    let mut source = SafetensorsSource::open(&file).unwrap();
    assert_eq!(source.tensor_names().len(), 11);

    match source.fetch("model.embed_tokens.weight").unwrap() {
        TensorFetch::Loaded(tensor) => {
            assert_eq!(tensor.dims(), [10, 8]);
            assert_eq!(&tensor.data()[..3], [0.0, 0.5, 1.0]);
        }
        TensorFetch::Unsupported { dtype } => panic!("BF16 should widen, got {dtype}"),
    }

    let plan = resolve("llama2", &config).unwrap();
    let options = SerializeOptions {
        scheme: QuantScheme::Q6,
        strict: true,
        generation: HeaderGeneration::Typed,
    };
    let report = Serializer::new(&config, &plan, options)
        .write_file(&mut source, &dir.path().join("model.bin"))
        .unwrap();
    assert_eq!(report.written_count(), plan.len());
    assert!(report.is_clean());
}

#[test]
fn test_shards_in_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let tensors = hf_tensors(&tiny());
    let (first, second) = tensors.split_at(5);
    write_shard(&dir.path().join("model-00001-of-00002.safetensors"), first);
    write_shard(&dir.path().join("model-00002-of-00002.safetensors"), second);
    std::fs::write(dir.path().join("README.md"), "not a shard").unwrap();

    let source = SafetensorsSource::open(dir.path()).unwrap();
    assert_eq!(source.tensor_names().len(), 11);
    assert!(source.contains("model.norm.weight"));
}

#[test]
fn test_integer_tensor_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("ids.safetensors");
    write_shard(
        &file,
        &[("position_ids".to_string(), Dtype::I64, vec![2], vec![0; 16])],
    );
    let mut source = SafetensorsSource::open(&file).unwrap();
    assert_eq!(
        source.fetch("position_ids").unwrap(),
        TensorFetch::Unsupported {
            dtype: "I64".to_string()
        }
    );
}

#[test]
fn test_config_json_beside_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny();
    let mut tensors = hf_tensors(&config);
    tensors.push((
        "lm_head.weight".to_string(),
        Dtype::F32,
        vec![10, 8],
        f32_bytes((0..80).map(|j| j as f32)),
    ));
    write_shard(&dir.path().join("model.safetensors"), &tensors);
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"hidden_size": 8, "intermediate_size": 16, "num_hidden_layers": 1,
            "num_attention_heads": 2, "num_key_value_heads": 1, "vocab_size": 10,
            "max_position_embeddings": 4, "rope_theta": 500000.0}"#,
    )
    .unwrap();

    let source = SafetensorsSource::open(&dir.path().join("model.safetensors")).unwrap();
    let seeded = source.model_config().unwrap().unwrap();
    assert_eq!(
        seeded,
        config.with_rope_theta(500_000.0).with_shared_classifier(false)
    );
}

#[test]
fn test_missing_config_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("model.safetensors");
    write_shard(&file, &hf_tensors(&tiny()));
    assert!(SafetensorsSource::open(&file).unwrap().model_config().unwrap().is_none());
}

#[test]
fn test_garbage_file_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.safetensors");
    std::fs::write(&file, b"\xff\x00\x00\x00\x00\x00\x00\x00{}").unwrap();
    assert!(matches!(
        SafetensorsSource::open(&file),
        Err(ConvertError::Format(_))
    ));
}
