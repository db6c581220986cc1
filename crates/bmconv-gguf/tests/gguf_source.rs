//! GGUF source tests over synthetic containers.

use std::io::{Cursor, Write};

use bmconv_core::layout::KeyFamily;
use bmconv_core::{
    ConvertError, HeaderGeneration, ModelConfig, QuantScheme, RunWarning, SerializeOptions,
    Serializer, TensorFetch, TensorOutcome, TensorSource, WeightKind, WeightPlan, resolve,
};
use bmconv_gguf::{GgufReader, GgufSource};
use half::f16;

const F32: u32 = 0;
const F16: u32 = 1;
const Q4_0: u32 = 2;

struct TensorSpec {
    name: String,
    dims: Vec<u64>,
    dtype: u32,
    data: Vec<u8>,
}

/// Builds a version-3 container in memory.
#[derive(Default)]
struct GgufBuilder {
    kv_count: u64,
    kv: Vec<u8>,
    tensors: Vec<TensorSpec>,
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

impl GgufBuilder {
    fn u32(mut self, key: &str, value: u32) -> Self {
        put_string(&mut self.kv, key);
        self.kv.extend_from_slice(&4u32.to_le_bytes());
        self.kv.extend_from_slice(&value.to_le_bytes());
        self.kv_count += 1;
        self
    }

    fn string(mut self, key: &str, value: &str) -> Self {
        put_string(&mut self.kv, key);
        self.kv.extend_from_slice(&8u32.to_le_bytes());
        put_string(&mut self.kv, value);
        self.kv_count += 1;
        self
    }

    fn u64(mut self, key: &str, value: u64) -> Self {
        put_string(&mut self.kv, key);
        self.kv.extend_from_slice(&10u32.to_le_bytes());
        self.kv.extend_from_slice(&value.to_le_bytes());
        self.kv_count += 1;
        self
    }

    fn tokens(mut self, count: usize) -> Self {
        put_string(&mut self.kv, "tokenizer.ggml.tokens");
        self.kv.extend_from_slice(&9u32.to_le_bytes());
        self.kv.extend_from_slice(&8u32.to_le_bytes());
        self.kv.extend_from_slice(&(count as u64).to_le_bytes());
        for i in 0..count {
            put_string(&mut self.kv, &format!("tok{i}"));
        }
        self.kv_count += 1;
        self
    }

    fn f32_tensor(mut self, name: &str, dims: &[u64], values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.tensors.push(TensorSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            dtype: F32,
            data,
        });
        self
    }

    fn f16_tensor(mut self, name: &str, dims: &[u64], values: &[f32]) -> Self {
        let data = values
            .iter()
            .flat_map(|&v| f16::from_f32(v).to_le_bytes())
            .collect();
        self.tensors.push(TensorSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            dtype: F16,
            data,
        });
        self
    }

    fn raw_tensor(mut self, name: &str, dims: &[u64], dtype: u32, len: usize) -> Self {
        self.tensors.push(TensorSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            dtype,
            data: vec![0xAB; len],
        });
        self
    }

    fn build(self) -> Vec<u8> {
        let mut buf = b"GGUF".to_vec();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&(self.tensors.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.kv_count.to_le_bytes());
        buf.extend_from_slice(&self.kv);

        let mut offset = 0u64;
        let mut offsets = Vec::new();
        for tensor in &self.tensors {
            offsets.push(offset);
            offset = (offset + tensor.data.len() as u64).div_ceil(32) * 32;
        }
        for (tensor, &offset) in self.tensors.iter().zip(&offsets) {
            put_string(&mut buf, &tensor.name);
            buf.extend_from_slice(&(tensor.dims.len() as u32).to_le_bytes());
            for dim in &tensor.dims {
                buf.extend_from_slice(&dim.to_le_bytes());
            }
            buf.extend_from_slice(&tensor.dtype.to_le_bytes());
            buf.extend_from_slice(&offset.to_le_bytes());
        }

        let data_start = buf.len().div_ceil(32) * 32;
        buf.resize(data_start, 0);
        for (tensor, &offset) in self.tensors.iter().zip(&offsets) {
            buf.resize(data_start + offset as usize, 0);
            buf.extend_from_slice(&tensor.data);
        }
        buf
    }
}

fn synthetic_config() -> ModelConfig {
    ModelConfig::new(8, 16, 1, 2, 1, 10, 4).with_shared_classifier(false)
}

/// A container holding every tensor of the llama2 plan in GGUF spelling.
///
/// The embedding table is F16 and `blk.0.ffn_up.weight` is block-quantized.
fn synthetic_container() -> Vec<u8> {
    let config = synthetic_config();
    let plan = resolve("llama2", &config).unwrap();
    let mut builder = GgufBuilder::default()
        .string("general.architecture", "llama")
        .u64("general.file_type", 2)
        .u32("llama.embedding_length", 8)
        .u32("llama.feed_forward_length", 16)
        .u32("llama.block_count", 1)
        .u32("llama.attention.head_count", 2)
        .u32("llama.attention.head_count_kv", 1)
        .u32("llama.context_length", 4)
        .tokens(10);

    for (i, &slot) in plan.slots().iter().enumerate() {
        let name = WeightPlan::key_in(slot, KeyFamily::Gguf);
        let n = slot.kind.element_count(&config);
        let values: Vec<f32> = (0..n).map(|j| (i as f32) + (j % 4) as f32 * 0.25).collect();
        builder = match slot.kind {
            WeightKind::TokenEmbedding => builder.f16_tensor(&name, &[8, 10], &values),
            WeightKind::FfnUp => builder.raw_tensor(&name, &[n as u64], Q4_0, 18),
            _ => builder.f32_tensor(&name, &[n as u64], &values),
        };
    }
    builder.build()
}

fn open(bytes: Vec<u8>) -> GgufSource<Cursor<Vec<u8>>> {
    GgufSource::from_reader("synthetic", GgufReader::from_reader(Cursor::new(bytes))).unwrap()
}

#[test]
fn test_config_is_seeded_from_metadata() {
    let source = open(synthetic_container());
    assert_eq!(source.model_config(), synthetic_config());
    assert_eq!(source.model_config().vocab_size(), -10);
}

#[test]
fn test_f16_tensor_is_widened_row_major() {
    let mut source = open(synthetic_container());
    match source.fetch("token_embd.weight").unwrap() {
        TensorFetch::Loaded(tensor) => {
            assert_eq!(tensor.dims(), [10, 8]);
            assert_eq!(&tensor.data()[..4], [0.0, 0.25, 0.5, 0.75]);
        }
        TensorFetch::Unsupported { dtype } => panic!("F16 should widen, got {dtype}"),
    }
}

#[test]
fn test_quantized_tensor_is_reported_unsupported() {
    let mut source = open(synthetic_container());
    assert_eq!(
        source.fetch("blk.0.ffn_up.weight").unwrap(),
        TensorFetch::Unsupported {
            dtype: "Q4_0".to_string()
        }
    );
}

#[test]
fn test_lenient_conversion_records_skips_and_metadata_warnings() {
    let mut source = open(synthetic_container());
    let config = source.model_config();
    let plan = resolve("llama2", &config).unwrap();
    let options = SerializeOptions {
        scheme: QuantScheme::Int4 { group_size: 8 },
        strict: false,
        generation: HeaderGeneration::Typed,
    };

    let mut out = Vec::new();
    let report = Serializer::new(&config, &plan, options)
        .write(&mut source, &mut out)
        .unwrap();

    assert_eq!(report.skipped_count(), 1);
    assert!(report.outcomes.iter().any(|o| matches!(
        o,
        TensorOutcome::SkippedUnsupportedDtype { name, .. } if name == "blk.0.ffn_up.weight"
    )));
    assert!(report.warnings.contains(&RunWarning::UnknownMetadataType {
        key: "general.file_type".to_string(),
        type_code: 10,
    }));
    assert_eq!(out.len() as u64, report.total_bytes());
}

#[test]
fn test_strict_conversion_fails_on_quantized_tensor() {
    let mut source = open(synthetic_container());
    let config = source.model_config();
    let plan = resolve("llama2", &config).unwrap();
    let options = SerializeOptions {
        scheme: QuantScheme::Fp32,
        strict: true,
        generation: HeaderGeneration::Typed,
    };
    let err = Serializer::new(&config, &plan, options)
        .write(&mut source, &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, ConvertError::SkippedUnsupportedDtype { .. }));
}

#[test]
fn test_zero_magic_is_a_format_error() {
    let mut bytes = synthetic_container();
    bytes[..4].copy_from_slice(&[0, 0, 0, 0]);
    let err = GgufSource::from_reader("bad", GgufReader::from_reader(Cursor::new(bytes)))
        .err()
        .unwrap();
    assert!(matches!(err, ConvertError::Format(ref msg) if msg.contains("magic")));
}

#[test]
fn test_open_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&synthetic_container()).unwrap();
    file.flush().unwrap();

    let source = GgufSource::open(file.path()).unwrap();
    assert_eq!(source.tensor_names().len(), 12);
    assert!(source.contains("output.weight"));
    assert!(source.label().starts_with("gguf v3"));
}
