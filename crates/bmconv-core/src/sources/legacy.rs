//! Unquantized streams as a tensor source.
//!
//! An fp32 stream has no tensor directory, so offsets are derived from the
//! header config and the emission plan of the architecture that wrote it.
//! Tensors are named with the reference key family, which every
//! architecture accepts, and read lazily.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use crate::codec::{HeaderGeneration, read_header};
use crate::domain::{ModelConfig, SourceDtype, Tensor};
use crate::error::{ConvertError, Result};
use crate::layout::{KeyFamily, WeightPlan, resolve};
use crate::ports::{TensorFetch, TensorSource};
use crate::quant::fp32;

#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: u64,
    n_elements: usize,
}

/// A previously written fp32 stream.
#[derive(Debug)]
pub struct LegacyStreamSource<R> {
    reader: R,
    config: ModelConfig,
    generation: HeaderGeneration,
    names: Vec<String>,
    extents: HashMap<String, Extent>,
}

impl<R: Read + Seek> LegacyStreamSource<R> {
    /// Open a stream written for `architecture`.
    ///
    /// Without a hint the header generation is the one whose size makes the
    /// stream length match the plan exactly. Fails with a format error when
    /// the stream is shorter than the plan requires.
    pub fn open(mut reader: R, hint: Option<HeaderGeneration>, architecture: &str) -> Result<Self> {
        let hint = match hint {
            Some(generation) => Some(generation),
            None => infer_generation(&mut reader, architecture)?,
        };
        let (config, generation) = read_header(&mut reader, hint)?;
        config.validate()?;
        let plan = resolve(architecture, &config)?;

        let mut offset = reader.stream_position()?;
        let mut names = Vec::with_capacity(plan.len());
        let mut extents = HashMap::with_capacity(plan.len());
        for &slot in plan.slots() {
            let name = WeightPlan::key_in(slot, KeyFamily::Meta);
            let n_elements = slot.kind.element_count(&config);
            extents.insert(name.clone(), Extent { offset, n_elements });
            names.push(name);
            offset += fp32::encoded_len(n_elements) as u64;
        }

        let end = reader.seek(SeekFrom::End(0))?;
        if end < offset {
            return Err(ConvertError::format(format!(
                "stream is {end} bytes, fp32 weights for {config} need {offset}"
            )));
        }
        if end > offset {
            tracing::debug!(trailing = end - offset, "Ignoring trailing bytes after last weight");
        }

        Ok(Self {
            reader,
            config,
            generation,
            names,
            extents,
        })
    }

    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub const fn generation(&self) -> HeaderGeneration {
        self.generation
    }
}

fn fp32_weight_bytes(plan: &WeightPlan, config: &ModelConfig) -> u64 {
    plan.slots()
        .iter()
        .map(|slot| fp32::encoded_len(slot.kind.element_count(config)) as u64)
        .sum()
}

/// Header generation implied by the stream length, if exactly one fits.
///
/// The seven base fields are shared by every generation, so the weight size
/// is known before the generation is.
fn infer_generation<R: Read + Seek>(reader: &mut R, architecture: &str) -> Result<Option<HeaderGeneration>> {
    let start = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;
    let (config, _) = read_header(reader, Some(HeaderGeneration::Legacy))?;
    reader.seek(SeekFrom::Start(start))?;

    if config.validate().is_err() {
        return Ok(None);
    }
    let Ok(plan) = resolve(architecture, &config) else {
        return Ok(None);
    };
    let header_len = (end - start).checked_sub(fp32_weight_bytes(&plan, &config));
    let generation = [
        HeaderGeneration::Legacy,
        HeaderGeneration::Typed,
        HeaderGeneration::Rope,
    ]
    .into_iter()
    .find(|g| Some(g.size() as u64) == header_len);
    tracing::debug!(?generation, "Inferred header generation from stream length");
    Ok(generation)
}

impl<R: Read + Seek> TensorSource for LegacyStreamSource<R> {
    fn label(&self) -> String {
        format!("fp32 stream ({:?} header)", self.generation).to_lowercase()
    }

    fn contains(&self, name: &str) -> bool {
        self.extents.contains_key(name)
    }

    fn fetch(&mut self, name: &str) -> Result<TensorFetch> {
        let extent = *self
            .extents
            .get(name)
            .ok_or_else(|| ConvertError::format(format!("no tensor '{name}' in stream")))?;
        self.reader.seek(SeekFrom::Start(extent.offset))?;
        let data = fp32::read_values(&mut self.reader, extent.n_elements)?;
        let tensor = Tensor::new(name, vec![extent.n_elements], SourceDtype::F32, data)?;
        Ok(TensorFetch::Loaded(tensor))
    }

    fn tensor_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_header;
    use std::io::Cursor;

    fn tiny() -> ModelConfig {
        ModelConfig::new(8, 16, 1, 2, 1, 10, 4)
    }

    fn stream(config: &ModelConfig) -> Vec<u8> {
        let plan = resolve("llama2", config).unwrap();
        let mut bytes = encode_header(config, HeaderGeneration::Typed);
        for (i, slot) in plan.slots().iter().enumerate() {
            for _ in 0..slot.kind.element_count(config) {
                bytes.extend_from_slice(&(i as f32).to_le_bytes());
            }
        }
        bytes
    }

    fn open_typed(bytes: Vec<u8>) -> Result<LegacyStreamSource<Cursor<Vec<u8>>>> {
        LegacyStreamSource::open(Cursor::new(bytes), Some(HeaderGeneration::Typed), "llama2")
    }

    #[test]
    fn test_reads_tensors_by_meta_name() {
        let config = tiny().with_model_type(0);
        let mut source = open_typed(stream(&config)).unwrap();
        assert_eq!(source.generation(), HeaderGeneration::Typed);
        assert_eq!(source.tensor_names()[0], "tok_embeddings.weight");

        // Slot 2 in grouped order is layers.0.attention.wq.
        match source.fetch("layers.0.attention.wq.weight").unwrap() {
            TensorFetch::Loaded(t) => {
                assert_eq!(t.n_elements(), 64);
                assert!(t.data().iter().all(|&v| (v - 2.0).abs() < f32::EPSILON));
            }
            TensorFetch::Unsupported { .. } => panic!("fp32 stream is always loadable"),
        }
    }

    #[test]
    fn test_generation_inferred_from_length() {
        for (config, generation) in [
            (tiny(), HeaderGeneration::Legacy),
            (tiny().with_model_type(0), HeaderGeneration::Typed),
            (tiny().with_rope_theta(500_000.0), HeaderGeneration::Rope),
        ] {
            let mut bytes = encode_header(&config, generation);
            bytes.extend_from_slice(&stream(&config)[HeaderGeneration::Typed.size()..]);
            let source = LegacyStreamSource::open(Cursor::new(bytes), None, "llama2").unwrap();
            assert_eq!(source.generation(), generation);
        }
    }

    #[test]
    fn test_short_stream_is_rejected() {
        let mut bytes = stream(&tiny().with_model_type(0));
        bytes.truncate(bytes.len() - 4);
        let err = open_typed(bytes).unwrap_err();
        assert!(matches!(err, ConvertError::Format(_)));
    }

    #[test]
    fn test_classifier_present_for_negative_vocab() {
        let config = tiny().with_model_type(0).with_shared_classifier(false);
        let source = open_typed(stream(&config)).unwrap();
        assert!(source.contains("output.weight"));
        assert_eq!(source.config().vocab_size(), -10);
    }
}
