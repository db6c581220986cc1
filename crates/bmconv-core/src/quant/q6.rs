//! Q6 group-wise symmetric quantization.
//!
//! Groups are fixed at 64 elements. Each group stores one scale
//! (`max|v| / 31`, or `1.0` for an all-zero group) and one signed byte per
//! element in `-31..=31`. A full byte per code trades density for unpack speed.
//!
//! Block layout (little-endian):
//!
//! | field | type |
//! |---|---|
//! | magic | u32 `0xD31B_0006` |
//! | version | u32 |
//! | n_elements | u32 |
//! | n_groups | u32 |
//! | group_size | u32 |
//! | reserved | 3 × u32, zero |
//! | codes | i8 × n_elements |
//! | scales | f32 × n_groups |
//!
//! Version 1 trims the codes to `n_elements`; the final group may be short
//! and readers must not expect padding codes.

use std::io::{Read, Write};

use super::int4::usable_scale;
use crate::error::{ConvertError, Result};

pub const MAGIC: u32 = 0xD31B_0006;
pub const VERSION: u32 = 1;
pub const GROUP_SIZE: usize = 64;
pub const HEADER_LEN: usize = 24;

const MAX_CODE: f32 = 31.0;

/// One Q6-encoded tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Q6Block {
    codes: Vec<i8>,
    scales: Vec<f32>,
}

impl Q6Block {
    /// Quantize `values`. Values must be finite.
    pub fn quantize(values: &[f32]) -> Self {
        let mut codes = Vec::with_capacity(values.len());
        let mut scales = Vec::with_capacity(values.len().div_ceil(GROUP_SIZE));

        for group in values.chunks(GROUP_SIZE) {
            let max_abs = group.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
            #[allow(clippy::float_cmp)]
            let scale = if max_abs == 0.0 { 1.0 } else { max_abs / MAX_CODE };
            scales.push(scale);
            codes.extend(
                group
                    .iter()
                    .map(|v| (v / scale).round_ties_even().clamp(-MAX_CODE, MAX_CODE) as i8),
            );
        }

        Self { codes, scales }
    }

    /// First group whose scale underflowed to zero or whose largest code
    /// dequantizes past `f32::MAX`.
    pub fn degenerate_group(&self) -> Option<(usize, f32)> {
        self.scales
            .iter()
            .copied()
            .enumerate()
            .find(|&(_, scale)| !usable_scale(scale) || !(MAX_CODE * scale).is_finite())
    }

    pub fn n_elements(&self) -> usize {
        self.codes.len()
    }

    pub fn n_groups(&self) -> usize {
        self.scales.len()
    }

    pub fn codes(&self) -> &[i8] {
        &self.codes
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn dequantize(&self) -> Vec<f32> {
        self.codes
            .iter()
            .enumerate()
            .map(|(i, &code)| f32::from(code) * self.scales[i / GROUP_SIZE])
            .collect()
    }

    pub fn encoded_len(&self) -> usize {
        encoded_len(self.codes.len())
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let n_elements = wire_u32(self.codes.len(), "n_elements")?;
        let n_groups = wire_u32(self.scales.len(), "n_groups")?;
        for word in [MAGIC, VERSION, n_elements, n_groups, GROUP_SIZE as u32, 0, 0, 0] {
            out.write_all(&word.to_le_bytes())?;
        }
        let codes: Vec<u8> = self.codes.iter().map(|&c| c.to_le_bytes()[0]).collect();
        out.write_all(&codes)?;
        for scale in &self.scales {
            out.write_all(&scale.to_le_bytes())?;
        }
        Ok(self.encoded_len() as u64)
    }

    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let header = BlockHeader::read_from(input)?;
        let mut raw = vec![0u8; header.n_elements];
        input.read_exact(&mut raw)?;
        let codes = raw.into_iter().map(|b| i8::from_le_bytes([b])).collect();

        let mut raw = vec![0u8; header.n_groups * 4];
        input.read_exact(&mut raw)?;
        let scales = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { codes, scales })
    }
}

/// The fixed 24-byte header of a Q6 block, checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub n_elements: usize,
    pub n_groups: usize,
}

impl BlockHeader {
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut raw = [0u8; HEADER_LEN];
        input.read_exact(&mut raw)?;
        let word = |i: usize| {
            u32::from_le_bytes([raw[i * 4], raw[i * 4 + 1], raw[i * 4 + 2], raw[i * 4 + 3]])
        };

        if word(0) != MAGIC {
            return Err(ConvertError::format(format!(
                "Q6 block magic 0x{:08X}, expected 0x{MAGIC:08X}",
                word(0)
            )));
        }
        if word(1) != VERSION {
            return Err(ConvertError::format(format!(
                "unsupported Q6 block version {}",
                word(1)
            )));
        }
        if word(4) as usize != GROUP_SIZE {
            return Err(ConvertError::format(format!(
                "Q6 block group size {}, expected {GROUP_SIZE}",
                word(4)
            )));
        }
        let n_elements = word(2) as usize;
        let n_groups = word(3) as usize;
        if n_groups != n_elements.div_ceil(GROUP_SIZE) {
            return Err(ConvertError::format(format!(
                "Q6 block has {n_groups} groups for {n_elements} elements"
            )));
        }
        Ok(Self {
            n_elements,
            n_groups,
        })
    }

    /// Bytes following the header.
    pub const fn payload_len(&self) -> usize {
        self.n_elements + 4 * self.n_groups
    }
}

/// Full encoded size of a block holding `n_elements`.
pub const fn encoded_len(n_elements: usize) -> usize {
    HEADER_LEN + n_elements + 4 * n_elements.div_ceil(GROUP_SIZE)
}

fn wire_u32(value: usize, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ConvertError::format(format!("{field} {value} does not fit in u32")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_symmetric_codes() {
        let block = Q6Block::quantize(&[-3.1, 0.0, 3.1, 1.0]);
        assert_eq!(block.codes(), &[-31, 0, 31, 10]);
        assert!((block.scales()[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_all_zero_group_has_unit_scale() {
        let block = Q6Block::quantize(&[0.0; 70]);
        assert_eq!(block.n_groups(), 2);
        assert_eq!(block.scales(), &[1.0, 1.0]);
        assert!(block.codes().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_subnormal_group_is_degenerate() {
        let mut values = vec![0.5; GROUP_SIZE];
        values.extend([f32::from_bits(1), 0.0]);
        let block = Q6Block::quantize(&values);
        assert_eq!(block.degenerate_group(), Some((1, 0.0)));
        assert!(Q6Block::quantize(&[3e38, -3e38]).degenerate_group().is_none());
    }

    #[test]
    fn test_codes_are_trimmed() {
        let values: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let block = Q6Block::quantize(&values);
        assert_eq!(block.codes().len(), 100);
        assert_eq!(block.n_groups(), 2);
        assert_eq!(block.encoded_len(), 24 + 100 + 8);
    }

    #[test]
    fn test_error_bound_per_group() {
        let values: Vec<f32> = (0..200).map(|i| ((i * 13) % 29) as f32 * 0.07 - 0.9).collect();
        let block = Q6Block::quantize(&values);
        for (i, (a, b)) in values.iter().zip(block.dequantize()).enumerate() {
            let bound = block.scales()[i / GROUP_SIZE] / 2.0 + 1e-6;
            assert!((a - b).abs() <= bound, "element {i}");
        }
    }

    #[test]
    fn test_write_then_read_block() {
        let values: Vec<f32> = (0..65).map(|i| (i as f32).sin()).collect();
        let block = Q6Block::quantize(&values);
        let mut buf = Vec::new();
        let written = block.write_to(&mut buf).unwrap();
        assert_eq!(written as usize, buf.len());
        assert_eq!(&buf[..4], &MAGIC.to_le_bytes());
        assert_eq!(&buf[20..24], &[0, 0, 0, 0]);

        let read = Q6Block::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read, block);
    }

    #[test]
    fn test_read_rejects_bad_magic_and_group_count() {
        let mut buf = Vec::new();
        Q6Block::quantize(&[1.0; 10]).write_to(&mut buf).unwrap();

        let mut bad_magic = buf.clone();
        bad_magic[0] ^= 0xFF;
        assert!(matches!(
            Q6Block::read_from(&mut Cursor::new(bad_magic)),
            Err(ConvertError::Format(_))
        ));

        let mut bad_groups = buf;
        bad_groups[12] = 5;
        assert!(matches!(
            Q6Block::read_from(&mut Cursor::new(bad_groups)),
            Err(ConvertError::Format(_))
        ));
    }

    #[test]
    fn test_empty_tensor() {
        let block = Q6Block::quantize(&[]);
        assert_eq!(block.n_groups(), 0);
        assert_eq!(block.encoded_len(), HEADER_LEN);
    }
}
