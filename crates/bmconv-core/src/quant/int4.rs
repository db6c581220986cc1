//! INT4 group-wise affine quantization.
//!
//! The tensor is flattened and split into consecutive groups of
//! `group_size`; the final group is padded with zeros, and the padding takes
//! part in that group's min/max. Per group:
//!
//! ```text
//! scale = (max - min) / 15      (1.0 when max == min)
//! code  = clamp(round((v - min) / scale), 0, 15)
//! v'    = min + code * scale
//! ```
//!
//! Codes pack two per byte, high nibble first. Only the real elements are
//! packed; with an odd count the last low nibble is zero and never read.
//!
//! Block layout: `n_elements: i32`, `n_groups: i32`, packed codes
//! (`ceil(n / 2)` bytes), scales (`f32 × n_groups`), mins (`f32 × n_groups`).

use std::io::{Read, Write};

use crate::error::{ConvertError, Result};

/// Default INT4 group size.
pub const DEFAULT_GROUP_SIZE: usize = 32;

/// Largest code value.
const MAX_CODE: f32 = 15.0;

/// Byte length of the `n_elements` + `n_groups` prefix.
pub const PREFIX_LEN: usize = 8;

/// One INT4-encoded tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Int4Block {
    n_elements: usize,
    group_size: usize,
    packed: Vec<u8>,
    scales: Vec<f32>,
    zeros: Vec<f32>,
}

impl Int4Block {
    /// Quantize `values` with the given group size.
    ///
    /// Values must be finite; the caller checks before encoding.
    pub fn quantize(values: &[f32], group_size: usize) -> Self {
        let group_size = group_size.max(1);
        let n = values.len();
        let n_groups = n.div_ceil(group_size);
        let mut packed = vec![0u8; n.div_ceil(2)];
        let mut scales = Vec::with_capacity(n_groups);
        let mut zeros = Vec::with_capacity(n_groups);

        for (g, group) in values.chunks(group_size).enumerate() {
            let padded = group.len() < group_size;
            let (mut min, mut max) = group
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            if padded {
                min = min.min(0.0);
                max = max.max(0.0);
            }
            #[allow(clippy::float_cmp)]
            let scale = if max == min { 1.0 } else { (max - min) / MAX_CODE };
            scales.push(scale);
            zeros.push(min);

            for (i, &v) in group.iter().enumerate() {
                let code = ((v - min) / scale).round_ties_even().clamp(0.0, MAX_CODE) as u8;
                let index = g * group_size + i;
                let byte = &mut packed[index / 2];
                if index % 2 == 0 {
                    *byte |= code << 4;
                } else {
                    *byte |= code;
                }
            }
        }

        Self {
            n_elements: n,
            group_size,
            packed,
            scales,
            zeros,
        }
    }

    pub const fn n_elements(&self) -> usize {
        self.n_elements
    }

    pub const fn n_groups(&self) -> usize {
        self.scales.len()
    }

    pub const fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn zeros(&self) -> &[f32] {
        &self.zeros
    }

    /// First group whose codes cannot be dequantized: the scale is infinite
    /// or zero, or `min + 15 * scale` overflows.
    pub fn degenerate_group(&self) -> Option<(usize, f32)> {
        self.scales
            .iter()
            .zip(&self.zeros)
            .enumerate()
            .find(|&(_, (&scale, &zero))| {
                !usable_scale(scale) || !(zero + MAX_CODE * scale).is_finite()
            })
            .map(|(g, (&scale, _))| (g, scale))
    }

    /// The 4-bit code of element `index`.
    pub fn code(&self, index: usize) -> u8 {
        let byte = self.packed[index / 2];
        if index % 2 == 0 { byte >> 4 } else { byte & 0x0F }
    }

    /// Reconstruct the f32 values.
    pub fn dequantize(&self) -> Vec<f32> {
        (0..self.n_elements)
            .map(|i| {
                let g = i / self.group_size;
                f32::from(self.code(i)).mul_add(self.scales[g], self.zeros[g])
            })
            .collect()
    }

    /// Bytes this block occupies in the stream.
    pub fn encoded_len(&self) -> usize {
        PREFIX_LEN + self.packed.len() + 8 * self.n_groups()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let n_elements = wire_count(self.n_elements, "n_elements")?;
        let n_groups = wire_count(self.n_groups(), "n_groups")?;
        out.write_all(&n_elements.to_le_bytes())?;
        out.write_all(&n_groups.to_le_bytes())?;
        out.write_all(&self.packed)?;
        for scale in &self.scales {
            out.write_all(&scale.to_le_bytes())?;
        }
        for zero in &self.zeros {
            out.write_all(&zero.to_le_bytes())?;
        }
        Ok(self.encoded_len() as u64)
    }

    /// Read one block. The group size is not stored in the stream.
    pub fn read_from<R: Read>(input: &mut R, group_size: usize) -> Result<Self> {
        let (n_elements, n_groups) = read_prefix(input)?;
        let group_size = group_size.max(1);
        if n_elements.div_ceil(group_size) != n_groups {
            return Err(ConvertError::format(format!(
                "INT4 block has {n_groups} groups for {n_elements} elements at group size {group_size}"
            )));
        }
        let mut packed = vec![0u8; n_elements.div_ceil(2)];
        input.read_exact(&mut packed)?;
        let scales = read_f32s(input, n_groups)?;
        let zeros = read_f32s(input, n_groups)?;
        Ok(Self {
            n_elements,
            group_size,
            packed,
            scales,
            zeros,
        })
    }
}

/// Read and check the `n_elements`/`n_groups` prefix of a block.
pub fn read_prefix<R: Read>(input: &mut R) -> Result<(usize, usize)> {
    let mut prefix = [0u8; PREFIX_LEN];
    input.read_exact(&mut prefix)?;
    let n_elements = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    let n_groups = i32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
    let n_elements = usize::try_from(n_elements)
        .map_err(|_| ConvertError::format(format!("INT4 block n_elements {n_elements}")))?;
    let n_groups = usize::try_from(n_groups)
        .map_err(|_| ConvertError::format(format!("INT4 block n_groups {n_groups}")))?;
    if (n_elements == 0) != (n_groups == 0) || n_groups > n_elements {
        return Err(ConvertError::format(format!(
            "INT4 block has {n_groups} groups for {n_elements} elements"
        )));
    }
    Ok((n_elements, n_groups))
}

/// Payload bytes following the prefix of a block.
pub const fn payload_len(n_elements: usize, n_groups: usize) -> usize {
    n_elements.div_ceil(2) + 8 * n_groups
}

/// Size estimate without the block prefix: `ceil(n / 2) + 8 * n_groups`.
pub const fn estimate_size(n_elements: usize, group_size: usize) -> usize {
    let group_size = if group_size == 0 { 1 } else { group_size };
    payload_len(n_elements, n_elements.div_ceil(group_size))
}

/// A scale is usable when it is finite and positive.
pub(crate) fn usable_scale(scale: f32) -> bool {
    scale.is_finite() && scale > 0.0
}

fn wire_count(value: usize, field: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| ConvertError::format(format!("{field} {value} does not fit in i32")))
}

fn read_f32s<R: Read>(input: &mut R, count: usize) -> Result<Vec<f32>> {
    let mut raw = vec![0u8; count * 4];
    input.read_exact(&mut raw)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
