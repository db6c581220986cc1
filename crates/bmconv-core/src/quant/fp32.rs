//! Unquantized passthrough: raw little-endian f32, no framing.

use std::io::{Read, Write};

use crate::error::Result;

pub fn write_values<W: Write>(values: &[f32], out: &mut W) -> Result<u64> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    out.write_all(&bytes)?;
    Ok(bytes.len() as u64)
}

pub fn read_values<R: Read>(input: &mut R, n_elements: usize) -> Result<Vec<f32>> {
    let mut raw = vec![0u8; n_elements * 4];
    input.read_exact(&mut raw)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

pub const fn encoded_len(n_elements: usize) -> usize {
    n_elements * 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_values_are_bit_exact() {
        let values = [0.0, -1.5, f32::MIN_POSITIVE, 1e30];
        let mut buf = Vec::new();
        assert_eq!(write_values(&values, &mut buf).unwrap(), 16);
        let read = read_values(&mut Cursor::new(buf), 4).unwrap();
        assert_eq!(read, values);
    }
}
