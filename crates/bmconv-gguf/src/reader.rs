//! GGUF file reader abstraction.
//!
//! Little-endian primitives over any seekable byte stream, plus the value
//! decoding rules the converter needs: a few scalar types are materialized,
//! arrays are skipped with only their length kept, and every other known
//! type is skipped by size so parsing can continue.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use bmconv_core::GgufValue;
use half::{bf16, f16};

use crate::error::{GgufInternalError, GgufResult};
use crate::format::{GGUF_MAGIC, GgmlDtype, SUPPORTED_VERSIONS, ValueType};

/// Outcome of reading one metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadValue {
    Value(GgufValue),
    /// A known type the converter does not decode; its bytes were skipped.
    Skipped { type_code: u32 },
}

/// A reader for GGUF files.
pub struct GgufReader<R> {
    reader: R,
    /// Total stream length, measured on first use.
    len: Option<u64>,
}

impl GgufReader<BufReader<File>> {
    /// Open a GGUF file for reading.
    pub fn open(path: &Path) -> GgufResult<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read + Seek> GgufReader<R> {
    /// Create a reader from any seekable stream.
    pub const fn from_reader(reader: R) -> Self {
        Self { reader, len: None }
    }

    pub fn position(&mut self) -> GgufResult<u64> {
        Ok(self.reader.stream_position()?)
    }

    pub fn seek_to(&mut self, offset: u64) -> GgufResult<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Bytes left between the current position and the end of the stream.
    pub fn remaining(&mut self) -> GgufResult<u64> {
        let pos = self.reader.stream_position()?;
        let len = match self.len {
            Some(len) => len,
            None => {
                let len = self.reader.seek(SeekFrom::End(0))?;
                self.reader.seek(SeekFrom::Start(pos))?;
                self.len = Some(len);
                len
            }
        };
        Ok(len.saturating_sub(pos))
    }

    /// Fail with `field` unless `bytes` more bytes exist in the stream.
    fn ensure_available(&mut self, field: &'static str, bytes: u64) -> GgufResult<()> {
        let remaining = self.remaining()?;
        if bytes > remaining {
            return Err(GgufInternalError::InvalidField {
                field,
                offset: self.position()?,
                reason: format!("{bytes} bytes declared, {remaining} left in stream"),
            });
        }
        Ok(())
    }

    /// Skip `bytes` forward.
    pub fn skip(&mut self, bytes: u64) -> GgufResult<()> {
        self.ensure_available("skip length", bytes)?;
        let offset = i64::try_from(bytes).map_err(|_| GgufInternalError::InvalidField {
            field: "skip length",
            offset: 0,
            reason: format!("{bytes} bytes"),
        })?;
        self.reader.seek(SeekFrom::Current(offset))?;
        Ok(())
    }

    /// Read and validate the GGUF magic number.
    pub fn read_magic(&mut self) -> GgufResult<()> {
        let mut magic = [0u8; 4];
        self.reader.read_exact(&mut magic)?;
        if magic != GGUF_MAGIC {
            return Err(GgufInternalError::InvalidMagic { found: magic });
        }
        Ok(())
    }

    /// Read and validate the GGUF version.
    pub fn read_version(&mut self) -> GgufResult<u32> {
        let version = self.read_u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(GgufInternalError::UnsupportedVersion(version));
        }
        Ok(version)
    }

    /// Read a count field: u32 in version 1, u64 afterwards.
    pub fn read_count(&mut self, version: u32) -> GgufResult<u64> {
        if version >= 2 {
            self.read_u64()
        } else {
            Ok(u64::from(self.read_u32()?))
        }
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> GgufResult<u32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read an i32 value (little-endian).
    pub fn read_i32(&mut self) -> GgufResult<i32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> GgufResult<u64> {
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read an f32 value (little-endian).
    pub fn read_f32(&mut self) -> GgufResult<f32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    /// Read a string (u64 length prefix followed by UTF-8 bytes).
    pub fn read_string(&mut self) -> GgufResult<String> {
        let len = self.read_u64()?;
        let offset = self.position()?;
        self.ensure_available("string length", len)?;
        let len = usize::try_from(len).map_err(|_| GgufInternalError::InvalidField {
            field: "string length",
            offset,
            reason: format!("{len} bytes"),
        })?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| GgufInternalError::Utf8Error { offset })
    }

    /// Read the value of metadata entry `key` with the given type code.
    pub fn read_value(&mut self, key: &str, type_code: u32) -> GgufResult<ReadValue> {
        let value_type = self.value_type(key, type_code)?;
        let value = match value_type {
            ValueType::U32 => GgufValue::U32(self.read_u32()?),
            ValueType::I32 => GgufValue::I32(self.read_i32()?),
            ValueType::F32 => GgufValue::F32(self.read_f32()?),
            ValueType::String => GgufValue::String(self.read_string()?),
            ValueType::Array => {
                let element_type = self.read_u32()?;
                let len = self.read_u64()?;
                self.skip_elements(key, element_type, len)?;
                GgufValue::Array { element_type, len }
            }
            other => {
                self.skip_value(key, other)?;
                return Ok(ReadValue::Skipped { type_code });
            }
        };
        Ok(ReadValue::Value(value))
    }

    fn value_type(&mut self, key: &str, type_code: u32) -> GgufResult<ValueType> {
        match ValueType::from_code(type_code) {
            Some(value_type) => Ok(value_type),
            None => Err(GgufInternalError::InvalidValueType {
                key: key.to_string(),
                type_code,
                offset: self.position()?,
            }),
        }
    }

    fn skip_value(&mut self, key: &str, value_type: ValueType) -> GgufResult<()> {
        match value_type {
            ValueType::String => {
                let len = self.read_u64()?;
                self.skip(len)
            }
            ValueType::Array => {
                let element_type = self.read_u32()?;
                let len = self.read_u64()?;
                self.skip_elements(key, element_type, len)
            }
            fixed => self.skip(fixed.fixed_size().unwrap_or(0)),
        }
    }

    fn skip_elements(&mut self, key: &str, element_type: u32, len: u64) -> GgufResult<()> {
        let value_type = self.value_type(key, element_type)?;
        if let Some(size) = value_type.fixed_size() {
            let offset = self.position()?;
            let bytes = size.checked_mul(len).ok_or(GgufInternalError::InvalidField {
                field: "array length",
                offset,
                reason: format!("{len} elements overflow"),
            })?;
            return self.skip(bytes);
        }
        for _ in 0..len {
            self.skip_value(key, value_type)?;
        }
        Ok(())
    }

    /// Read `n_elements` values of `dtype` and widen them to f32.
    ///
    /// Returns `None` for dtypes that cannot be widened.
    pub fn read_f32_values(&mut self, dtype: GgmlDtype, n_elements: usize) -> GgufResult<Option<Vec<f32>>> {
        let Some(size) = dtype.element_size() else {
            return Ok(None);
        };
        let offset = self.position()?;
        let bytes = n_elements
            .checked_mul(size)
            .ok_or_else(|| GgufInternalError::InvalidField {
                field: "tensor size",
                offset,
                reason: format!("{n_elements} elements of {dtype} overflow"),
            })?;
        self.ensure_available("tensor data", bytes as u64)?;
        let mut raw = vec![0u8; bytes];
        self.reader.read_exact(&mut raw)?;
        let values = match dtype {
            GgmlDtype::F32 => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            GgmlDtype::F16 => raw
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            GgmlDtype::BF16 => raw
                .chunks_exact(2)
                .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            GgmlDtype::Other(_) => return Ok(None),
        };
        Ok(Some(values))
    }
}
