//! GGUF metadata domain types.
//!
//! Parsing lives in `bmconv-gguf`; these are the values it hands back.

use std::fmt;

/// A decoded GGUF metadata value.
///
/// Only the value kinds the converter consumes are materialized. Arrays keep
/// their element type and length; element data is skipped at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum GgufValue {
    U32(u32),
    I32(i32),
    F32(f32),
    String(String),
    Array { element_type: u32, len: u64 },
}

impl fmt::Display for GgufValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Array { len, .. } => write!(f, "[Array with {len} elements]"),
        }
    }
}

impl GgufValue {
    /// Try to convert the value to a u64.
    ///
    /// Negative integers and floats yield `None`.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U32(v) => Some(u64::from(*v)),
            Self::I32(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Try to convert the value to an i32, rejecting out-of-range values.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::U32(v) => i32::try_from(*v).ok(),
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert the value to an f32.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            Self::U32(v) => Some(*v as f32),
            Self::I32(v) => Some(*v as f32),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Array length, when the value is an array.
    #[must_use]
    pub const fn array_len(&self) -> Option<u64> {
        match self {
            Self::Array { len, .. } => Some(*len),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(GgufValue::U32(4096).as_u64(), Some(4096));
        assert_eq!(GgufValue::I32(-1).as_u64(), None);
        assert_eq!(GgufValue::U32(u32::MAX).as_i32(), None);
        assert_eq!(GgufValue::I32(22).as_i32(), Some(22));
        assert_eq!(GgufValue::String("x".into()).as_i32(), None);
        assert!((GgufValue::F32(1.5).as_f32().unwrap() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_array_display_is_summarized() {
        let arr = GgufValue::Array {
            element_type: 8,
            len: 32_000,
        };
        assert_eq!(arr.to_string(), "[Array with 32000 elements]");
        assert_eq!(arr.array_len(), Some(32_000));
    }
}
