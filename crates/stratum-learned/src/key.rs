//! Keys that can be fed to regression models.

use stratum_common::Value;

/// A totally ordered key with a numeric feature for regression.
///
/// The feature should be non-decreasing in key order for the learned index
/// to predict well; it does not have to be injective.
pub trait LearnedKey: Ord + Clone {
    fn feature(&self) -> f64;
}

impl LearnedKey for i64 {
    #[inline]
    fn feature(&self) -> f64 {
        *self as f64
    }
}

impl LearnedKey for i32 {
    #[inline]
    fn feature(&self) -> f64 {
        *self as f64
    }
}

impl LearnedKey for u32 {
    #[inline]
    fn feature(&self) -> f64 {
        *self as f64
    }
}

impl LearnedKey for u64 {
    #[inline]
    fn feature(&self) -> f64 {
        *self as f64
    }
}

/// First 8 bytes as a big-endian integer, zero padded.
fn prefix_feature(bytes: &[u8]) -> f64 {
    let mut prefix = [0u8; 8];
    let n = bytes.len().min(8);
    prefix[..n].copy_from_slice(&bytes[..n]);
    u64::from_be_bytes(prefix) as f64
}

impl LearnedKey for Value {
    fn feature(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => *i as f64,
            Value::Float(f) if f.is_nan() => 0.0,
            Value::Float(f) => *f,
            Value::Text(s) => prefix_feature(s.as_bytes()),
            Value::Bytes(b) => prefix_feature(b),
        }
    }
}
