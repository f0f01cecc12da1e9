//! Column values stored in rows and used as index keys.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single column value.
///
/// Values are totally ordered so they can serve as sort keys:
/// `Null < Bool < numeric < textual`. Integers and floats compare by
/// numeric value, and text compares with bytes as raw byte strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Bytes),
}

impl Value {
    /// Returns the name of this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INT64",
            Value::Float(_) => "FLOAT64",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BYTES",
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for integers and floats.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a textual value.
    fn text_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) | Value::Bytes(_) => 3,
        }
    }
}

/// Orders an integer against a float. Integral floats compare exactly.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    // i64::MIN as f64 is exactly -2^63; i64::MAX as f64 rounds up to 2^63.
    if f >= i64::MAX as f64 {
        return Ordering::Less;
    }
    if f < i64::MIN as f64 {
        return Ordering::Greater;
    }
    if f.fract() == 0.0 {
        return i.cmp(&(f as i64));
    }
    // Non-integral floats are below 2^53 in magnitude and never equal an integer.
    (i as f64).partial_cmp(&f).unwrap_or(Ordering::Equal)
}

fn cmp_floats(a: f64, b: f64) -> Ordering {
    // -0.0 and 0.0 are equal; NaNs fall back to IEEE total order.
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_floats(*a, *b),
            (Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
            _ => match (self.text_bytes(), other.text_bytes()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{:?}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "NULL");
        assert_eq!(Value::from(true).type_name(), "BOOLEAN");
        assert_eq!(Value::from(1i64).type_name(), "INT64");
        assert_eq!(Value::from(1.5).type_name(), "FLOAT64");
        assert_eq!(Value::from("a").type_name(), "TEXT");
        assert_eq!(Value::from(vec![1u8, 2]).type_name(), "BYTES");
    }

    #[test]
    fn test_rank_ordering() {
        let mut values = vec![
            Value::from("a"),
            Value::from(3i64),
            Value::Null,
            Value::from(false),
        ];
        values.sort();
        assert!(values[0].is_null());
        assert_eq!(values[1], Value::Bool(false));
        assert_eq!(values[2], Value::Int(3));
        assert_eq!(values[3].as_str(), Some("a"));
    }

    #[test]
    fn test_int_float_compare() {
        assert_eq!(Value::Int(5), Value::Float(5.0));
        assert!(Value::Int(5) < Value::Float(5.5));
        assert!(Value::Float(-0.5) < Value::Int(0));
        assert!(Value::Int(i64::MAX) < Value::Float(f64::INFINITY));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn test_large_int_float_compare_exact() {
        let big = 1i64 << 53;
        assert_ne!(Value::Int(big + 1), Value::Float(big as f64));
        assert!(Value::Int(big + 1) > Value::Float(big as f64));

        let two_pow_63 = 9_223_372_036_854_775_808.0f64;
        assert!(Value::Int(i64::MAX) < Value::Float(two_pow_63));
        assert!(Value::Int(i64::MAX - 1) < Value::Float(two_pow_63));
        assert!(Value::Float(two_pow_63) > Value::Int(i64::MAX));
        assert!(Value::Int(i64::MIN) > Value::Float(-two_pow_63 * 2.0));
        assert_eq!(Value::Int(i64::MIN), Value::Float(-two_pow_63));
        assert!(Value::Int(i64::MAX) < Value::Float(f64::INFINITY));
        assert!(Value::Int(i64::MIN) > Value::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_nan_is_ordered() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert!(Value::Float(f64::INFINITY) < nan);
        assert!(Value::Int(0) < nan);
    }

    #[test]
    fn test_text_bytes_compare() {
        assert_eq!(Value::from("abc"), Value::from(b"abc".to_vec()));
        assert!(Value::from("abc") < Value::from("abd"));
        assert!(Value::from(vec![0xffu8]) > Value::from("zzz"));
    }

    #[test]
    fn test_option_conversion() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some(7i64)).as_int(), Some(7));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(42i64).to_string(), "42");
        assert_eq!(Value::from("sid").to_string(), "sid");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
    }
}
