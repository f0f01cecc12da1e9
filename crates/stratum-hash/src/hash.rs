//! Hash normalization and digest for directory indexing.
//!
//! Values are first rendered to a canonical string so that equal values with
//! different representations (`Int(5)` and `Float(5.0)`, `Text("a")` and
//! `Bytes(b"a")`) always land in the same directory slot. The canonical string
//! is hashed with SHA-256 and the low 64 bits of the digest, read as a
//! big-endian integer, become the hash.

use sha2::{Digest, Sha256};
use std::borrow::Cow;
use stratum_common::Value;

/// Canonical rendering of `Value::Null`.
pub const NULL_SENTINEL: &str = "None";

/// Renders a value to its canonical hashing string.
pub fn normalize_for_hash(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(NULL_SENTINEL),
        Value::Bool(true) => Cow::Borrowed("true"),
        Value::Bool(false) => Cow::Borrowed("false"),
        Value::Int(i) => Cow::Owned(i.to_string()),
        Value::Float(f) => Cow::Owned(normalize_float(*f)),
        Value::Text(s) => Cow::Borrowed(s.as_str()),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Cow::Borrowed(s),
            Err(_) => Cow::Owned(hex::encode(b)),
        },
    }
}

/// Integral floats inside the i64 range render like the equal integer.
fn normalize_float(f: f64) -> String {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Hashes a value: SHA-256 over its canonical string, low 64 bits.
pub fn hash_value(value: &Value) -> u64 {
    let canonical = normalize_for_hash(value);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[24..32]);
    u64::from_be_bytes(low)
}

/// Returns the directory slot for a hash at the given global depth.
#[inline(always)]
pub fn slot_for_hash(hash: u64, global_depth: u32) -> usize {
    let mask = (1u64 << global_depth) - 1;
    (hash & mask) as usize
}
