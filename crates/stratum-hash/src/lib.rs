//! Extensible hashing layer for Stratum.
//!
//! This crate provides:
//! - Canonical value normalization and SHA-256 based hashing
//! - Fixed-capacity, append-only buckets with buddy splitting
//! - A doubling directory that resolves slots by chasing references

pub mod bucket;
pub mod directory;
pub mod hash;
pub mod key;

pub use bucket::{Bucket, InsertOutcome};
pub use directory::ExtensibleHash;
pub use hash::{hash_value, normalize_for_hash};
pub use key::{ColumnKey, Identity, KeyExtractor};
