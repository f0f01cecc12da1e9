//! Learned table layer for Stratum.
//!
//! This crate provides:
//! - `DbTable`, a learned index over per-row hash directory slots
//! - Promotion of overgrown slots into nested tables
//! - `SharedTable`, a lock-protected handle for concurrent use
//! - `Catalog`, a registry of named tables

mod catalog;
mod shared;
mod table;

pub use catalog::Catalog;
pub use shared::SharedTable;
pub use table::{DbTable, Slot, SlotDirectory, TableStats};
