//! Stratum common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all Stratum components.

pub mod config;
pub mod error;
pub mod row;
pub mod value;

pub use config::{ErrorBound, IndexConfig};
pub use error::{Result, StratumError};
pub use row::{Row, Schema};
pub use value::Value;
