//! Learned index layer for Stratum.
//!
//! This crate provides:
//! - A pluggable regression model capability with an ordinary least-squares default
//! - Numeric features for ordered keys
//! - A multi-level recursive model index with error-window lookups

pub mod key;
pub mod model;
pub mod rmi;

pub use key::LearnedKey;
pub use model::{LinearModel, RegressionModel};
pub use rmi::{MultiLevelRmi, Prediction};
