//! Configuration structures for Stratum indexes.

use crate::error::{Result, StratumError};
use serde::{Deserialize, Serialize};

/// Hard cap on directory doubling. A directory this deep holds 16M references.
pub const DEFAULT_MAX_GLOBAL_DEPTH: u32 = 24;

/// How the learned index sizes its search window around a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorBound {
    /// Fixed radius of `max(1, floor(sqrt(N)))` for every key.
    #[default]
    SqrtHeuristic,
    /// Largest rounded training residual of the leaf model the key routes to.
    MaxResidual,
}

/// Configuration for a learned table and the structures inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of regression models per RMI level. The first level must hold one model.
    pub level_fanouts: Vec<usize>,
    /// Number of row slots in each hash bucket.
    pub bucket_capacity: usize,
    /// A slot directory deeper than this is promoted into a nested table.
    pub depth_limit: u32,
    /// Directories never grow past this global depth.
    pub max_global_depth: u32,
    /// Tables nested this deep no longer promote their directories.
    pub max_nesting_depth: usize,
    /// Search window policy for the learned index.
    pub error_bound: ErrorBound,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            level_fanouts: vec![1, 2, 4],
            bucket_capacity: 10,
            depth_limit: 5,
            max_global_depth: DEFAULT_MAX_GLOBAL_DEPTH,
            max_nesting_depth: 8,
            error_bound: ErrorBound::SqrtHeuristic,
        }
    }
}

impl IndexConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        validate_fanouts(&self.level_fanouts)?;
        if self.bucket_capacity == 0 {
            return Err(invalid("bucket_capacity", self.bucket_capacity));
        }
        if self.depth_limit == 0 {
            return Err(invalid("depth_limit", self.depth_limit));
        }
        if self.max_global_depth <= self.depth_limit || self.max_global_depth >= usize::BITS {
            return Err(invalid("max_global_depth", self.max_global_depth));
        }
        Ok(())
    }

    /// Number of RMI levels.
    pub fn levels(&self) -> usize {
        self.level_fanouts.len()
    }
}

/// Checks a fan-out list: non-empty, starting with a single root model, no empty level.
pub fn validate_fanouts(fanouts: &[usize]) -> Result<()> {
    match fanouts.first() {
        None => Err(StratumError::ConfigError("empty fan-out list".to_string())),
        Some(&root) if root != 1 => Err(invalid("level_fanouts[0]", root)),
        Some(_) => match fanouts.iter().position(|&f| f == 0) {
            Some(level) => Err(invalid(&format!("level_fanouts[{}]", level), 0)),
            None => Ok(()),
        },
    }
}

fn invalid(name: &str, value: impl ToString) -> StratumError {
    StratumError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
