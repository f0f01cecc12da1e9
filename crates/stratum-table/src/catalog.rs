//! Named table registry.

use crate::shared::SharedTable;
use crate::table::DbTable;
use parking_lot::RwLock;
use std::collections::HashMap;
use stratum_common::{IndexConfig, Result, Row, Schema, StratumError, Value};
use tracing::info;

/// Maps table names to shared tables.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, SharedTable>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows in any order and registers it under `name`.
    pub fn load(
        &self,
        name: &str,
        rows: Vec<Row>,
        schema: Schema,
        sort_key: &str,
        config: IndexConfig,
    ) -> Result<SharedTable> {
        if self.tables.read().contains_key(name) {
            return Err(StratumError::TableAlreadyExists(name.to_string()));
        }
        let table = DbTable::from_unsorted(rows, schema, sort_key, config)?;
        self.register(name, table)
    }

    /// Registers an already built table.
    pub fn register(&self, name: &str, table: DbTable) -> Result<SharedTable> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(StratumError::TableAlreadyExists(name.to_string()));
        }
        info!(
            table = name,
            rows = table.len(),
            sort_key = table.sort_key(),
            "table loaded"
        );
        let shared = SharedTable::new(table);
        tables.insert(name.to_string(), shared.clone());
        Ok(shared)
    }

    pub fn get(&self, name: &str) -> Result<SharedTable> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StratumError::TableNotFound(name.to_string()))
    }

    pub fn schema(&self, name: &str) -> Result<Schema> {
        Ok(self.get(name)?.schema())
    }

    pub fn select(&self, name: &str, key: &Value) -> Result<Option<Row>> {
        self.get(name)?.select(key)
    }

    pub fn insert(&self, name: &str, row: Row) -> Result<()> {
        self.get(name)?.insert(row)
    }

    /// Removes a table. Outstanding handles stay usable.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| info!(table = name, "table dropped"))
            .ok_or_else(|| StratumError::TableNotFound(name.to_string()))
    }

    /// Registered table names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
