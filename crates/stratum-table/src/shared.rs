//! Thread-safe table handle.

use crate::table::{DbTable, TableStats};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use stratum_common::{Result, Row, Schema, Value};

/// Cloneable handle to a table behind a reader-writer lock.
///
/// Selects share the read lock; inserts take the write lock, so every insert
/// (and any promotion it triggers) is applied atomically with respect to
/// concurrent readers.
#[derive(Debug, Clone)]
pub struct SharedTable {
    inner: Arc<RwLock<DbTable>>,
}

impl SharedTable {
    pub fn new(table: DbTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Finds a row by sort key, returning an owned copy.
    pub fn select(&self, key: &Value) -> Result<Option<Row>> {
        let table = self.inner.read();
        Ok(table.select(key)?.cloned())
    }

    pub fn insert(&self, row: Row) -> Result<()> {
        self.inner.write().insert(row)
    }

    pub fn schema(&self) -> Schema {
        self.inner.read().schema().clone()
    }

    pub fn sort_key(&self) -> String {
        self.inner.read().sort_key().to_string()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TableStats {
        self.inner.read().stats()
    }

    /// Holds the read lock for multi-step inspection.
    pub fn read(&self) -> RwLockReadGuard<'_, DbTable> {
        self.inner.read()
    }
}

impl From<DbTable> for SharedTable {
    fn from(table: DbTable) -> Self {
        Self::new(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use stratum_common::{IndexConfig, row};

    fn shared() -> SharedTable {
        let rows = (0..50).map(|k| row![k * 10, "seed"]).collect();
        let schema = Schema::new(["id", "tag"]);
        let config = IndexConfig {
            level_fanouts: vec![1, 4],
            bucket_capacity: 4,
            depth_limit: 3,
            ..Default::default()
        };
        DbTable::new(rows, schema, "id", config).unwrap().into()
    }

    #[test]
    fn test_select_returns_owned_row() {
        let table = shared();
        assert_eq!(table.select(&Value::Int(30)).unwrap(), Some(row![30, "seed"]));
        assert_eq!(table.select(&Value::Int(31)).unwrap(), None);
        assert_eq!(table.schema().columns(), &["id", "tag"]);
        assert_eq!(table.sort_key(), "id");
    }

    #[test]
    fn test_clones_share_state() {
        let a = shared();
        let b = a.clone();
        a.insert(row![1001, "late"]).unwrap();
        assert_eq!(b.len(), 51);
        assert!(b.select(&Value::Int(1001)).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_inserts_and_selects() {
        let table = shared();
        let writers: Vec<_> = (0..4i64)
            .map(|t| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..50i64 {
                        let key = t * 1000 + i * 7 + 1;
                        table.insert(row![key, "w"]).unwrap();
                    }
                })
            })
            .collect();
        let reader = {
            let table = table.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(table.select(&Value::Int(0)).unwrap().is_some());
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(table.len(), 250);
        assert_eq!(table.read().scan().len(), 250);
        assert_eq!(table.stats().rows, 250);
    }
}
