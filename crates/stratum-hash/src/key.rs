//! Key extraction from stored items.

use stratum_common::{Row, Value};

/// Extracts the indexed key from a stored item.
pub trait KeyExtractor<T> {
    fn extract<'a>(&self, item: &'a T) -> &'a Value;
}

/// Items that are their own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl KeyExtractor<Value> for Identity {
    #[inline]
    fn extract<'a>(&self, item: &'a Value) -> &'a Value {
        item
    }
}

/// Keys rows by one column position.
///
/// Rows are checked against the table schema before insertion, so a missing
/// column only happens for rows built outside a table; those key as `Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnKey {
    index: usize,
}

impl ColumnKey {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

static NULL_KEY: Value = Value::Null;

impl KeyExtractor<Row> for ColumnKey {
    #[inline]
    fn extract<'a>(&self, item: &'a Row) -> &'a Value {
        item.get(self.index).unwrap_or(&NULL_KEY)
    }
}
