//! Recursive learned table.
//!
//! A table is an ordered array of slots. At construction every row gets its own
//! slot holding a small extensible hash directory, and a learned index is
//! trained over the slot keys. Lookups and inserts ask the learned index for a
//! slot, then probe directories (or recurse into nested tables) around it.
//!
//! ```text
//!              DbTable (rmi over slot keys)
//!   +--------+--------+-----------------+--------+
//!   | dir    | dir    | nested DbTable  | dir    |
//!   +--------+--------+-----------------+--------+
//!                       (promoted once its directory grew
//!                        past depth_limit)
//! ```
//!
//! The learned index is never retrained. Inserts land in the predicted slot
//! even when the key lies outside the slot's original range; hot slots absorb
//! that growth and are promoted into a freshly trained nested table once their
//! directory grows deeper than `depth_limit`.

use std::sync::Arc;
use stratum_common::{IndexConfig, Result, Row, Schema, StratumError, Value};
use stratum_hash::{ColumnKey, ExtensibleHash, InsertOutcome, KeyExtractor};
use stratum_learned::MultiLevelRmi;
use tracing::debug;

/// Hash directory stored in a table slot.
pub type SlotDirectory = ExtensibleHash<Row, ColumnKey>;

/// Contents of one table slot.
#[derive(Debug)]
pub enum Slot {
    Directory(SlotDirectory),
    Nested(Box<DbTable>),
}

impl Slot {
    /// Returns true if this slot was promoted.
    pub fn is_nested(&self) -> bool {
        matches!(self, Slot::Nested(_))
    }

    /// Number of rows stored under this slot.
    pub fn len(&self) -> usize {
        match self {
            Slot::Directory(dir) => dir.len(),
            Slot::Nested(table) => table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Structural summary of a table and everything nested under it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Slots in the top-level table.
    pub slots: usize,
    /// Directory slots at every level.
    pub directory_slots: usize,
    /// Promoted slots at every level.
    pub nested_slots: usize,
    /// Rows at every level.
    pub rows: usize,
    /// Levels of nesting below the top-level table.
    pub nesting_depth: usize,
    /// Deepest directory global depth anywhere.
    pub max_global_depth: u32,
}

/// Probe order around `center`: the center, then left before right at
/// increasing distance up to `radius`, skipping positions outside `[0, len)`.
fn probe_order(center: usize, radius: usize, len: usize) -> impl Iterator<Item = usize> {
    std::iter::once(center).chain((1..=radius).flat_map(move |i| {
        let left = center.checked_sub(i);
        let right = Some(center + i).filter(|&r| r < len);
        left.into_iter().chain(right)
    }))
}

/// Deepest a slot directory may grow at `nesting_level`.
///
/// Directories that can still be promoted stop one doubling past
/// `depth_limit`; at the nesting cap they fall back to `max_global_depth`.
fn directory_depth_cap(config: &IndexConfig, nesting_level: usize) -> u32 {
    if nesting_level < config.max_nesting_depth {
        config.depth_limit + 1
    } else {
        config.max_global_depth
    }
}

/// Learned table whose slots are hash directories or nested tables.
#[derive(Debug)]
pub struct DbTable {
    schema: Arc<Schema>,
    sort_key: String,
    key: ColumnKey,
    config: IndexConfig,
    /// 0 for a top-level table.
    nesting_level: usize,
    slots: Vec<Slot>,
    rmi: MultiLevelRmi<Value>,
}

impl DbTable {
    /// Builds a table from rows sorted ascending by `sort_key`.
    ///
    /// Fails on an empty row set, an unknown sort column, rows that do not
    /// match the schema, or rows out of sort order.
    pub fn new(
        rows: Vec<Row>,
        schema: Schema,
        sort_key: &str,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        let key = ColumnKey::new(schema.index_of(sort_key)?);
        Self::build(rows, Arc::new(schema), sort_key.to_string(), key, config, 0)
    }

    /// Sorts rows by `sort_key` (stable), then builds the table.
    pub fn from_unsorted(
        mut rows: Vec<Row>,
        schema: Schema,
        sort_key: &str,
        config: IndexConfig,
    ) -> Result<Self> {
        let key = ColumnKey::new(schema.index_of(sort_key)?);
        rows.sort_by(|a, b| key.extract(a).cmp(key.extract(b)));
        Self::new(rows, schema, sort_key, config)
    }

    fn build(
        rows: Vec<Row>,
        schema: Arc<Schema>,
        sort_key: String,
        key: ColumnKey,
        config: IndexConfig,
        nesting_level: usize,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(StratumError::EmptyTable);
        }

        let mut slots = Vec::with_capacity(rows.len());
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            schema.check_row(&row)?;
            keys.push(key.extract(&row).clone());
            let mut dir = SlotDirectory::with_max_depth(
                config.bucket_capacity,
                directory_depth_cap(&config, nesting_level),
                key,
            );
            dir.insert(row)?;
            slots.push(Slot::Directory(dir));
        }

        let mut rmi: MultiLevelRmi<Value> =
            MultiLevelRmi::with_error_bound(config.level_fanouts.clone(), config.error_bound)?;
        rmi.fit(keys)?;

        Ok(Self {
            schema,
            sort_key,
            key,
            config,
            nesting_level,
            slots,
            rmi,
        })
    }

    /// Column names of the table.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// 0 for a top-level table, parent level + 1 for a promoted slot.
    pub fn nesting_level(&self) -> usize {
        self.nesting_level
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Learned index over the construction-time slot keys.
    pub fn rmi(&self) -> &MultiLevelRmi<Value> {
        &self.rmi
    }

    /// Total number of rows, including nested tables.
    pub fn len(&self) -> usize {
        self.slots.iter().map(Slot::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot the learned index assigns to `key`.
    fn predicted_slot(&self, key: &Value) -> Result<(usize, usize)> {
        let prediction = self.rmi.predict(key)?;
        Ok((prediction.clamped(self.slots.len()), prediction.error))
    }

    /// Finds a row by sort key.
    ///
    /// Probes slots outward from the predicted slot, left before right, up to
    /// half the error radius away. Returns `None` once the window is exhausted.
    pub fn select(&self, key: &Value) -> Result<Option<&Row>> {
        let (center, error) = self.predicted_slot(key)?;
        for index in probe_order(center, error / 2, self.slots.len()) {
            let found = match &self.slots[index] {
                Slot::Nested(table) => table.select(key)?,
                Slot::Directory(dir) => dir.lookup(key)?,
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Inserts a row into the slot predicted for its sort key.
    ///
    /// A directory that grows deeper than `depth_limit` is promoted into a
    /// nested table built from its rows. A row its directory cannot place
    /// within `depth_limit + 1` goes into the nested table instead.
    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.schema.check_row(&row)?;
        let (index, _) = self.predicted_slot(self.key.extract(&row))?;

        let (outcome, needs_promotion) = match &mut self.slots[index] {
            Slot::Nested(table) => return table.insert(row),
            Slot::Directory(dir) => {
                let outcome = dir.try_insert(row)?;
                (outcome, dir.global_depth() > self.config.depth_limit)
            }
        };
        if needs_promotion {
            self.promote(index)?;
        }

        match outcome {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::Rejected(row) => match &mut self.slots[index] {
                Slot::Nested(table) => table.insert(row),
                Slot::Directory(dir) => Err(StratumError::DirectoryExhausted {
                    depth: dir.global_depth(),
                }),
            },
        }
    }

    /// Replaces the directory in slot `index` with a nested table over its rows.
    fn promote(&mut self, index: usize) -> Result<()> {
        let Slot::Directory(dir) = &self.slots[index] else {
            return Ok(());
        };
        if self.nesting_level >= self.config.max_nesting_depth {
            debug!(
                slot = index,
                level = self.nesting_level,
                global_depth = dir.global_depth(),
                "promotion skipped at maximum nesting depth"
            );
            return Ok(());
        }

        let global_depth = dir.global_depth();
        let key = self.key;
        let mut rows: Vec<Row> = dir.items().cloned().collect();
        rows.sort_by(|a, b| key.extract(a).cmp(key.extract(b)));
        let row_count = rows.len();

        let nested = Self::build(
            rows,
            Arc::clone(&self.schema),
            self.sort_key.clone(),
            key,
            self.config.clone(),
            self.nesting_level + 1,
        )?;
        debug!(
            slot = index,
            level = self.nesting_level + 1,
            rows = row_count,
            global_depth,
            "slot promoted to nested table"
        );
        self.slots[index] = Slot::Nested(Box::new(nested));
        Ok(())
    }

    /// Every row, in slot order.
    pub fn scan(&self) -> Vec<&Row> {
        let mut rows = Vec::with_capacity(self.len());
        self.collect_rows(&mut rows);
        rows
    }

    fn collect_rows<'a>(&'a self, out: &mut Vec<&'a Row>) {
        for slot in &self.slots {
            match slot {
                Slot::Directory(dir) => out.extend(dir.items()),
                Slot::Nested(table) => table.collect_rows(out),
            }
        }
    }

    /// Structural summary of this table and its nested tables.
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            slots: self.slots.len(),
            ..Default::default()
        };
        for slot in &self.slots {
            match slot {
                Slot::Directory(dir) => {
                    stats.directory_slots += 1;
                    stats.rows += dir.len();
                    stats.max_global_depth = stats.max_global_depth.max(dir.global_depth());
                }
                Slot::Nested(table) => {
                    let nested = table.stats();
                    stats.nested_slots += nested.nested_slots + 1;
                    stats.directory_slots += nested.directory_slots;
                    stats.rows += nested.rows;
                    stats.nesting_depth = stats.nesting_depth.max(nested.nesting_depth + 1);
                    stats.max_global_depth = stats.max_global_depth.max(nested.max_global_depth);
                }
            }
        }
        stats
    }

    /// Fraction of `keys` that `select` finds. An empty key set scores 1.0.
    pub fn hit_rate<'a, I>(&self, keys: I) -> Result<f64>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut total = 0usize;
        let mut found = 0usize;
        for key in keys {
            total += 1;
            if self.select(key)?.is_some() {
                found += 1;
            }
        }
        if total == 0 {
            return Ok(1.0);
        }
        Ok(found as f64 / total as f64)
    }
}
