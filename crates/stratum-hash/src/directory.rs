//! Extensible hashing directory.
//!
//! The directory is an array of `2^global_depth` slots. Each slot either owns a
//! bucket or refers to another slot; following references from any slot
//! reaches a self-referencing slot that owns the bucket for that hash prefix.
//!
//! ```text
//! global_depth = 2
//!
//!  slot   reference   bucket
//!  0      0           [a, c]   local_depth 2
//!  1      1           [b, d]   local_depth 1
//!  2      2           [e]      local_depth 2
//!  3      1           -        (chases to slot 1)
//! ```
//!
//! Doubling the directory does not rewrite ownership. A new slot `old + k`
//! refers to its buddy `k`, so it resolves to whatever bucket `k` resolves to.
//! Splitting a bucket with id `b` and local depth `d` creates its sibling in
//! slot `b + 2^d`, which becomes self-referencing; every slot whose low `d + 1`
//! bits equal `b + 2^d` chases down to it.

use crate::bucket::{Bucket, InsertOutcome};
use crate::hash::{hash_value, slot_for_hash};
use crate::key::KeyExtractor;
use stratum_common::config::DEFAULT_MAX_GLOBAL_DEPTH;
use stratum_common::{Result, StratumError, Value};
use tracing::trace;

/// Extensible hash table keyed by an extracted `Value`.
#[derive(Debug, Clone)]
pub struct ExtensibleHash<T, E> {
    /// Number of low hash bits used to pick a slot.
    global_depth: u32,
    /// Bucket owned by each slot, `None` for slots that refer elsewhere.
    buckets: Vec<Option<Bucket<T>>>,
    /// Slot each slot refers to. Owning slots refer to themselves.
    references: Vec<usize>,
    /// Capacity of every bucket.
    bucket_capacity: usize,
    /// Growth past this depth is refused.
    max_global_depth: u32,
    /// Key extraction for stored items.
    extractor: E,
    /// Total number of stored items.
    len: usize,
}

impl<T, E: KeyExtractor<T>> ExtensibleHash<T, E> {
    /// Creates a directory with one empty bucket at depth 0.
    pub fn new(bucket_capacity: usize, extractor: E) -> Self {
        Self::with_max_depth(bucket_capacity, DEFAULT_MAX_GLOBAL_DEPTH, extractor)
    }

    /// Creates a directory that refuses to grow past `max_global_depth`.
    pub fn with_max_depth(bucket_capacity: usize, max_global_depth: u32, extractor: E) -> Self {
        Self {
            global_depth: 0,
            buckets: vec![Some(Bucket::new(bucket_capacity.max(1), 0))],
            references: vec![0],
            bucket_capacity: bucket_capacity.max(1),
            max_global_depth: max_global_depth.min(usize::BITS - 1),
            extractor,
            len: 0,
        }
    }

    #[inline]
    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    /// Number of stored items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of directory slots, always `2^global_depth`.
    #[inline]
    pub fn directory_size(&self) -> usize {
        self.references.len()
    }

    #[inline]
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    /// Depth past which the directory refuses to double.
    pub fn max_global_depth(&self) -> u32 {
        self.max_global_depth
    }

    /// Reference array, one entry per slot.
    pub fn references(&self) -> &[usize] {
        &self.references
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Slot a key hashes to at the current global depth.
    #[inline]
    pub fn directory_index(&self, key: &Value) -> usize {
        slot_for_hash(hash_value(key), self.global_depth)
    }

    /// Chases references from `index` to the slot that owns its bucket.
    ///
    /// Fails if the chase does not reach a fixed point within one pass over
    /// the directory, or if the fixed point holds no bucket.
    pub fn resolve(&self, index: usize) -> Result<usize> {
        let mut current = index;
        for _ in 0..=self.references.len() {
            let next = *self
                .references
                .get(current)
                .ok_or(StratumError::UnownedSlot { index: current })?;
            if next == current {
                return match self.buckets[current] {
                    Some(_) => Ok(current),
                    None => Err(StratumError::UnownedSlot { index: current }),
                };
            }
            current = next;
        }
        Err(StratumError::ReferenceCycle { index })
    }

    /// Returns the bucket owned by `id`, if that slot owns one.
    pub fn bucket(&self, id: usize) -> Option<&Bucket<T>> {
        self.buckets.get(id).and_then(Option::as_ref)
    }

    /// Iterates over owning slots and their buckets.
    pub fn buckets(&self) -> impl Iterator<Item = (usize, &Bucket<T>)> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(id, bucket)| bucket.as_ref().map(|b| (id, b)))
    }

    /// Number of distinct buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.iter().flatten().count()
    }

    /// Iterates over every stored item, bucket by bucket.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.buckets.iter().flatten().flat_map(Bucket::iter)
    }

    /// Consumes the directory and returns every stored item.
    pub fn into_items(self) -> Vec<T> {
        self.buckets
            .into_iter()
            .flatten()
            .flat_map(Bucket::into_items)
            .collect()
    }

    /// Finds the item stored under `key`.
    pub fn lookup(&self, key: &Value) -> Result<Option<&T>> {
        let owner = self.resolve(self.directory_index(key))?;
        Ok(self
            .bucket(owner)
            .and_then(|bucket| bucket.lookup(key, &self.extractor)))
    }

    /// Doubles the directory. New slot `old + k` refers to slot `k`.
    pub fn grow(&mut self) -> Result<()> {
        if self.global_depth >= self.max_global_depth {
            return Err(StratumError::DirectoryExhausted {
                depth: self.global_depth,
            });
        }
        let old_size = self.references.len();
        self.global_depth += 1;
        self.references.extend(0..old_size);
        self.buckets.resize_with(old_size * 2, || None);
        trace!(
            global_depth = self.global_depth,
            size = self.references.len(),
            "directory doubled"
        );
        Ok(())
    }

    /// Splits the bucket owned by slot `owner` into itself and a sibling.
    fn split_bucket(&mut self, owner: usize) -> Result<()> {
        let bucket = self.buckets[owner]
            .as_mut()
            .ok_or(StratumError::UnownedSlot { index: owner })?;
        let sibling_id = owner + (1usize << bucket.local_depth());
        if sibling_id >= self.references.len() {
            return Err(StratumError::Internal(format!(
                "split of slot {} would place sibling outside directory of size {}",
                owner,
                self.references.len()
            )));
        }

        let sibling = bucket.split(hash_value, &self.extractor);
        trace!(
            owner,
            sibling = sibling_id,
            local_depth = sibling.local_depth(),
            moved = sibling.len(),
            "bucket split"
        );
        self.references[sibling_id] = sibling_id;
        self.buckets[sibling_id] = Some(sibling);
        Ok(())
    }

    /// Inserts an item, failing with `DirectoryExhausted` if it cannot be
    /// placed without growing past `max_global_depth`.
    pub fn insert(&mut self, item: T) -> Result<()> {
        match self.try_insert(item)? {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::Rejected(_) => Err(StratumError::DirectoryExhausted {
                depth: self.global_depth,
            }),
        }
    }

    /// Inserts an item, splitting buckets and doubling the directory as needed.
    ///
    /// A full bucket whose local depth equals the global depth forces a
    /// doubling; otherwise it is split. Either way the insert is retried
    /// against the restructured directory until it lands. An item that would
    /// need a doubling past `max_global_depth` is handed back as `Rejected`.
    pub fn try_insert(&mut self, item: T) -> Result<InsertOutcome<T>> {
        let mut item = item;
        loop {
            let index = self.directory_index(self.extractor.extract(&item));
            let owner = self.resolve(index)?;
            let bucket = self.buckets[owner]
                .as_mut()
                .ok_or(StratumError::UnownedSlot { index: owner })?;

            match bucket.insert(item) {
                InsertOutcome::Inserted => {
                    self.len += 1;
                    return Ok(InsertOutcome::Inserted);
                }
                InsertOutcome::Rejected(rejected) => {
                    item = rejected;
                    if bucket.local_depth() == self.global_depth {
                        if self.global_depth >= self.max_global_depth {
                            return Ok(InsertOutcome::Rejected(item));
                        }
                        self.grow()?;
                    } else {
                        self.split_bucket(owner)?;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ColumnKey, Identity};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use stratum_common::{Row, row};

    /// Checks the structural invariants of a directory snapshot.
    fn check_invariants<E: KeyExtractor<Value>>(dir: &ExtensibleHash<Value, E>) {
        assert_eq!(dir.directory_size(), 1 << dir.global_depth());

        let mut owners = vec![0usize; dir.directory_size()];
        for (index, owner) in owners.iter_mut().enumerate() {
            *owner = dir.resolve(index).unwrap();
            // Idempotent.
            assert_eq!(dir.resolve(*owner).unwrap(), *owner);
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for (id, bucket) in dir.buckets() {
            assert!(bucket.local_depth() <= dir.global_depth());
            let expected = 1usize << (dir.global_depth() - bucket.local_depth());
            let resolving = owners.iter().filter(|&&o| o == id).count();
            assert_eq!(resolving, expected, "bucket {} share", id);

            let mut seen_empty = false;
            for slot in bucket.slots() {
                match slot {
                    None => seen_empty = true,
                    Some(_) => assert!(!seen_empty, "gap in bucket {}", id),
                }
            }

            for item in bucket.iter() {
                assert!(seen.insert(item.to_string()), "duplicate {}", item);
                assert_eq!(dir.resolve(dir.directory_index(item)).unwrap(), id);
                total += 1;
            }
        }
        assert_eq!(total, dir.len());
    }

    #[test]
    fn test_new_directory() {
        let dir: ExtensibleHash<Value, Identity> = ExtensibleHash::new(4, Identity);
        assert_eq!(dir.global_depth(), 0);
        assert_eq!(dir.directory_size(), 1);
        assert_eq!(dir.bucket_count(), 1);
        assert!(dir.is_empty());
        assert_eq!(dir.resolve(0).unwrap(), 0);
        assert_eq!(dir.lookup(&Value::Int(1)).unwrap(), None);
    }

    #[test]
    fn test_insert_sequential_keys_capacity_two() {
        let mut dir = ExtensibleHash::new(2, Identity);
        for i in 0..10 {
            dir.insert(Value::Int(i)).unwrap();
            check_invariants(&dir);
            for j in 0..=i {
                assert_eq!(dir.lookup(&Value::Int(j)).unwrap(), Some(&Value::Int(j)));
            }
        }
        assert_eq!(dir.len(), 10);
        assert!(dir.bucket_count() >= 5);
    }

    #[test]
    fn test_lookup_rows_by_name() {
        let names = ["a", "b", "c", "d", "e", "f", "g", "h", "j"];
        let mut dir = ExtensibleHash::new(2, ColumnKey::new(1));
        for (i, name) in names.iter().enumerate() {
            dir.insert(row![i as i64 + 1, *name]).unwrap();
        }

        let found: &Row = dir.lookup(&Value::from("e")).unwrap().unwrap();
        assert_eq!(found.get(0), Some(&Value::Int(5)));
        assert_eq!(dir.lookup(&Value::from("z")).unwrap(), None);
        assert_eq!(dir.len(), 9);
    }

    #[test]
    fn test_grow_keeps_resolution() {
        let mut dir = ExtensibleHash::new(1, Identity);
        let mut inserted: Vec<Value> = Vec::new();
        let mut doublings = 0;
        let mut depth = dir.global_depth();
        let mut next = 0i64;

        while doublings < 2 {
            let value = Value::Int(next);
            next += 1;
            dir.insert(value.clone()).unwrap();
            inserted.push(value);

            if dir.global_depth() != depth {
                doublings += dir.global_depth() - depth;
                depth = dir.global_depth();
                assert_eq!(dir.references().len(), 1 << depth);
            }
            for v in &inserted {
                let owner = dir.resolve(dir.directory_index(v)).unwrap();
                assert!(dir.bucket(owner).unwrap().iter().any(|item| item == v));
            }
        }
        check_invariants(&dir);
    }

    #[test]
    fn test_grow_points_new_half_at_buddy() {
        let mut dir: ExtensibleHash<Value, Identity> = ExtensibleHash::new(2, Identity);
        dir.grow().unwrap();
        assert_eq!(dir.references(), &[0, 0]);
        dir.grow().unwrap();
        assert_eq!(dir.references(), &[0, 0, 0, 1]);
        for i in 0..4 {
            assert_eq!(dir.resolve(i).unwrap(), 0);
        }
    }

    #[test]
    fn test_max_global_depth() {
        let mut dir: ExtensibleHash<Value, Identity> =
            ExtensibleHash::with_max_depth(1, 3, Identity);
        // Duplicate keys hash identically and can never be separated.
        dir.insert(Value::Int(1)).unwrap();
        let err = dir.insert(Value::Int(1)).unwrap_err();
        assert!(matches!(err, StratumError::DirectoryExhausted { depth: 3 }));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_try_insert_hands_back_item_at_max_depth() {
        let mut dir: ExtensibleHash<Value, Identity> =
            ExtensibleHash::with_max_depth(2, 2, Identity);
        assert_eq!(dir.max_global_depth(), 2);
        assert!(dir.try_insert(Value::Int(7)).unwrap().is_inserted());
        assert!(dir.try_insert(Value::Int(7)).unwrap().is_inserted());

        match dir.try_insert(Value::Int(7)).unwrap() {
            InsertOutcome::Rejected(item) => assert_eq!(item, Value::Int(7)),
            InsertOutcome::Inserted => panic!("third duplicate should not fit"),
        }
        assert_eq!(dir.global_depth(), 2);
        assert_eq!(dir.len(), 2);

        // Distinct keys still land once the directory is at its cap.
        let mut placed = 0;
        for k in 100..200 {
            if dir.try_insert(Value::Int(k)).unwrap().is_inserted() {
                placed += 1;
            }
        }
        assert!(placed > 0);
        assert_eq!(dir.len(), 2 + placed);
        assert!(dir.global_depth() <= 2);
    }

    #[test]
    fn test_reference_cycle_detected() {
        let mut dir: ExtensibleHash<Value, Identity> = ExtensibleHash::new(2, Identity);
        dir.grow().unwrap();
        dir.grow().unwrap();
        // Corrupt the reference array into a loop without a fixed point.
        dir.references[2] = 3;
        dir.references[3] = 2;
        assert!(matches!(
            dir.resolve(3),
            Err(StratumError::ReferenceCycle { index: 3 })
        ));
        assert_eq!(dir.resolve(1).unwrap(), 0);
    }

    #[test]
    fn test_random_inserts_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut dir = ExtensibleHash::new(3, Identity);
        let mut keys = HashSet::new();
        while keys.len() < 500 {
            let key = rng.gen_range(-1_000_000i64..1_000_000);
            if keys.insert(key) {
                dir.insert(Value::Int(key)).unwrap();
            }
        }
        check_invariants(&dir);
        for key in &keys {
            assert!(dir.lookup(&Value::Int(*key)).unwrap().is_some());
        }
        assert_eq!(dir.into_items().len(), 500);
    }

    #[test]
    fn test_items_iterates_everything() {
        let mut dir = ExtensibleHash::new(2, Identity);
        for i in 0..20 {
            dir.insert(Value::Int(i)).unwrap();
        }
        let mut items: Vec<i64> = dir.items().filter_map(Value::as_int).collect();
        items.sort();
        assert_eq!(items, (0..20).collect::<Vec<_>>());
    }
}
