//! Fixed-capacity hash buckets.

use crate::key::KeyExtractor;
use stratum_common::Value;

/// Result of appending an item to a bucket.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    /// The item was stored.
    Inserted,
    /// The bucket is full; the item is handed back unchanged.
    Rejected(T),
}

impl<T> InsertOutcome<T> {
    /// Returns true if the item was stored.
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// Append-only slot array holding up to `capacity` items.
///
/// Occupied slots always form a dense prefix of the slot array.
#[derive(Debug, Clone)]
pub struct Bucket<T> {
    /// Number of hash bits shared by every item in this bucket.
    local_depth: u32,
    /// Slot array, `capacity` entries long.
    slots: Box<[Option<T>]>,
    /// Number of occupied slots (also the first free slot).
    count: usize,
}

impl<T> Bucket<T> {
    /// Creates an empty bucket.
    pub fn new(capacity: usize, local_depth: u32) -> Self {
        Self {
            local_depth,
            slots: (0..capacity).map(|_| None).collect(),
            count: 0,
        }
    }

    #[inline]
    pub fn local_depth(&self) -> u32 {
        self.local_depth
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= self.slots.len()
    }

    /// Appends an item at the first free slot.
    pub fn insert(&mut self, item: T) -> InsertOutcome<T> {
        if self.is_full() {
            return InsertOutcome::Rejected(item);
        }
        self.slots[self.count] = Some(item);
        self.count += 1;
        InsertOutcome::Inserted
    }

    /// Returns the first item whose extracted key equals `key`.
    pub fn lookup<E: KeyExtractor<T>>(&self, key: &Value, extractor: &E) -> Option<&T> {
        self.iter().find(|item| extractor.extract(item) == key)
    }

    /// Iterates over occupied slots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots[..self.count].iter().flatten()
    }

    /// Raw slot array, including empty slots.
    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    /// Splits this bucket on hash bit `local_depth`.
    ///
    /// Increments the local depth, then moves every item whose hash has the new
    /// distinguishing bit set into a sibling bucket with the same capacity and
    /// depth. Remaining items are compacted to the front. Returns the sibling.
    pub fn split<E, H>(&mut self, hasher: H, extractor: &E) -> Bucket<T>
    where
        E: KeyExtractor<T>,
        H: Fn(&Value) -> u64,
    {
        self.local_depth += 1;
        let bit = 1u64 << (self.local_depth - 1);
        let mut sibling = Bucket::new(self.capacity(), self.local_depth);

        let mut kept = 0;
        for i in 0..self.count {
            let Some(item) = self.slots[i].take() else {
                break;
            };
            if hasher(extractor.extract(&item)) & bit != 0 {
                // Sibling has the same capacity, so this never rejects.
                let _ = sibling.insert(item);
            } else {
                self.slots[kept] = Some(item);
                kept += 1;
            }
        }
        self.count = kept;
        sibling
    }

    /// Consumes the bucket and returns its items in slot order.
    pub fn into_items(self) -> Vec<T> {
        self.slots.into_vec().into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_value;
    use crate::key::Identity;

    fn is_dense<T>(bucket: &Bucket<T>) -> bool {
        let mut seen_empty = false;
        for slot in bucket.slots() {
            match slot {
                None => seen_empty = true,
                Some(_) if seen_empty => return false,
                Some(_) => {}
            }
        }
        true
    }

    #[test]
    fn test_insert_until_full() {
        let mut bucket = Bucket::new(2, 0);
        assert!(bucket.is_empty());
        assert!(bucket.insert(Value::Int(1)).is_inserted());
        assert!(bucket.insert(Value::Int(2)).is_inserted());
        assert!(bucket.is_full());

        match bucket.insert(Value::Int(3)) {
            InsertOutcome::Rejected(v) => assert_eq!(v, Value::Int(3)),
            InsertOutcome::Inserted => panic!("full bucket accepted an item"),
        }
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn test_lookup() {
        let mut bucket = Bucket::new(4, 0);
        let _ = bucket.insert(Value::from("a"));
        let _ = bucket.insert(Value::from("b"));

        assert_eq!(
            bucket.lookup(&Value::from("b"), &Identity),
            Some(&Value::from("b"))
        );
        assert_eq!(bucket.lookup(&Value::from("z"), &Identity), None);
    }

    #[test]
    fn test_split_routes_on_new_bit() {
        let mut bucket = Bucket::new(8, 0);
        for i in 0..8 {
            let _ = bucket.insert(Value::Int(i));
        }

        let sibling = bucket.split(hash_value, &Identity);

        assert_eq!(bucket.local_depth(), 1);
        assert_eq!(sibling.local_depth(), 1);
        assert_eq!(sibling.capacity(), 8);
        assert_eq!(bucket.len() + sibling.len(), 8);
        for item in bucket.iter() {
            assert_eq!(hash_value(item) & 1, 0);
        }
        for item in sibling.iter() {
            assert_eq!(hash_value(item) & 1, 1);
        }
        assert!(is_dense(&bucket));
        assert!(is_dense(&sibling));
    }

    #[test]
    fn test_split_with_constant_hash() {
        let mut bucket = Bucket::new(3, 2);
        for i in 0..3 {
            let _ = bucket.insert(Value::Int(i));
        }

        // Bit 2 is clear for every item: nothing moves.
        let sibling = bucket.split(|_: &Value| 0b011, &Identity);
        assert_eq!(bucket.local_depth(), 3);
        assert_eq!(bucket.len(), 3);
        assert!(sibling.is_empty());

        // Bit 3 is set for every item: everything moves.
        let sibling = bucket.split(|_: &Value| 0b1000, &Identity);
        assert!(bucket.is_empty());
        assert_eq!(sibling.len(), 3);
        assert!(is_dense(&bucket));
    }

    #[test]
    fn test_into_items() {
        let mut bucket = Bucket::new(3, 0);
        let _ = bucket.insert(Value::Int(7));
        let _ = bucket.insert(Value::Int(8));
        assert_eq!(bucket.into_items(), vec![Value::Int(7), Value::Int(8)]);
    }
}
