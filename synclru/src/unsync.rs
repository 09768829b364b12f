use std::hash::Hash;

use crate::linked_hashmap::{
    Entry,
    IntoIter,
    Iter,
    LinkedHashMap,
};

/// Upper bound on the entries reserved up front, so very large or effectively
/// unbounded capacities only allocate as the cache actually grows.
const MAX_PREALLOCATION: usize = 1 << 16;

/// A single-threaded least-recently-used cache.
///
/// `LruCore` is the policy that [`Lru`](crate::Lru) wraps in a mutex. Instead
/// of invoking an eviction callback, every operation that drops an entry hands
/// the evicted `(key, value)` pair back to the caller, so the caller decides
/// what happens to it.
///
/// A capacity of `0` means the cache is unbounded and never evicts on its own;
/// call [`pop_oldest()`](Self::pop_oldest) to trim it.
///
/// # Examples
///
/// ```rust
/// use synclru::LruCore;
///
/// let mut cache = LruCore::new(2);
/// assert_eq!(cache.insert("a", 1), None);
/// assert_eq!(cache.insert("b", 2), None);
///
/// // Touch "a" so "b" becomes the least recently used entry.
/// assert_eq!(cache.get(&"a"), Some(&1));
/// assert_eq!(cache.insert("c", 3), Some(("b", 2)));
///
/// assert_eq!(cache.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec!["c", "a"]);
/// ```
#[derive(Clone)]
pub struct LruCore<Key, Value> {
    map: LinkedHashMap<Key, Value>,
    capacity: usize,
}

impl<Key: std::fmt::Debug, Value: std::fmt::Debug> std::fmt::Debug for LruCore<Key, Value> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCore")
            .field("capacity", &self.capacity)
            .field("map", &self.map)
            .finish()
    }
}

impl<Key, Value> Default for LruCore<Key, Value> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<Key, Value> LruCore<Key, Value> {
    /// Creates an empty cache holding at most `capacity` entries. A capacity
    /// of `0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: LinkedHashMap::with_capacity(capacity.min(MAX_PREALLOCATION)),
            capacity,
        }
    }

    /// Creates an empty cache that never evicts on insertion.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Returns the configured capacity, `0` meaning unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the least recently used entry without touching it.
    pub fn oldest(&self) -> Option<(&Key, &Value)> {
        self.map.ptr_entry(self.map.tail_ptr())
    }

    /// Returns the most recently used entry without touching it.
    pub fn newest(&self) -> Option<(&Key, &Value)> {
        self.map.ptr_entry(self.map.head_ptr())
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_oldest(&mut self) -> Option<(Key, Value)> {
        self.map.pop_back()
    }

    /// Iterates from the most to the least recently used entry. Iteration does
    /// not affect the order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&Key, &Value)> {
        self.map.iter()
    }

    /// Empties the cache, returning every entry from the most to the least
    /// recently used.
    ///
    /// The cache is reset to the state [`new()`](Self::new) produces with the
    /// same capacity before the iterator yields anything, so dropping the
    /// iterator early still leaves an empty cache.
    pub fn drain(&mut self) -> IntoIter<Key, Value> {
        let fresh = LinkedHashMap::with_capacity(self.capacity.min(MAX_PREALLOCATION));
        std::mem::replace(&mut self.map, fresh).into_iter()
    }

    /// Removes all entries, dropping them.
    pub fn clear(&mut self) {
        self.drain();
    }

    #[cfg(all(debug_assertions, feature = "internal-debugging"))]
    #[doc(hidden)]
    pub fn debug_validate(&self) {
        self.map.debug_validate();
        if self.capacity != 0 {
            assert!(
                self.len() <= self.capacity,
                "Cache holds {} entries over capacity {}",
                self.len(),
                self.capacity
            );
        }
    }

    fn is_full(&self) -> bool {
        self.capacity != 0 && self.map.len() >= self.capacity
    }
}

impl<Key: Hash + Eq, Value> LruCore<Key, Value> {
    /// Inserts or overwrites `key`, marking it as the most recently used.
    ///
    /// Overwriting an existing key replaces its value in place and evicts
    /// nothing. Inserting a new key into a full cache first removes the least
    /// recently used entry, which is returned.
    pub fn insert(&mut self, key: Key, value: Value) -> Option<(Key, Value)> {
        self.insert_mut(key, value).1
    }

    /// Like [`insert()`](Self::insert), also returning a mutable reference to
    /// the stored value.
    pub fn insert_mut(&mut self, key: Key, value: Value) -> (&mut Value, Option<(Key, Value)>) {
        let full = self.is_full();
        match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert_no_move(value);
                occupied.move_to_front();
                (occupied.into_mut(), None)
            }
            Entry::Vacant(mut vacant) => {
                let evicted = if full { vacant.pop_back() } else { None };
                let (_, value) = vacant.insert_front(value);
                (value, evicted)
            }
        }
    }

    /// Returns the value for `key`, inserting the result of `or_insert` if the
    /// key is absent. Either way the entry becomes the most recently used.
    ///
    /// Returns the evicted entry if making room for a new key required one.
    pub fn get_or_insert_with(
        &mut self,
        key: Key,
        or_insert: impl FnOnce(&Key) -> Value,
    ) -> (&mut Value, Option<(Key, Value)>) {
        let full = self.is_full();
        match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.move_to_front();
                (occupied.into_mut(), None)
            }
            Entry::Vacant(mut vacant) => {
                let value = or_insert(vacant.key());
                let evicted = if full { vacant.pop_back() } else { None };
                let (_, value) = vacant.insert_front(value);
                (value, evicted)
            }
        }
    }

    /// Returns the value for `key` and marks it as the most recently used.
    pub fn get(&mut self, key: &Key) -> Option<&Value> {
        self.get_mut(key).map(|v| &*v)
    }

    /// Mutable version of [`get()`](Self::get).
    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Value> {
        let ptr = self.map.get_ptr(key)?;
        self.map.move_to_front(ptr);
        self.map.ptr_get_mut(ptr)
    }

    /// Returns the value for `key` without touching its position.
    pub fn peek(&self, key: &Key) -> Option<&Value> {
        self.map.ptr_get(self.map.get_ptr(key)?)
    }

    /// Returns true if `key` is cached. Does not touch its position.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    /// Removes `key`, returning the stored key and value if it was present.
    pub fn remove(&mut self, key: &Key) -> Option<(Key, Value)> {
        self.map.remove(key)
    }
}

impl<Key, Value> IntoIterator for LruCore<Key, Value> {
    type IntoIter = IntoIter<Key, Value>;
    type Item = (Key, Value);

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

impl<'a, Key, Value> IntoIterator for &'a LruCore<Key, Value> {
    type IntoIter = Iter<'a, Key, Value>;
    type Item = (&'a Key, &'a Value);

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

impl<Key: Hash + Eq, Value> Extend<(Key, Value)> for LruCore<Key, Value> {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use super::*;

    fn order<K: Copy, V>(cache: &LruCore<K, V>) -> Vec<K> {
        cache.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_trivial() {
        let mut lru = LruCore::new(3);
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.insert("c", 3);

        assert_eq!(lru.get(&"a"), Some(&1));
        assert_eq!(lru.get(&"b"), Some(&2));
        assert_eq!(lru.get(&"c"), Some(&3));

        lru.get(&"a");
        assert_eq!(lru.insert("d", 4), Some(("b", 2)));

        assert_eq!(lru.get(&"a"), Some(&1));
        assert_eq!(lru.get(&"b"), None);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_eviction_order() {
        let mut lru = LruCore::new(3);
        for i in 1..=3 {
            lru.insert(i, i * 10);
        }

        assert_eq!(lru.insert(4, 40), Some((1, 10)));
        assert_eq!(lru.insert(5, 50), Some((2, 20)));
        assert_eq!(order(&lru), vec![5, 4, 3]);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_update_existing_key_does_not_evict() {
        let mut lru = LruCore::new(2);
        lru.insert(1, "one");
        lru.insert(2, "two");

        assert_eq!(lru.insert(1, "ONE"), None);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.peek(&1), Some(&"ONE"));
        assert_eq!(order(&lru), vec![1, 2]);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_single_capacity() {
        let mut lru = LruCore::new(1);
        assert_eq!(lru.insert(1, 1), None);
        assert_eq!(lru.insert(2, 2), Some((1, 1)));
        assert_eq!(lru.insert(2, 20), None);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.oldest(), Some((&2, &20)));
        assert_eq!(lru.newest(), Some((&2, &20)));
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_unbounded_never_evicts() {
        let mut lru = LruCore::unbounded();
        for i in 0..1000 {
            assert_eq!(lru.insert(i, i), None);
        }
        assert_eq!(lru.len(), 1000);
        assert_eq!(lru.capacity(), 0);

        assert_eq!(lru.pop_oldest(), Some((0, 0)));
        assert_eq!(lru.len(), 999);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_get_mut_touches() {
        let mut lru = LruCore::new(3);
        lru.insert(1, String::from("one"));
        lru.insert(2, String::from("two"));

        lru.get_mut(&1).unwrap().push_str("_modified");
        assert_eq!(order(&lru), vec![1, 2]);
        assert_eq!(lru.peek(&1), Some(&String::from("one_modified")));
        assert_eq!(lru.get_mut(&3), None);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_peek_and_contains_no_side_effects() {
        let mut lru = LruCore::new(3);
        lru.insert(1, 1);
        lru.insert(2, 2);
        lru.insert(3, 3);

        assert_eq!(lru.peek(&1), Some(&1));
        assert!(lru.contains_key(&1));
        assert!(!lru.contains_key(&4));
        assert_eq!(lru.oldest(), Some((&1, &1)));
        assert_eq!(order(&lru), vec![3, 2, 1]);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_remove() {
        let mut lru = LruCore::new(3);
        lru.insert(1, "one");
        lru.insert(2, "two");

        assert_eq!(lru.remove(&1), Some((1, "one")));
        assert_eq!(lru.remove(&1), None);
        assert_eq!(lru.len(), 1);
        assert_eq!(order(&lru), vec![2]);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_pop_oldest() {
        let mut lru = LruCore::new(3);
        assert_eq!(lru.pop_oldest(), None);

        lru.insert(1, 1);
        lru.insert(2, 2);
        lru.insert(3, 3);
        lru.get(&1);

        assert_eq!(lru.pop_oldest(), Some((2, 2)));
        assert_eq!(lru.pop_oldest(), Some((3, 3)));
        assert_eq!(lru.pop_oldest(), Some((1, 1)));
        assert!(lru.is_empty());
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_get_or_insert_with() {
        let mut lru = LruCore::new(2);
        lru.insert(1, 10);
        lru.insert(2, 20);

        let (value, evicted) = lru.get_or_insert_with(1, |_| unreachable!("key 1 is cached"));
        assert_eq!(*value, 10);
        assert_eq!(evicted, None);
        assert_eq!(order(&lru), vec![1, 2]);

        let (value, evicted) = lru.get_or_insert_with(3, |k| k * 10);
        *value += 1;
        assert_eq!(evicted, Some((2, 20)));
        assert_eq!(lru.peek(&3), Some(&31));
        assert_eq!(order(&lru), vec![3, 1]);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_insert_mut() {
        let mut lru = LruCore::new(2);
        let (value, evicted) = lru.insert_mut(1, vec![1]);
        value.push(2);
        assert_eq!(evicted, None);
        assert_eq!(lru.peek(&1), Some(&vec![1, 2]));
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_drain_resets() {
        let mut lru = LruCore::new(3);
        lru.insert(1, 1);
        lru.insert(2, 2);
        lru.insert(3, 3);
        lru.get(&2);

        let drained = lru.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained.collect::<Vec<_>>(), vec![(2, 2), (3, 3), (1, 1)]);
        assert!(lru.is_empty());
        assert_eq!(lru.capacity(), 3);

        lru.insert(4, 4);
        lru.insert(5, 5);
        lru.insert(6, 6);
        assert_eq!(lru.insert(7, 7), Some((4, 4)));
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_drain_dropped_early_still_empties() {
        let mut lru = LruCore::new(3);
        lru.insert(1, 1);
        lru.insert(2, 2);

        let mut drained = lru.drain();
        assert_eq!(drained.next(), Some((2, 2)));
        drop(drained);

        assert!(lru.is_empty());
        assert_eq!(lru.get(&1), None);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_clear() {
        let mut lru = LruCore::new(3);
        lru.insert(1, 1);
        lru.insert(2, 2);
        lru.clear();
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.oldest(), None);
        assert_eq!(lru.newest(), None);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_extend_and_into_iter() {
        let mut lru = LruCore::new(3);
        lru.extend((0..5).map(|i| (i, i * 2)));
        assert_eq!(lru.len(), 3);

        let borrowed: Vec<_> = (&lru).into_iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(borrowed, vec![(4, 8), (3, 6), (2, 4)]);
        assert_eq!(lru.into_iter().collect::<Vec<_>>(), vec![(4, 8), (3, 6), (2, 4)]);
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_huge_capacity_allocates_lazily() {
        let mut lru = LruCore::new(usize::MAX);
        lru.insert(1, 1);
        lru.insert(2, 2);
        assert_eq!(lru.capacity(), usize::MAX);
        assert_eq!(lru.len(), 2);
        lru.clear();
        assert!(lru.is_empty());
    }

    #[test]
    #[timeout(1000)]
    fn test_lru_boundary_conditions() {
        let mut lru = LruCore::new(1000);
        for i in 0..1000 {
            lru.insert(i, i);
        }
        assert_eq!(lru.len(), 1000);

        assert_eq!(lru.insert(1000, 1000), Some((0, 0)));
        assert_eq!(lru.len(), 1000);
        assert!(!lru.contains_key(&0));
        assert!(lru.contains_key(&1000));
    }

    #[cfg(all(debug_assertions, feature = "internal-debugging"))]
    #[test]
    #[timeout(1000)]
    fn test_lru_debug_validate_through_churn() {
        let mut lru = LruCore::new(8);
        for i in 0..64u32 {
            lru.insert(i % 13, i);
            if i % 3 == 0 {
                lru.get(&(i % 7));
            }
            if i % 5 == 0 {
                lru.remove(&(i % 11));
            }
            lru.debug_validate();
        }
        lru.clear();
        lru.debug_validate();
    }
}
