use std::hash::{
    BuildHasher,
    Hash,
};

use hashbrown::HashTable;
use slab::Slab;

use crate::RandomState;

/// Handle to a node in the arena. `Ptr::null()` terminates the list at both
/// ends.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Ptr(usize);

impl std::fmt::Debug for Ptr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "Ptr(null)")
        } else {
            write!(f, "Ptr({})", self.0)
        }
    }
}

impl Default for Ptr {
    fn default() -> Self {
        Ptr::null()
    }
}

impl Ptr {
    pub(crate) fn null() -> Self {
        Ptr(usize::MAX)
    }

    pub(crate) fn is_null(&self) -> bool {
        *self == Ptr::null()
    }

    fn from_slot(slot: usize) -> Self {
        debug_assert_ne!(slot, usize::MAX, "Slot must not be usize::MAX");
        Ptr(slot)
    }

    pub(crate) fn get(self) -> Option<usize> {
        if self.is_null() { None } else { Some(self.0) }
    }
}

#[derive(Debug, Clone)]
struct LLNode<K, V> {
    key: K,
    value: V,
    hash: u64,
    prev: Ptr,
    next: Ptr,
}

/// The recency list and its index.
///
/// Nodes live in a slab arena and link to each other through `prev`/`next`
/// handles. `head` is the most recently used node, `tail` the least. The
/// hash table stores only handles, so every key is owned exactly once by its
/// node and a key is in the table if and only if its node is linked.
#[derive(Clone)]
pub(crate) struct LinkedHashMap<K, V> {
    head: Ptr,
    tail: Ptr,
    nodes: Slab<LLNode<K, V>>,
    table: HashTable<Ptr>,
    hasher: RandomState,
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for LinkedHashMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedHashMap")
            .field("len", &self.len())
            .field("head", &self.ptr_entry(self.head).map(|(k, _)| k))
            .field("tail", &self.ptr_entry(self.tail).map(|(k, _)| k))
            .field("entries", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<K, V> Default for LinkedHashMap<K, V> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<K, V> LinkedHashMap<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(capacity < usize::MAX - 1, "Capacity too large");
        LinkedHashMap {
            head: Ptr::null(),
            tail: Ptr::null(),
            nodes: Slab::with_capacity(capacity),
            table: HashTable::with_capacity(capacity),
            hasher: RandomState::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn head_ptr(&self) -> Ptr {
        self.head
    }

    pub(crate) fn tail_ptr(&self) -> Ptr {
        self.tail
    }

    pub(crate) fn ptr_get(&self, ptr: Ptr) -> Option<&V> {
        Some(&self.nodes.get(ptr.get()?)?.value)
    }

    pub(crate) fn ptr_get_mut(&mut self, ptr: Ptr) -> Option<&mut V> {
        Some(&mut self.nodes.get_mut(ptr.get()?)?.value)
    }

    pub(crate) fn ptr_entry(&self, ptr: Ptr) -> Option<(&K, &V)> {
        let node = self.nodes.get(ptr.get()?)?;
        Some((&node.key, &node.value))
    }

    /// Relinks `ptr` as the head of the list. Returns `None` if `ptr` is null.
    pub(crate) fn move_to_front(&mut self, ptr: Ptr) -> Option<()> {
        ptr.get()?;
        if self.head == ptr {
            return Some(());
        }

        self.unlink(ptr);
        self.link_front(ptr);
        Some(())
    }

    /// Unlinks and removes the tail node, returning its key and value.
    pub(crate) fn pop_back(&mut self) -> Option<(K, V)> {
        self.remove_ptr(self.tail)
    }

    pub(crate) fn remove_ptr(&mut self, ptr: Ptr) -> Option<(K, V)> {
        let slot = ptr.get()?;
        let hash = self.nodes.get(slot)?.hash;
        match self.table.find_entry(hash, |p| *p == ptr) {
            Ok(occupied) => {
                occupied.remove();
            }
            Err(_) => {
                #[cfg(debug_assertions)]
                unreachable!("Pointer not found in table: {ptr:?}");
                #[cfg(not(debug_assertions))]
                return None;
            }
        }

        self.unlink(ptr);
        let node = self.nodes.remove(slot);
        Some((node.key, node.value))
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            ptr: self.head,
            remaining: self.len(),
            map: self,
        }
    }

    fn unlink(&mut self, ptr: Ptr) {
        let node = &mut self.nodes[ptr.0];
        let prev = std::mem::take(&mut node.prev);
        let next = std::mem::take(&mut node.next);

        match prev.get() {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next.get() {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
    }

    fn link_front(&mut self, ptr: Ptr) {
        let old_head = self.head;
        let node = &mut self.nodes[ptr.0];
        node.prev = Ptr::null();
        node.next = old_head;

        match old_head.get() {
            Some(old_head) => self.nodes[old_head].prev = ptr,
            None => self.tail = ptr,
        }
        self.head = ptr;
    }

    #[cfg(all(debug_assertions, feature = "internal-debugging"))]
    pub(crate) fn debug_validate(&self) {
        assert_eq!(
            self.nodes.len(),
            self.table.len(),
            "Arena and index should have the same length"
        );

        if self.is_empty() {
            assert_eq!(self.head, Ptr::null(), "Head pointer should be null");
            assert_eq!(self.tail, Ptr::null(), "Tail pointer should be null");
            return;
        }

        assert_eq!(
            self.nodes[self.head.0].prev,
            Ptr::null(),
            "Head should have no previous link"
        );
        assert_eq!(
            self.nodes[self.tail.0].next,
            Ptr::null(),
            "Tail should have no next link"
        );

        let mut linked = 0;
        let mut prev = Ptr::null();
        let mut ptr = self.head;
        while let Some(slot) = ptr.get() {
            let node = &self.nodes[slot];
            assert_eq!(node.prev, prev, "Broken back link at {ptr:?}");
            assert!(
                self.table.find(node.hash, |p| *p == ptr).is_some(),
                "Linked node {ptr:?} is missing from the index"
            );
            linked += 1;
            assert!(linked <= self.len(), "Cycle detected in recency list");
            prev = ptr;
            ptr = node.next;
        }

        assert_eq!(prev, self.tail, "Walk should end at the tail");
        assert_eq!(linked, self.len(), "List and index lengths differ");
    }
}

impl<K: Hash + Eq, V> LinkedHashMap<K, V> {
    pub(crate) fn get_ptr(&self, key: &K) -> Option<Ptr> {
        let hash = self.hasher.hash_one(key);
        self.table
            .find(hash, |p| self.nodes[p.0].key == *key)
            .copied()
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.get_ptr(key).is_some()
    }

    pub(crate) fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hasher.hash_one(&key);
        let found = self
            .table
            .find(hash, |p| self.nodes[p.0].key == key)
            .copied();
        match found {
            Some(ptr) => Entry::Occupied(OccupiedEntry { ptr, map: self }),
            None => Entry::Vacant(VacantEntry {
                key,
                hash,
                map: self,
            }),
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hasher.hash_one(key);
        let ptr = match self
            .table
            .find_entry(hash, |p| self.nodes[p.0].key == *key)
        {
            Ok(occupied) => occupied.remove().0,
            Err(_) => return None,
        };

        self.unlink(ptr);
        let node = self.nodes.remove(ptr.0);
        Some((node.key, node.value))
    }
}

pub(crate) enum Entry<'a, K, V> {
    Occupied(OccupiedEntry<'a, K, V>),
    Vacant(VacantEntry<'a, K, V>),
}

pub(crate) struct OccupiedEntry<'a, K, V> {
    ptr: Ptr,
    map: &'a mut LinkedHashMap<K, V>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Replaces the value in place without touching the list order.
    pub(crate) fn insert_no_move(&mut self, value: V) -> V {
        std::mem::replace(&mut self.map.nodes[self.ptr.0].value, value)
    }

    pub(crate) fn move_to_front(&mut self) {
        self.map.move_to_front(self.ptr);
    }

    pub(crate) fn into_mut(self) -> &'a mut V {
        let map = self.map;
        &mut map.nodes[self.ptr.0].value
    }
}

pub(crate) struct VacantEntry<'a, K, V> {
    key: K,
    hash: u64,
    map: &'a mut LinkedHashMap<K, V>,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    /// Links a new node at the head of the list and indexes it.
    pub(crate) fn insert_front(self, value: V) -> (Ptr, &'a mut V) {
        let map = self.map;
        let ptr = Ptr::from_slot(map.nodes.insert(LLNode {
            key: self.key,
            value,
            hash: self.hash,
            prev: Ptr::null(),
            next: Ptr::null(),
        }));

        let nodes = &map.nodes;
        map.table
            .insert_unique(self.hash, ptr, |p| nodes[p.0].hash);
        map.link_front(ptr);

        (ptr, &mut map.nodes[ptr.0].value)
    }

    /// Evicts the tail node while keeping the slot vacant. The key is absent
    /// from the map, so it can never be the node removed.
    pub(crate) fn pop_back(&mut self) -> Option<(K, V)> {
        self.map.pop_back()
    }
}

/// Borrowing iterator from the most to the least recently used entry.
pub struct Iter<'a, K, V> {
    ptr: Ptr,
    remaining: usize,
    map: &'a LinkedHashMap<K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.map.nodes.get(self.ptr.get()?)?;
        self.ptr = node.next;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Owning iterator from the most to the least recently used entry.
pub struct IntoIter<K, V> {
    ptr: Ptr,
    nodes: Slab<LLNode<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.ptr.get()?;
        let node = self.nodes.remove(slot);
        self.ptr = node.next;
        Some((node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.nodes.len(), Some(self.nodes.len()))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> IntoIterator for LinkedHashMap<K, V> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            ptr: self.head,
            nodes: self.nodes,
        }
    }
}
