#![doc = include_str!("../../README.md")]
#![deny(missing_docs)]
#![cfg_attr(all(doc, ENABLE_DOC_AUTO_CFG), feature(doc_auto_cfg))]

mod linked_hashmap;
mod unsync;

use std::hash::Hash;

pub use linked_hashmap::{
    IntoIter,
    Iter,
};
use parking_lot::Mutex;
use tracing::{
    debug,
    trace,
};
pub use unsync::LruCore;

#[cfg(not(feature = "ahash"))]
type RandomState = std::hash::RandomState;
#[cfg(feature = "ahash")]
type RandomState = ahash::RandomState;

/// Function invoked with the key and value of every entry that leaves an
/// [`Lru`] through eviction, [`remove()`](Lru::remove),
/// [`remove_oldest()`](Lru::remove_oldest) or [`clear()`](Lru::clear).
///
/// The cache gives up ownership of both; nothing the callback receives still
/// lives in the cache.
pub type EvictionCallback<Key, Value> = Box<dyn FnMut(Key, Value) + Send>;

struct Shared<Key, Value> {
    core: LruCore<Key, Value>,
    on_evicted: Option<EvictionCallback<Key, Value>>,
}

impl<Key, Value> Shared<Key, Value> {
    fn evicted(&mut self, key: Key, value: Value) {
        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(key, value);
        }
    }
}

/// A thread-safe, fixed-capacity least-recently-used cache.
///
/// Entries are kept in recency order. [`add()`](Self::add) and a successful
/// [`get()`](Self::get) move an entry to the front; once the number of
/// entries would exceed the capacity, `add` evicts the entry at the back. A
/// capacity of `0` makes the cache unbounded, leaving eviction to the caller
/// through [`remove_oldest()`](Self::remove_oldest).
///
/// # Concurrency
///
/// Every method acquires one mutex for its whole duration. The index lookup,
/// the recency update, any capacity eviction and the eviction callback all
/// happen inside that single critical section, so no thread can observe the
/// list and the index disagreeing, or observe an evicted key re-added before
/// its callback has run. `get` reorders entries and therefore needs exclusive
/// access like every other operation.
///
/// # Eviction callback
///
/// The optional callback set with [`set_on_evicted()`](Self::set_on_evicted)
/// runs synchronously, on the calling thread, **while the cache lock is
/// held**. It must not call any method on the same cache: the lock is not
/// re-entrant and doing so deadlocks. Overwriting a value through `add` is not
/// an eviction and does not invoke the callback.
///
/// A panicking callback leaves the cache consistent; the structural change is
/// complete before the callback is called.
///
/// # Examples
///
/// ```rust
/// use std::sync::{
///     Arc,
///     Mutex,
/// };
///
/// use synclru::Lru;
///
/// let evicted = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&evicted);
///
/// let cache: Lru<&str, i32> = Lru::new(2);
/// cache.set_on_evicted(move |key, value| sink.lock().unwrap().push((key, value)));
///
/// cache.add("a", 1);
/// cache.add("b", 2);
/// cache.get(&"a");
/// cache.add("c", 3);
///
/// assert_eq!(*evicted.lock().unwrap(), vec![("b", 2)]);
/// assert_eq!(cache.get(&"a"), Some(1));
/// assert_eq!(cache.get(&"b"), None);
/// ```
pub struct Lru<Key, Value> {
    shared: Mutex<Shared<Key, Value>>,
}

impl<Key, Value> std::fmt::Debug for Lru<Key, Value> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shared.try_lock() {
            Some(shared) => f
                .debug_struct("Lru")
                .field("len", &shared.core.len())
                .field("capacity", &shared.core.capacity())
                .field("on_evicted", &shared.on_evicted.is_some())
                .finish(),
            None => f
                .debug_struct("Lru")
                .field("shared", &format_args!("<locked>"))
                .finish_non_exhaustive(),
        }
    }
}

impl<Key, Value> Default for Lru<Key, Value> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<Key, Value> From<LruCore<Key, Value>> for Lru<Key, Value> {
    fn from(core: LruCore<Key, Value>) -> Self {
        Self {
            shared: Mutex::new(Shared {
                core,
                on_evicted: None,
            }),
        }
    }
}

impl<Key, Value> Lru<Key, Value> {
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// A capacity of `0` means the cache has no limit and the caller is
    /// responsible for eviction.
    ///
    /// ```rust
    /// use synclru::Lru;
    ///
    /// let cache: Lru<u32, String> = Lru::new(100);
    /// assert_eq!(cache.capacity(), 100);
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Self {
        LruCore::new(capacity).into()
    }

    /// Creates an empty cache with no capacity limit.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Attaches an eviction callback, replacing any existing one.
    pub fn with_on_evicted(mut self, on_evicted: impl FnMut(Key, Value) + Send + 'static) -> Self {
        self.shared.get_mut().on_evicted = Some(Box::new(on_evicted));
        self
    }

    /// Sets the eviction callback, replacing any existing one. May be called
    /// at any time, including while other threads use the cache.
    pub fn set_on_evicted(&self, on_evicted: impl FnMut(Key, Value) + Send + 'static) {
        let previous = self
            .shared
            .lock()
            .on_evicted
            .replace(Box::new(on_evicted));
        trace!(replaced = previous.is_some(), "eviction callback set");
    }

    /// Removes the eviction callback, returning it if one was set.
    pub fn take_on_evicted(&self) -> Option<EvictionCallback<Key, Value>> {
        let previous = self.shared.lock().on_evicted.take();
        trace!(was_set = previous.is_some(), "eviction callback taken");
        previous
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.shared.lock().core.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().core.is_empty()
    }

    /// Returns the configured capacity, `0` meaning unbounded.
    pub fn capacity(&self) -> usize {
        self.shared.lock().core.capacity()
    }

    /// Evicts the least recently used entry, invoking the eviction callback.
    /// Returns false, doing nothing, if the cache is empty.
    pub fn remove_oldest(&self) -> bool {
        let mut shared = self.shared.lock();
        match shared.core.pop_oldest() {
            Some((key, value)) => {
                trace!(len = shared.core.len(), "removed least recently used entry");
                shared.evicted(key, value);
                true
            }
            None => false,
        }
    }

    /// Removes every entry, invoking the eviction callback once per entry from
    /// the most to the least recently used.
    ///
    /// The cache is already empty and reusable when the first callback runs.
    pub fn clear(&self) {
        let mut shared = self.shared.lock();
        let Shared { core, on_evicted } = &mut *shared;
        let drained = core.drain();
        debug!(evicted = drained.len(), "cleared cache");

        if let Some(on_evicted) = on_evicted.as_mut() {
            for (key, value) in drained {
                on_evicted(key, value);
            }
        }
    }

    /// Returns a clone of the least recently used entry without touching it.
    pub fn oldest(&self) -> Option<(Key, Value)>
    where
        Key: Clone,
        Value: Clone,
    {
        self.shared
            .lock()
            .core
            .oldest()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    /// Returns the cached keys from the most to the least recently used, as
    /// one consistent snapshot.
    pub fn keys(&self) -> Vec<Key>
    where
        Key: Clone,
    {
        self.shared
            .lock()
            .core
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Unwraps the cache into its single-threaded core, dropping the eviction
    /// callback.
    pub fn into_inner(self) -> LruCore<Key, Value> {
        self.shared.into_inner().core
    }

    #[cfg(all(debug_assertions, feature = "internal-debugging"))]
    #[doc(hidden)]
    pub fn debug_validate(&self) {
        self.shared.lock().core.debug_validate();
    }
}

impl<Key: Hash + Eq, Value> Lru<Key, Value> {
    /// Inserts `value` under `key` and marks it as the most recently used.
    ///
    /// If `key` is already cached its value is overwritten in place; that is
    /// not an eviction and the callback is not invoked. Otherwise a new entry
    /// is created, and if the cache is bounded and already full the least
    /// recently used entry is evicted through the callback.
    pub fn add(&self, key: Key, value: Value) {
        let mut shared = self.shared.lock();
        if let Some((key, value)) = shared.core.insert(key, value) {
            trace!(
                capacity = shared.core.capacity(),
                "evicted least recently used entry"
            );
            shared.evicted(key, value);
        }
    }

    /// Returns a clone of the value for `key`, marking it as the most recently
    /// used. Returns `None` on a miss. Never evicts.
    pub fn get(&self, key: &Key) -> Option<Value>
    where
        Value: Clone,
    {
        self.shared.lock().core.get(key).cloned()
    }

    /// Returns a clone of the value for `key` without touching its position.
    pub fn peek(&self, key: &Key) -> Option<Value>
    where
        Value: Clone,
    {
        self.shared.lock().core.peek(key).cloned()
    }

    /// Returns true if `key` is cached. Does not touch its position.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.shared.lock().core.contains_key(key)
    }

    /// Returns the value for `key`, or atomically inserts the result of
    /// `or_insert` as a new entry. Either way the entry becomes the most
    /// recently used, and a full cache evicts exactly as [`add()`](Self::add)
    /// would.
    ///
    /// `or_insert` runs with the lock held and, like the eviction callback,
    /// must not call back into this cache.
    pub fn get_or_add_with(&self, key: Key, or_insert: impl FnOnce(&Key) -> Value) -> Value
    where
        Value: Clone,
    {
        let mut shared = self.shared.lock();
        let Shared { core, on_evicted } = &mut *shared;
        let (value, evicted) = core.get_or_insert_with(key, or_insert);
        let value = value.clone();

        if let Some((key, evicted)) = evicted {
            trace!(
                capacity = core.capacity(),
                "evicted least recently used entry"
            );
            if let Some(on_evicted) = on_evicted.as_mut() {
                on_evicted(key, evicted);
            }
        }
        value
    }

    /// Removes `key`, invoking the eviction callback with the stored key and
    /// value. Returns false, doing nothing, if the key is absent.
    pub fn remove(&self, key: &Key) -> bool {
        let mut shared = self.shared.lock();
        match shared.core.remove(key) {
            Some((key, value)) => {
                shared.evicted(key, value);
                true
            }
            None => false,
        }
    }
}
