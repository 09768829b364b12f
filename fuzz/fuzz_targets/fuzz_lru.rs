#![no_main]
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
};

use fuzz_lib::CacheOperation;
use libfuzzer_sys::fuzz_target;
use synclru::Lru;

type Log = Arc<Mutex<Vec<(u8, u8)>>>;

/// Recency order, most recently used first.
type Model = VecDeque<(u8, u8)>;

fn recorder(log: &Log) -> impl FnMut(u8, u8) + Send + 'static {
    let log = Arc::clone(log);
    move |key, value| log.lock().unwrap().push((key, value))
}

fn position(model: &Model, key: u8) -> Option<usize> {
    model.iter().position(|(k, _)| *k == key)
}

fn touch(model: &mut Model, key: u8) -> Option<u8> {
    let index = position(model, key)?;
    let entry = model.remove(index)?;
    model.push_front(entry);
    Some(entry.1)
}

/// Inserts a key known to be absent, returning the entry evicted for it.
fn insert_new(model: &mut Model, capacity: usize, key: u8, value: u8) -> Option<(u8, u8)> {
    let evicted = if capacity != 0 && model.len() >= capacity {
        model.pop_back()
    } else {
        None
    };
    model.push_front((key, value));
    evicted
}

fuzz_target!(|data: (u8, Vec<CacheOperation>)| {
    let (capacity, operations) = data;
    let capacity = usize::from(capacity % 8);

    let log: Log = Arc::default();
    let cache = Lru::new(capacity).with_on_evicted(recorder(&log));
    let mut callback_set = true;
    let mut model = Model::new();
    let mut expected = Vec::new();

    for operation in operations {
        let mut evicted = Vec::new();

        match operation {
            CacheOperation::Add(k, v) => {
                match position(&model, k) {
                    Some(index) => {
                        model.remove(index);
                        model.push_front((k, v));
                    }
                    None => evicted.extend(insert_new(&mut model, capacity, k, v)),
                }
                cache.add(k, v);
            }
            CacheOperation::Get(k) => {
                assert_eq!(cache.get(&k), touch(&mut model, k), "get {k}: {cache:?}");
            }
            CacheOperation::Peek(k) => {
                let value = position(&model, k).map(|index| model[index].1);
                assert_eq!(cache.peek(&k), value, "peek {k}: {cache:?}");
            }
            CacheOperation::Remove(k) => {
                let removed = position(&model, k).and_then(|index| model.remove(index));
                assert_eq!(cache.remove(&k), removed.is_some(), "remove {k}: {cache:?}");
                evicted.extend(removed);
            }
            CacheOperation::RemoveOldest => {
                let removed = model.pop_back();
                assert_eq!(cache.remove_oldest(), removed.is_some());
                evicted.extend(removed);
            }
            CacheOperation::Clear => {
                evicted.extend(model.drain(..));
                cache.clear();
            }
            CacheOperation::GetOrAddWith(k, v) => {
                let value = match touch(&mut model, k) {
                    Some(value) => value,
                    None => {
                        evicted.extend(insert_new(&mut model, capacity, k, v));
                        v
                    }
                };
                assert_eq!(cache.get_or_add_with(k, |_| v), value);
            }
            CacheOperation::Keys => {
                let keys = model.iter().map(|(k, _)| *k).collect::<Vec<_>>();
                assert_eq!(cache.keys(), keys, "{cache:?}");
            }
            CacheOperation::ToggleCallback => {
                if callback_set {
                    assert!(cache.take_on_evicted().is_some());
                } else {
                    cache.set_on_evicted(recorder(&log));
                }
                callback_set = !callback_set;
            }
        }

        if callback_set {
            expected.extend(evicted);
        }

        assert_eq!(cache.len(), model.len(), "{cache:?}");
        assert!(capacity == 0 || cache.len() <= capacity, "{cache:?}");
        assert_eq!(*log.lock().unwrap(), expected);
        #[cfg(debug_assertions)]
        cache.debug_validate();
    }
});
