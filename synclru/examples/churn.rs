use std::{
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
    thread,
};

use synclru::Lru;
use tracing_subscriber::EnvFilter;

static EVICTED: AtomicUsize = AtomicUsize::new(0);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cache = Lru::<usize, usize>::new(30000).with_on_evicted(|_, _| {
        EVICTED.fetch_add(1, Ordering::Relaxed);
    });

    thread::scope(|s| {
        for t in 0..4 {
            let cache = &cache;
            s.spawn(move || {
                for round in 0..30 {
                    for i in 0..10000 {
                        cache.add(t * 10000 + i, round);
                    }
                    for i in (0..10000).step_by(3) {
                        std::hint::black_box(cache.get(std::hint::black_box(&(t * 10000 + i))));
                    }
                    for i in (0..10000).step_by(7) {
                        cache.remove(&(t * 10000 + i));
                    }
                }
            });
        }
    });

    println!(
        "len = {}, evicted = {}",
        cache.len(),
        EVICTED.load(Ordering::Relaxed)
    );
    cache.clear();
}
