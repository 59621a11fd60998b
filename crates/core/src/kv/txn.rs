//! Row-level locking for the in-process KV store (spec.md §5: "writes
//! serialize through the KV transaction holding a row lock").
//!
//! This is a critical section, not an MVCC engine (see DESIGN.md). A
//! [`Txn`] holds one lock per distinct row key the caller named, acquired in
//! sorted order so two transactions that touch overlapping row sets can
//! never deadlock against each other.

use dashmap::DashMap;
use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;

#[derive(Default)]
pub struct RowLocks {
    registry: DashMap<String, Arc<Mutex<()>>>,
}

/// A held set of row locks. Dropping it releases every lock — `commit` and
/// `rollback` are both just `drop`; the caller is responsible for only
/// writing to the KV tables once it is certain the write should happen,
/// since there is no write-ahead log to undo against.
pub struct Txn {
    _guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire locks for every key in `keys`, deduplicated and sorted so
    /// lock order is identical regardless of caller-supplied order.
    pub fn begin<I, K>(&self, keys: I) -> Txn
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort_unstable();
        keys.dedup();

        let guards = keys
            .into_iter()
            .map(|key| {
                let mutex = self
                    .registry
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone();
                Mutex::lock_arc(&mutex)
            })
            .collect();

        Txn { _guards: guards }
    }
}

impl Txn {
    pub fn commit(self) {}

    pub fn rollback(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn concurrent_transactions_on_the_same_key_serialize() {
        let locks = Arc::new(RowLocks::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                let txn = locks.begin(["row-a".to_string()]);
                let before = counter.load(Ordering::SeqCst);
                counter.store(before + 1, Ordering::SeqCst);
                txn.commit();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn lock_order_is_independent_of_caller_order() {
        let locks = RowLocks::new();
        let txn1 = locks.begin(["b".to_string(), "a".to_string()]);
        txn1.commit();
        let txn2 = locks.begin(["a".to_string(), "b".to_string()]);
        txn2.commit();
    }
}
