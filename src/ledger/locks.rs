//! Per-transaction mutual exclusion.
//!
//! Two deliveries of the same transaction id must not interleave their
//! check-grant-mark sequence. Different ids never wait on each other.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

/// Set of transaction ids currently held.
#[derive(Debug, Default)]
pub struct TransactionLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Releases its transaction id on drop.
#[derive(Debug)]
pub struct TransactionLockGuard<'a> {
    locks: &'a TransactionLocks,
    transaction_id: String,
}

impl TransactionLocks {
    /// Create an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `transaction_id` is free, then hold it.
    pub fn acquire(&self, transaction_id: &str) -> TransactionLockGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        while held.contains(transaction_id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|p| p.into_inner());
        }
        held.insert(transaction_id.to_string());

        TransactionLockGuard {
            locks: self,
            transaction_id: transaction_id.to_string(),
        }
    }

    /// Whether `transaction_id` is currently held.
    pub fn is_held(&self, transaction_id: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(transaction_id)
    }
}

impl Drop for TransactionLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(|p| p.into_inner());
        held.remove(&self.transaction_id);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = TransactionLocks::new();
        {
            let _guard = locks.acquire("tx-1");
            assert!(locks.is_held("tx-1"));
        }
        assert!(!locks.is_held("tx-1"));
    }

    #[test]
    fn test_distinct_ids_do_not_block() {
        let locks = TransactionLocks::new();
        let _a = locks.acquire("tx-1");
        let _b = locks.acquire("tx-2");
        assert!(locks.is_held("tx-1") && locks.is_held("tx-2"));
    }

    #[test]
    fn test_same_id_is_exclusive() {
        let locks = Arc::new(TransactionLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.acquire("tx-1");
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
