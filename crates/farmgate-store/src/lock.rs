//! Row-granular lock table.
//!
//! A transaction claims **all** of its row locks up front or none of them:
//! the waiter re-checks the full key set under one mutex and only inserts
//! when every key is simultaneously free. No transaction ever waits while
//! holding a partial set, so lock-order deadlocks cannot form regardless of
//! how callers enumerate their keys.
//!
//! Claims are bounded by a deadline. A transaction that cannot assemble its
//! lock set in time fails with `FG_ERR_700` having written nothing, and the
//! caller may retry the whole operation.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use farmgate_types::{FarmgateError, ListingId, OrderId, Result};
use parking_lot::{Condvar, Mutex};

/// Address of a lockable row.
///
/// Orders and listings are the only directly-locked rows. Child rows
/// (payments, earnings, ledger entries, pickup jobs) are written under
/// their parent order's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum LockKey {
    Order(OrderId),
    Listing(ListingId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order(id) => write!(f, "order:{id}"),
            Self::Listing(id) => write!(f, "listing:{id}"),
        }
    }
}

/// Shared registry of currently-held row locks.
#[derive(Debug)]
pub struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Claim every key in `keys`, or none.
    ///
    /// Blocks until the full set is simultaneously free, then inserts all
    /// keys in one critical section. Duplicate keys are collapsed. Fails
    /// with [`FarmgateError::LockTimeout`] once `wait` has elapsed.
    pub fn acquire(
        self: &Arc<Self>,
        keys: Vec<LockKey>,
        wait: std::time::Duration,
    ) -> Result<LockSet> {
        let mut keys = keys;
        keys.sort_unstable();
        keys.dedup();

        let deadline = Instant::now() + wait;
        let mut held = self.held.lock();
        loop {
            if keys.iter().all(|k| !held.contains(k)) {
                for key in &keys {
                    held.insert(*key);
                }
                return Ok(LockSet {
                    table: Arc::clone(self),
                    keys,
                });
            }
            if self.released.wait_until(&mut held, deadline).timed_out() {
                let waited_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    keys = keys.len(),
                    waited_ms = waited_ms,
                    "Lock acquisition timed out"
                );
                return Err(FarmgateError::LockTimeout {
                    waited_ms,
                    keys: keys.len(),
                });
            }
        }
    }

    fn release(&self, keys: &[LockKey]) {
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }

    /// `true` if some transaction currently holds `key`.
    #[must_use]
    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held.lock().contains(key)
    }

    /// Number of rows currently locked across all transactions.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handle over one transaction's claimed row locks.
///
/// Locks are held from acquisition until the handle drops, which the owning
/// transaction arranges to happen only after commit or rollback (two-phase).
#[derive(Debug)]
pub struct LockSet {
    table: Arc<LockTable>,
    keys: Vec<LockKey>,
}

impl LockSet {
    #[must_use]
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }

    /// `true` if this set covers `key`.
    #[must_use]
    pub fn covers(&self, key: &LockKey) -> bool {
        self.keys.contains(key)
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        self.table.release(&self.keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn acquire_and_release() {
        let table = Arc::new(LockTable::new());
        let order = LockKey::Order(OrderId::new());
        let listing = LockKey::Listing(ListingId::new());

        let set = table
            .acquire(vec![order, listing], Duration::from_millis(100))
            .unwrap();
        assert!(table.is_held(&order));
        assert!(table.is_held(&listing));
        assert!(set.covers(&order));
        assert_eq!(table.held_count(), 2);

        drop(set);
        assert!(!table.is_held(&order));
        assert!(!table.is_held(&listing));
        assert_eq!(table.held_count(), 0);
    }

    #[test]
    fn duplicate_keys_collapse() {
        let table = Arc::new(LockTable::new());
        let order = LockKey::Order(OrderId::new());

        let set = table
            .acquire(vec![order, order], Duration::from_millis(100))
            .unwrap();
        assert_eq!(set.keys().len(), 1);
        drop(set);
        assert_eq!(table.held_count(), 0);
    }

    #[test]
    fn timeout_claims_nothing() {
        let table = Arc::new(LockTable::new());
        let contended = LockKey::Order(OrderId::new());
        let free = LockKey::Listing(ListingId::new());

        let holder = table
            .acquire(vec![contended], Duration::from_millis(100))
            .unwrap();

        // The second caller wants the contended key plus a free one; on
        // timeout the free key must not be left claimed.
        let err = table
            .acquire(vec![contended, free], Duration::from_millis(50))
            .unwrap_err();
        assert!(format!("{err}").contains("FG_ERR_700"));
        assert!(!table.is_held(&free));
        assert_eq!(table.held_count(), 1);

        drop(holder);
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let table = Arc::new(LockTable::new());
        let key = LockKey::Order(OrderId::new());

        let set = table.acquire(vec![key], Duration::from_millis(500)).unwrap();

        let waiter_table = Arc::clone(&table);
        let waiter = std::thread::spawn(move || {
            waiter_table
                .acquire(vec![key], Duration::from_millis(2_000))
                .map(|set| set.keys().len())
        });

        std::thread::sleep(Duration::from_millis(50));
        drop(set);

        assert_eq!(waiter.join().unwrap().unwrap(), 1);
        assert_eq!(table.held_count(), 0);
    }

    #[test]
    fn contended_key_serializes_critical_sections() {
        let table = Arc::new(LockTable::new());
        let key = LockKey::Listing(ListingId::new());
        let in_section = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            let in_section = Arc::clone(&in_section);
            handles.push(std::thread::spawn(move || {
                let _set = table.acquire(vec![key], Duration::from_secs(5)).unwrap();
                let was_busy = in_section.swap(true, std::sync::atomic::Ordering::SeqCst);
                assert!(!was_busy, "two threads inside the same row lock");
                std::thread::sleep(Duration::from_millis(5));
                in_section.store(false, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn lock_key_display() {
        let id = OrderId::new();
        assert_eq!(format!("{}", LockKey::Order(id)), format!("order:{id}"));
    }
}
