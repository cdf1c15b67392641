//! # farmgate-store
//!
//! **Storage Plane**: the transactional in-memory store every other plane
//! writes through.
//!
//! ## Architecture
//!
//! Three pieces compose a transaction:
//! 1. **LockTable**: row-granular locks with all-or-nothing acquisition
//!    (no hold-and-wait, so no deadlocks) and a bounded wait deadline
//! 2. **StoreTxn**: a unit of work — reads overlay staged writes over
//!    committed state, writes stage until commit, drop rolls back
//! 3. **Store**: the committed tables behind one `RwLock`, unique-index
//!    validation at commit, and the read-only query API
//!
//! ## Transaction Flow
//!
//! ```text
//! Store.begin(lock set) → StoreTxn reads/writes → StoreTxn.commit()
//!                                               ↘ drop = rollback
//! ```
//!
//! Commit validates unique constraints and applies every staged row inside
//! one write-lock critical section: readers observe none or all of it.

pub mod lock;
pub mod store;
pub mod txn;

pub use lock::{LockKey, LockSet, LockTable};
pub use store::Store;
pub use txn::StoreTxn;
