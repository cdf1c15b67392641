//! The unit of work.
//!
//! A [`StoreTxn`] stages every write in memory and applies the whole set in
//! one critical section at [`StoreTxn::commit`]. Dropping an uncommitted
//! transaction discards the staged writes, so rollback needs no undo log:
//! nothing was ever visible to other readers.
//!
//! Reads within a transaction overlay staged writes over committed state,
//! so a transaction observes its own pending mutations (a second
//! [`StoreTxn::reserve_stock`] on the same listing sees the first
//! decrement).
//!
//! Every write requires the row's lock to be part of the transaction's
//! claimed set. A write outside the lock set is a caller bug and fails with
//! `FG_ERR_900` rather than silently racing.

use std::collections::HashMap;

use farmgate_types::{
    Earning, EarningId, FarmerId, FarmgateError, InventoryTransaction, ListingId, Order, OrderId,
    OrderItem, Payment, PaymentId, PickupJob, PickupJobId, ProductListing, Result,
};

use crate::lock::{LockKey, LockSet};
use crate::store::Store;

/// Staged writes, keyed the way the committed tables are.
#[derive(Default)]
pub(crate) struct WriteSet {
    pub(crate) orders: HashMap<OrderId, Order>,
    pub(crate) listings: HashMap<ListingId, ProductListing>,
    pub(crate) payments: HashMap<PaymentId, Payment>,
    pub(crate) earnings: HashMap<EarningId, Earning>,
    pub(crate) pickup_jobs: HashMap<PickupJobId, PickupJob>,
    pub(crate) order_items: HashMap<OrderId, Vec<OrderItem>>,
    pub(crate) inventory: Vec<InventoryTransaction>,
}

impl WriteSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.orders.is_empty()
            && self.listings.is_empty()
            && self.payments.is_empty()
            && self.earnings.is_empty()
            && self.pickup_jobs.is_empty()
            && self.order_items.is_empty()
            && self.inventory.is_empty()
    }

    /// Total staged row count.
    pub(crate) fn len(&self) -> usize {
        self.orders.len()
            + self.listings.len()
            + self.payments.len()
            + self.earnings.len()
            + self.pickup_jobs.len()
            + self.order_items.values().map(Vec::len).sum::<usize>()
            + self.inventory.len()
    }
}

/// One all-or-nothing unit of work against the store.
///
/// Created by [`Store::begin`] with the row locks already claimed. Locks are
/// held until this value drops, which happens after the commit has applied
/// (or after the staged writes are discarded).
pub struct StoreTxn<'s> {
    store: &'s Store,
    locks: LockSet,
    writes: WriteSet,
    committed: bool,
}

impl<'s> StoreTxn<'s> {
    pub(crate) fn new(store: &'s Store, locks: LockSet) -> Self {
        Self {
            store,
            locks,
            writes: WriteSet::default(),
            committed: false,
        }
    }

    /// The row locks this transaction holds.
    #[must_use]
    pub fn lock_keys(&self) -> &[LockKey] {
        self.locks.keys()
    }

    fn require_lock(&self, key: LockKey) -> Result<()> {
        if self.locks.covers(&key) {
            Ok(())
        } else {
            Err(FarmgateError::Internal(format!(
                "row {key} is outside this transaction's lock set"
            )))
        }
    }

    // -----------------------------------------------------------------
    // Reads (staged writes overlay committed state)
    // -----------------------------------------------------------------

    pub fn order(&self, id: OrderId) -> Result<Order> {
        if let Some(order) = self.writes.orders.get(&id) {
            return Ok(order.clone());
        }
        self.store
            .tables
            .read()
            .orders
            .get(&id)
            .cloned()
            .ok_or(FarmgateError::OrderNotFound(id))
    }

    pub fn listing(&self, id: ListingId) -> Result<ProductListing> {
        if let Some(listing) = self.writes.listings.get(&id) {
            return Ok(listing.clone());
        }
        self.store
            .tables
            .read()
            .listings
            .get(&id)
            .cloned()
            .ok_or(FarmgateError::ListingNotFound(id))
    }

    /// The order's line items. Immutable rows: staged inserts shadow
    /// nothing, an order's items are written exactly once.
    #[must_use]
    pub fn order_items(&self, order_id: OrderId) -> Vec<OrderItem> {
        if let Some(items) = self.writes.order_items.get(&order_id) {
            return items.clone();
        }
        self.store
            .tables
            .read()
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All payment attempts for an order, oldest first.
    #[must_use]
    pub fn payments_for_order(&self, order_id: OrderId) -> Vec<Payment> {
        let tables = self.store.tables.read();
        let mut rows: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .map(|p| self.writes.payments.get(&p.id).unwrap_or(p))
            .cloned()
            .collect();
        for payment in self.writes.payments.values() {
            if payment.order_id == order_id && !tables.payments.contains_key(&payment.id) {
                rows.push(payment.clone());
            }
        }
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    /// All earnings rows for a farmer, oldest first.
    #[must_use]
    pub fn earnings_for_farmer(&self, farmer_id: FarmerId) -> Vec<Earning> {
        let tables = self.store.tables.read();
        let mut rows: Vec<Earning> = tables
            .earnings
            .values()
            .filter(|e| e.farmer_id == farmer_id)
            .map(|e| self.writes.earnings.get(&e.id).unwrap_or(e))
            .cloned()
            .collect();
        for earning in self.writes.earnings.values() {
            if earning.farmer_id == farmer_id && !tables.earnings.contains_key(&earning.id) {
                rows.push(earning.clone());
            }
        }
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    // -----------------------------------------------------------------
    // Writes (staged until commit)
    // -----------------------------------------------------------------

    pub fn put_order(&mut self, order: Order) -> Result<()> {
        self.require_lock(LockKey::Order(order.id))?;
        self.writes.orders.insert(order.id, order);
        Ok(())
    }

    pub fn put_listing(&mut self, listing: ProductListing) -> Result<()> {
        self.require_lock(LockKey::Listing(listing.id))?;
        self.writes.listings.insert(listing.id, listing);
        Ok(())
    }

    /// Payments are children of their order and ride its lock.
    pub fn put_payment(&mut self, payment: Payment) -> Result<()> {
        self.require_lock(LockKey::Order(payment.order_id))?;
        self.writes.payments.insert(payment.id, payment);
        Ok(())
    }

    pub fn put_earning(&mut self, earning: Earning) -> Result<()> {
        self.require_lock(LockKey::Order(earning.order_id))?;
        self.writes.earnings.insert(earning.id, earning);
        Ok(())
    }

    pub fn put_pickup_job(&mut self, job: PickupJob) -> Result<()> {
        self.require_lock(LockKey::Order(job.order_id))?;
        self.writes.pickup_jobs.insert(job.id, job);
        Ok(())
    }

    pub fn insert_order_items(&mut self, items: Vec<OrderItem>) -> Result<()> {
        for item in &items {
            self.require_lock(LockKey::Order(item.order_id))?;
        }
        for item in items {
            self.writes
                .order_items
                .entry(item.order_id)
                .or_default()
                .push(item);
        }
        Ok(())
    }

    pub fn insert_inventory_txn(&mut self, txn: InventoryTransaction) -> Result<()> {
        self.require_lock(LockKey::Listing(txn.listing_id))?;
        self.writes.inventory.push(txn);
        Ok(())
    }

    /// Compare-and-decrement in one guarded operation: reserve `quantity`
    /// units of the listing or stage nothing. Returns the remaining stock
    /// as this transaction would commit it.
    pub fn reserve_stock(&mut self, listing_id: ListingId, quantity: i64) -> Result<i64> {
        self.require_lock(LockKey::Listing(listing_id))?;
        let mut listing = self.listing(listing_id)?;
        listing.try_reserve(quantity)?;
        let remaining = listing.available_qty;
        self.writes.listings.insert(listing_id, listing);
        Ok(remaining)
    }

    // -----------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------

    /// Validate unique constraints and apply every staged write in one
    /// table-lock critical section. On any error nothing is applied and the
    /// row locks are released.
    pub fn commit(mut self) -> Result<()> {
        let writes = std::mem::take(&mut self.writes);
        let rows = writes.len();
        {
            let mut tables = self.store.tables.write();
            tables.check_constraints(&writes)?;
            tables.apply(writes);
        }
        self.committed = true;
        tracing::debug!(rows = rows, "Transaction committed");
        Ok(())
    }
}

impl Drop for StoreTxn<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.writes.is_empty() {
            tracing::debug!(
                staged = self.writes.len(),
                "Transaction dropped; staged writes discarded"
            );
        }
    }
}
