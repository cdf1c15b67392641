//! The store: committed tables, unique indexes, and the query API.
//!
//! ## Architecture
//!
//! All committed state lives in [`Tables`] behind one `parking_lot::RwLock`.
//! Point reads take the read lock briefly and clone; a commit takes the
//! write lock once, validates unique constraints, and applies the whole
//! write set, so readers observe none or all of a transaction.
//!
//! Row-level isolation is the [`LockTable`]'s job, not the `RwLock`'s: the
//! `RwLock` only makes individual reads and the commit step atomic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use farmgate_types::{
    Earning, EarningId, FarmerId, FarmgateError, InventoryTransaction, InventoryTxnId, ListingId,
    Order, OrderId, OrderItem, OrderItemId, Payment, PaymentId, PickupJob, PickupJobId,
    ProductListing, Result, StoreConfig,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::lock::{LockKey, LockTable};
use crate::txn::{StoreTxn, WriteSet};

/// Committed tables plus the unique indexes enforced at commit.
#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) orders: HashMap<OrderId, Order>,
    pub(crate) order_items: HashMap<OrderId, Vec<OrderItem>>,
    pub(crate) listings: HashMap<ListingId, ProductListing>,
    pub(crate) payments: HashMap<PaymentId, Payment>,
    pub(crate) payments_by_gateway: HashMap<String, PaymentId>,
    pub(crate) earnings: HashMap<EarningId, Earning>,
    pub(crate) earnings_by_item: HashMap<OrderItemId, EarningId>,
    pub(crate) inventory: Vec<InventoryTransaction>,
    pub(crate) inventory_ids: HashSet<InventoryTxnId>,
    pub(crate) pickup_jobs: HashMap<PickupJobId, PickupJob>,
    pub(crate) pickup_by_order: HashMap<OrderId, PickupJobId>,
}

impl Tables {
    /// Reject the write set if applying it would violate a unique index.
    /// Runs inside the commit critical section, so the answer cannot go
    /// stale before `apply`.
    pub(crate) fn check_constraints(&self, writes: &WriteSet) -> Result<()> {
        let mut staged_gateway: HashSet<&str> = HashSet::new();
        for payment in writes.payments.values() {
            if let Some(owner) = self.payments_by_gateway.get(&payment.gateway_order_id) {
                if *owner != payment.id {
                    return Err(FarmgateError::ConstraintViolation {
                        constraint: "payments.gateway_order_id",
                    });
                }
            }
            let is_insert = !self.payments.contains_key(&payment.id);
            if is_insert && !staged_gateway.insert(payment.gateway_order_id.as_str()) {
                return Err(FarmgateError::ConstraintViolation {
                    constraint: "payments.gateway_order_id",
                });
            }
        }

        let mut staged_items: HashSet<OrderItemId> = HashSet::new();
        for earning in writes.earnings.values() {
            if let Some(owner) = self.earnings_by_item.get(&earning.order_item_id) {
                if *owner != earning.id {
                    return Err(FarmgateError::ConstraintViolation {
                        constraint: "earnings.order_item_id",
                    });
                }
            }
            let is_insert = !self.earnings.contains_key(&earning.id);
            if is_insert && !staged_items.insert(earning.order_item_id) {
                return Err(FarmgateError::ConstraintViolation {
                    constraint: "earnings.order_item_id",
                });
            }
        }

        let mut staged_orders: HashSet<OrderId> = HashSet::new();
        for job in writes.pickup_jobs.values() {
            if let Some(owner) = self.pickup_by_order.get(&job.order_id) {
                if *owner != job.id {
                    return Err(FarmgateError::ConstraintViolation {
                        constraint: "pickup_jobs.order_id",
                    });
                }
            }
            let is_insert = !self.pickup_jobs.contains_key(&job.id);
            if is_insert && !staged_orders.insert(job.order_id) {
                return Err(FarmgateError::ConstraintViolation {
                    constraint: "pickup_jobs.order_id",
                });
            }
        }

        let mut staged_txns: HashSet<InventoryTxnId> = HashSet::new();
        for txn in &writes.inventory {
            if self.inventory_ids.contains(&txn.id) || !staged_txns.insert(txn.id) {
                return Err(FarmgateError::ConstraintViolation {
                    constraint: "inventory_transactions.id",
                });
            }
        }

        Ok(())
    }

    /// Apply a validated write set. Infallible: every failure mode was
    /// checked beforehand under the same write lock.
    pub(crate) fn apply(&mut self, writes: WriteSet) {
        for (id, order) in writes.orders {
            self.orders.insert(id, order);
        }
        for (id, listing) in writes.listings {
            self.listings.insert(id, listing);
        }
        for (id, payment) in writes.payments {
            self.payments_by_gateway
                .insert(payment.gateway_order_id.clone(), id);
            self.payments.insert(id, payment);
        }
        for (order_id, items) in writes.order_items {
            self.order_items.entry(order_id).or_default().extend(items);
        }
        for (id, earning) in writes.earnings {
            self.earnings_by_item.insert(earning.order_item_id, id);
            self.earnings.insert(id, earning);
        }
        for txn in writes.inventory {
            self.inventory_ids.insert(txn.id);
            self.inventory.push(txn);
        }
        for (id, job) in writes.pickup_jobs {
            self.pickup_by_order.insert(job.order_id, id);
            self.pickup_jobs.insert(id, job);
        }
    }
}

/// The transactional store. Shareable across threads via `Arc`.
pub struct Store {
    pub(crate) tables: RwLock<Tables>,
    locks: Arc<LockTable>,
    config: StoreConfig,
}

impl Store {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tables: RwLock::new(Tables::default()),
            locks: Arc::new(LockTable::new()),
            config,
        })
    }

    /// Open a transaction holding the given row locks.
    ///
    /// ## Isolation contract
    ///
    /// Two-phase row locking, all-or-nothing acquisition: the full lock set
    /// is claimed up front (bounded by `StoreConfig::lock_wait_ms`) and held
    /// until the transaction commits or drops. Within the transaction,
    /// orders and listings may be read or written **only** for keys in the
    /// lock set; child rows (payments, earnings, inventory ledger, pickup
    /// jobs) are written only under their parent's lock. Rows covered by
    /// the contract are therefore serializable across transactions.
    pub fn begin(&self, keys: Vec<LockKey>) -> Result<StoreTxn<'_>> {
        let locks = self.locks.acquire(keys, self.config.lock_wait())?;
        Ok(StoreTxn::new(self, locks))
    }

    /// Number of row locks currently held across all transactions.
    #[must_use]
    pub fn held_locks(&self) -> usize {
        self.locks.held_count()
    }

    // -----------------------------------------------------------------
    // Query API (point-in-time reads; dashboards and views consume these)
    // -----------------------------------------------------------------

    pub fn order(&self, id: OrderId) -> Result<Order> {
        self.tables
            .read()
            .orders
            .get(&id)
            .cloned()
            .ok_or(FarmgateError::OrderNotFound(id))
    }

    #[must_use]
    pub fn order_items(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.tables
            .read()
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn listing(&self, id: ListingId) -> Result<ProductListing> {
        self.tables
            .read()
            .listings
            .get(&id)
            .cloned()
            .ok_or(FarmgateError::ListingNotFound(id))
    }

    #[must_use]
    pub fn listings_for_farmer(&self, farmer_id: FarmerId) -> Vec<ProductListing> {
        let mut rows: Vec<ProductListing> = self
            .tables
            .read()
            .listings
            .values()
            .filter(|l| l.farmer_id == farmer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    /// Every listing id in the store. Used by sweep-style audits.
    #[must_use]
    pub fn listing_ids(&self) -> Vec<ListingId> {
        let mut ids: Vec<ListingId> = self.tables.read().listings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All payment attempts for an order, oldest first.
    #[must_use]
    pub fn payments_for_order(&self, order_id: OrderId) -> Vec<Payment> {
        let mut rows: Vec<Payment> = self
            .tables
            .read()
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    #[must_use]
    pub fn payment_by_gateway_order(&self, gateway_order_id: &str) -> Option<Payment> {
        let tables = self.tables.read();
        let id = tables.payments_by_gateway.get(gateway_order_id)?;
        tables.payments.get(id).cloned()
    }

    #[must_use]
    pub fn earnings_for_order(&self, order_id: OrderId) -> Vec<Earning> {
        let mut rows: Vec<Earning> = self
            .tables
            .read()
            .earnings
            .values()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    #[must_use]
    pub fn earnings_for_farmer(&self, farmer_id: FarmerId) -> Vec<Earning> {
        let mut rows: Vec<Earning> = self
            .tables
            .read()
            .earnings
            .values()
            .filter(|e| e.farmer_id == farmer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    /// The stock-movement ledger for one listing, in commit order.
    #[must_use]
    pub fn inventory_for_listing(&self, listing_id: ListingId) -> Vec<InventoryTransaction> {
        self.tables
            .read()
            .inventory
            .iter()
            .filter(|t| t.listing_id == listing_id)
            .cloned()
            .collect()
    }

    /// Ledger rows attributed to one order (its reservations).
    #[must_use]
    pub fn inventory_for_order(&self, order_id: OrderId) -> Vec<InventoryTransaction> {
        self.tables
            .read()
            .inventory
            .iter()
            .filter(|t| t.order_id == Some(order_id))
            .cloned()
            .collect()
    }

    /// Live counter and ledger sum for one listing, read in a single atomic
    /// section. Reading them separately could interleave with a commit and
    /// report a divergence that never existed.
    pub fn stock_snapshot(&self, listing_id: ListingId) -> Result<(i64, i64)> {
        let tables = self.tables.read();
        let listing = tables
            .listings
            .get(&listing_id)
            .ok_or(FarmgateError::ListingNotFound(listing_id))?;
        let ledger = tables
            .inventory
            .iter()
            .filter(|t| t.listing_id == listing_id)
            .map(|t| t.delta)
            .sum();
        Ok((listing.available_qty, ledger))
    }

    #[must_use]
    pub fn pickup_job_for_order(&self, order_id: OrderId) -> Option<PickupJob> {
        let tables = self.tables.read();
        let id = tables.pickup_by_order.get(&order_id)?;
        tables.pickup_jobs.get(id).cloned()
    }

    /// Jobs not yet delivered or cancelled, oldest request first.
    #[must_use]
    pub fn open_pickup_jobs(&self) -> Vec<PickupJob> {
        let mut rows: Vec<PickupJob> = self
            .tables
            .read()
            .pickup_jobs
            .values()
            .filter(|j| j.is_open())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        rows
    }

    // -----------------------------------------------------------------
    // Catalog and stock operations (each is one transaction)
    // -----------------------------------------------------------------

    /// Admit a new listing. Initial stock is ledgered as a RESTOCK row so
    /// the ledger replays to the live counter from the listing's birth.
    pub fn create_listing(&self, listing: ProductListing) -> Result<ListingId> {
        listing.validate()?;
        let id = listing.id;
        let mut txn = self.begin(vec![LockKey::Listing(id)])?;
        if listing.available_qty > 0 {
            txn.insert_inventory_txn(InventoryTransaction::restock(id, listing.available_qty))?;
        }
        txn.put_listing(listing)?;
        txn.commit()?;
        tracing::debug!(listing = %id, "Listing created");
        Ok(id)
    }

    /// Add harvested stock. Returns the new counter value.
    pub fn restock(&self, listing_id: ListingId, quantity: i64) -> Result<i64> {
        let mut txn = self.begin(vec![LockKey::Listing(listing_id)])?;
        let mut listing = txn.listing(listing_id)?;
        listing.restock(quantity)?;
        let remaining = listing.available_qty;
        txn.insert_inventory_txn(InventoryTransaction::restock(listing_id, quantity))?;
        txn.put_listing(listing)?;
        txn.commit()?;
        tracing::debug!(listing = %listing_id, delta = quantity, remaining = remaining, "Restocked");
        Ok(remaining)
    }

    /// Signed manual correction. Returns the new counter value.
    pub fn adjust_stock(&self, listing_id: ListingId, delta: i64) -> Result<i64> {
        let mut txn = self.begin(vec![LockKey::Listing(listing_id)])?;
        let mut listing = txn.listing(listing_id)?;
        listing.adjust(delta)?;
        let remaining = listing.available_qty;
        txn.insert_inventory_txn(InventoryTransaction::adjustment(listing_id, delta))?;
        txn.put_listing(listing)?;
        txn.commit()?;
        tracing::debug!(listing = %listing_id, delta = delta, remaining = remaining, "Stock adjusted");
        Ok(remaining)
    }

    /// Reprice a listing. Does not touch stock and writes no ledger row;
    /// already-placed orders keep their snapshots.
    pub fn update_listing_price(
        &self,
        listing_id: ListingId,
        price_per_unit: Decimal,
        farmer_price: Decimal,
    ) -> Result<()> {
        let mut txn = self.begin(vec![LockKey::Listing(listing_id)])?;
        let mut listing = txn.listing(listing_id)?;
        listing.reprice(price_per_unit, farmer_price)?;
        txn.put_listing(listing)?;
        txn.commit()
    }

    /// Deactivate a listing: no new orders, stock keeping still allowed.
    pub fn deactivate_listing(&self, listing_id: ListingId) -> Result<()> {
        let mut txn = self.begin(vec![LockKey::Listing(listing_id)])?;
        let mut listing = txn.listing(listing_id)?;
        listing.deactivate();
        txn.put_listing(listing)?;
        txn.commit()
    }

    /// Flip every PENDING earnings row of a farmer to PAID in one
    /// transaction, locking the owning orders. Returns the rows as paid.
    ///
    /// Earnings created after the initial scan belong to orders outside the
    /// lock set and are left for the next cycle.
    pub fn mark_earnings_paid(&self, farmer_id: FarmerId) -> Result<Vec<Earning>> {
        let pending: Vec<Earning> = self
            .earnings_for_farmer(farmer_id)
            .into_iter()
            .filter(Earning::is_pending)
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut keys: Vec<LockKey> = pending.iter().map(|e| LockKey::Order(e.order_id)).collect();
        keys.sort_unstable();
        keys.dedup();
        let mut txn = self.begin(keys)?;

        // Re-read under the locks; a concurrent cycle may have paid some
        // of these rows between the scan and the lock grant.
        let scanned: HashSet<EarningId> = pending.iter().map(|e| e.id).collect();
        let mut paid = Vec::new();
        for mut earning in txn.earnings_for_farmer(farmer_id) {
            if !scanned.contains(&earning.id) || !earning.is_pending() {
                continue;
            }
            earning.mark_paid()?;
            txn.put_earning(earning.clone())?;
            paid.push(earning);
        }
        txn.commit()?;
        tracing::debug!(farmer = %farmer_id, rows = paid.len(), "Pending earnings marked paid");
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(StoreConfig::default()).unwrap()
    }

    #[test]
    fn create_listing_ledgers_initial_stock() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 25);
        let id = store.create_listing(listing).unwrap();

        let ledger = store.inventory_for_listing(id);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].delta, 25);
        assert_eq!(store.listing(id).unwrap().available_qty, 25);
    }

    #[test]
    fn create_listing_with_zero_stock_writes_no_ledger_row() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 0);
        let id = store.create_listing(listing).unwrap();
        assert!(store.inventory_for_listing(id).is_empty());
    }

    #[test]
    fn create_listing_rejects_invalid() {
        let store = store();
        let mut listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 5);
        listing.farmer_price = Decimal::new(60, 0);
        assert!(store.create_listing(listing).is_err());
    }

    #[test]
    fn restock_appends_ledger_row() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 10);
        let id = store.create_listing(listing).unwrap();

        let remaining = store.restock(id, 15).unwrap();
        assert_eq!(remaining, 25);
        let ledger = store.inventory_for_listing(id);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.iter().map(|t| t.delta).sum::<i64>(), 25);
    }

    #[test]
    fn adjust_stock_guards_against_negative() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 3);
        let id = store.create_listing(listing).unwrap();

        assert!(store.adjust_stock(id, -5).is_err());
        assert_eq!(store.listing(id).unwrap().available_qty, 3);
        // The rejected adjustment left no ledger row behind.
        assert_eq!(store.inventory_for_listing(id).len(), 1);

        let remaining = store.adjust_stock(id, -3).unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(store.inventory_for_listing(id).len(), 2);
    }

    #[test]
    fn reprice_leaves_ledger_untouched() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 10);
        let id = store.create_listing(listing).unwrap();

        store
            .update_listing_price(id, Decimal::new(70, 0), Decimal::new(55, 0))
            .unwrap();
        let listing = store.listing(id).unwrap();
        assert_eq!(listing.price_per_unit, Decimal::new(70, 0));
        assert_eq!(store.inventory_for_listing(id).len(), 1);
    }

    #[test]
    fn deactivated_listing_still_allows_stock_keeping() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 10);
        let id = store.create_listing(listing).unwrap();

        store.deactivate_listing(id).unwrap();
        assert!(!store.listing(id).unwrap().is_active);
        assert_eq!(store.restock(id, 5).unwrap(), 15);
    }

    #[test]
    fn payment_lookup_by_gateway_order() {
        let store = store();
        let order = Order::dummy_awaiting(Decimal::new(100, 0));
        let order_id = order.id;

        let mut txn = store.begin(vec![LockKey::Order(order_id)]).unwrap();
        txn.put_order(order).unwrap();
        txn.put_payment(Payment::open(
            order_id,
            "razorpay",
            "order_RZP042",
            Decimal::new(100, 0),
        ))
        .unwrap();
        txn.commit().unwrap();

        let found = store.payment_by_gateway_order("order_RZP042").unwrap();
        assert_eq!(found.order_id, order_id);
        assert!(store.payment_by_gateway_order("order_UNKNOWN").is_none());
    }

    #[test]
    fn locks_released_after_each_operation() {
        let store = store();
        let listing = ProductListing::dummy_priced(Decimal::new(50, 0), Decimal::new(40, 0), 10);
        let id = store.create_listing(listing).unwrap();
        store.restock(id, 1).unwrap();
        assert_eq!(store.held_locks(), 0);
    }

    #[test]
    fn mark_earnings_paid_flips_only_pending_rows() {
        let store = store();
        let farmer = FarmerId::new();
        let listing = ProductListing::dummy_for_farmer(farmer, 100);
        let listing_id = store.create_listing(listing.clone()).unwrap();

        // Two settled orders for the same farmer, one earning each.
        for _ in 0..2 {
            let order = Order::dummy_awaiting(Decimal::new(100, 0));
            let order_id = order.id;
            let item = OrderItem::snapshot(order_id, &listing, 2);
            let mut txn = store.begin(vec![LockKey::Order(order_id)]).unwrap();
            txn.put_order(order).unwrap();
            txn.put_earning(Earning::for_item(&item, farmer)).unwrap();
            txn.commit().unwrap();
        }

        let paid = store.mark_earnings_paid(farmer).unwrap();
        assert_eq!(paid.len(), 2);
        assert!(paid.iter().all(|e| e.amount == Decimal::new(80, 0)));

        // Second cycle finds nothing left to pay.
        assert!(store.mark_earnings_paid(farmer).unwrap().is_empty());
        assert!(
            store
                .earnings_for_farmer(farmer)
                .iter()
                .all(|e| !e.is_pending())
        );
        // Payout does not touch stock.
        assert_eq!(store.listing(listing_id).unwrap().available_qty, 100);
        assert_eq!(store.held_locks(), 0);
    }
}
