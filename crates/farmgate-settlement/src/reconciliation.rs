//! Stock reconciliation — proves the audit ledger replays to the counters.
//!
//! Every stock movement (opening stock, restock, manual adjustment,
//! settlement reservation) writes a signed ledger row in the same
//! transaction that moves the counter, so for every listing
//!
//! ```text
//! available_qty == Σ inventory_transactions.delta
//! ```
//!
//! A divergence means a counter moved outside a ledgered transaction and is
//! reported as `FG_ERR_600`. The reconciler never repairs; it only detects.

use std::sync::Arc;

use farmgate_store::Store;
use farmgate_types::{FarmgateError, ListingId, Result};

/// Audits listing counters against the inventory ledger.
pub struct StockReconciler {
    store: Arc<Store>,
}

impl StockReconciler {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Check one listing.
    ///
    /// # Errors
    /// - `ListingNotFound` when the listing does not exist
    /// - `LedgerDivergence` when the counter and the ledger sum disagree
    pub fn verify(&self, listing_id: ListingId) -> Result<()> {
        let (counter, ledger) = self.store.stock_snapshot(listing_id)?;
        if counter != ledger {
            tracing::warn!(
                listing = %listing_id,
                counter = counter,
                ledger = ledger,
                "Stock counter diverges from the ledger"
            );
            return Err(FarmgateError::LedgerDivergence {
                listing_id,
                counter,
                ledger,
            });
        }
        Ok(())
    }

    /// Sweep every listing in the store, stopping at the first divergence.
    /// Returns how many listings were checked.
    ///
    /// # Errors
    /// Propagates the first `LedgerDivergence` found.
    pub fn verify_all(&self) -> Result<usize> {
        let ids = self.store.listing_ids();
        for id in &ids {
            self.verify(*id)?;
        }
        tracing::debug!(listings = ids.len(), "Stock ledger reconciled");
        Ok(ids.len())
    }
}
