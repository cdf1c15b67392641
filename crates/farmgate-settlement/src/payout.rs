//! Payout cycle — flips a farmer's PENDING earnings to PAID.
//!
//! Settlement creates earnings; this module disburses them. One cycle per
//! farmer, batch semantics: every earning that was PENDING when the cycle
//! scanned is paid in one transaction, and a second cycle finds nothing.
//! Wiring the ledger to an actual bank transfer lives outside this crate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_store::Store;
use farmgate_types::{FarmerId, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What one payout cycle disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSummary {
    pub farmer_id: FarmerId,
    /// Earnings rows flipped PENDING -> PAID in this cycle.
    pub earnings_paid: usize,
    /// Σ amounts of the flipped rows.
    pub total_amount: Decimal,
    pub ran_at: DateTime<Utc>,
}

impl PayoutSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.earnings_paid == 0
    }
}

/// Runs payout cycles against the store.
pub struct PayoutCycle {
    store: Arc<Store>,
}

impl PayoutCycle {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Pay out everything currently owed to one farmer.
    ///
    /// Earnings created while the cycle runs are left PENDING for the next
    /// cycle; the store's scan-then-lock protocol never pays a row twice.
    ///
    /// # Errors
    /// Returns `LockTimeout` when the orders backing the pending earnings
    /// cannot all be locked in time. Retriable.
    pub fn run_for_farmer(&self, farmer_id: FarmerId) -> Result<PayoutSummary> {
        let paid = self.store.mark_earnings_paid(farmer_id)?;
        let total_amount: Decimal = paid.iter().map(|e| e.amount).sum();
        let summary = PayoutSummary {
            farmer_id,
            earnings_paid: paid.len(),
            total_amount,
            ran_at: Utc::now(),
        };
        if summary.is_empty() {
            tracing::debug!(farmer = %farmer_id, "Payout cycle found nothing pending");
        } else {
            tracing::info!(
                farmer = %farmer_id,
                rows = summary.earnings_paid,
                total = %total_amount,
                "Payout cycle disbursed pending earnings"
            );
        }
        Ok(summary)
    }
}
