//! Settlement engine — applies a gateway's verdict exactly once.
//!
//! One callback, one store transaction: the idempotency guard, the stock
//! reservation, and every downstream row (payment, order, earnings, ledger,
//! pickup job) commit together or not at all. Redelivered callbacks classify
//! as [`SettlementOutcome::AlreadyProcessed`] and write nothing.
//!
//! ## Success pipeline
//!
//! 1. Lock the order and every listing its items name
//! 2. Guard: classify against persisted Order/Payment state
//! 3. Verify the captured amount equals the order total
//! 4. Compare-and-decrement each listing, ledger each reservation
//! 5. Payment SUCCESS, Order PAID, one PENDING earning per item,
//!    one REQUESTED pickup job
//! 6. Commit
//!
//! If any step fails, the transaction drops and no row moves.

use std::sync::Arc;

use farmgate_store::{LockKey, Store, StoreTxn};
use farmgate_types::{
    CorrelationId, Earning, FarmgateError, InventoryTransaction, OrderId, Payment, PickupJob,
    PickupJobId, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::earnings;
use crate::idempotency::{self, Disposition};

/// A gateway's confirmation that a payment attempt captured funds.
///
/// `correlation_id` traces this delivery through the logs; it is minted per
/// delivery and proves nothing about duplicates. Idempotency derives from
/// persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    /// The gateway's order handle, minted at checkout.
    pub gateway_order_id: String,
    /// The gateway's capture handle for the funds.
    pub gateway_payment_id: String,
    /// Amount the gateway reports captured. Must equal the order total.
    pub amount: Decimal,
    pub correlation_id: CorrelationId,
}

/// A gateway's verdict that a payment attempt failed or was abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub correlation_id: CorrelationId,
}

/// What a settlement call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// First delivery: the full effect set was committed.
    Applied(SettlementReport),
    /// The effects were already persisted by an earlier delivery. Nothing
    /// was written. Not an error: the webhook handler acks the gateway so
    /// it stops redelivering.
    AlreadyProcessed,
}

impl SettlementOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub fn report(&self) -> Option<&SettlementReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::AlreadyProcessed => None,
        }
    }
}

/// What a successful settlement created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub order_id: OrderId,
    /// Earnings rows created (one per order item; zero on the failure path).
    pub earnings_created: usize,
    /// Σ earnings amounts.
    pub total_earnings: Decimal,
    /// The spawned fulfillment job; `None` on the failure path.
    pub pickup_job_id: Option<PickupJobId>,
}

/// Applies gateway verdicts to orders, exactly once each.
pub struct SettlementEngine {
    store: Arc<Store>,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Settle a confirmed payment capture.
    ///
    /// Runs the success pipeline in one transaction over the order and every
    /// listing its items name. The lock set is computable before any lock is
    /// held because order items are immutable.
    ///
    /// # Errors
    /// - `OrderNotFound` / `PaymentNotFound` / `GatewayOrderMismatch` when
    ///   the callback names rows that do not line up
    /// - `PaymentStateConflict` when the callback contradicts persisted state
    /// - `AmountMismatch` when the captured amount differs from the order total
    /// - `InsufficientStock` when any item cannot be covered; nothing commits
    /// - `LockTimeout` when the lock set cannot be claimed in time; retriable
    pub fn settle_payment_success(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<SettlementOutcome> {
        let order_id = confirmation.order_id;
        let correlation = confirmation.correlation_id;

        let mut keys: Vec<LockKey> = self
            .store
            .order_items(order_id)
            .iter()
            .map(|item| LockKey::Listing(item.listing_id))
            .collect();
        keys.push(LockKey::Order(order_id));
        let mut txn = self.store.begin(keys)?;

        let mut order = txn.order(order_id)?;
        let mut payment = self.match_payment(&txn, order_id, &confirmation.gateway_order_id)?;
        if idempotency::classify_success(&order, &payment)? == Disposition::AlreadyProcessed {
            tracing::info!(
                order = %order_id,
                correlation = %correlation,
                "Success callback redelivered; settlement already applied"
            );
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        if confirmation.amount != order.total_amount {
            tracing::warn!(
                order = %order_id,
                correlation = %correlation,
                expected = %order.total_amount,
                reported = %confirmation.amount,
                "Gateway reports a different captured amount"
            );
            return Err(FarmgateError::AmountMismatch {
                order_id,
                expected: order.total_amount,
                reported: confirmation.amount,
            });
        }

        let items = txn.order_items(order_id);
        for item in &items {
            let remaining = txn.reserve_stock(item.listing_id, item.quantity)?;
            txn.insert_inventory_txn(InventoryTransaction::order_reserve(
                order_id,
                item.listing_id,
                item.quantity,
            ))?;
            tracing::debug!(
                order = %order_id,
                correlation = %correlation,
                listing = %item.listing_id,
                reserved = item.quantity,
                remaining = remaining,
                "Stock reserved"
            );
        }

        payment.mark_succeeded(confirmation.gateway_payment_id)?;
        order.mark_paid()?;
        txn.put_payment(payment)?;
        txn.put_order(order)?;

        let mut earnings_created = 0usize;
        for item in &items {
            let farmer_id = txn.listing(item.listing_id)?.farmer_id;
            txn.put_earning(Earning::for_item(item, farmer_id))?;
            earnings_created += 1;
        }
        let total_earnings = earnings::total_farmer_earnings(&items);

        let job = PickupJob::request(order_id);
        let pickup_job_id = job.id;
        txn.put_pickup_job(job)?;

        txn.commit()?;
        tracing::info!(
            order = %order_id,
            correlation = %correlation,
            total = %total_earnings,
            earnings = earnings_created,
            pickup = %pickup_job_id,
            "Payment settled; order paid"
        );
        Ok(SettlementOutcome::Applied(SettlementReport {
            order_id,
            earnings_created,
            total_earnings,
            pickup_job_id: Some(pickup_job_id),
        }))
    }

    /// Settle a failed payment attempt: the attempt goes FAILED and the
    /// order cancels. No stock, earnings, or pickup side effects.
    ///
    /// # Errors
    /// - `OrderNotFound` / `PaymentNotFound` / `GatewayOrderMismatch` when
    ///   the callback names rows that do not line up
    /// - `PaymentStateConflict` when the order already settled successfully
    pub fn settle_payment_failure(&self, failure: PaymentFailure) -> Result<SettlementOutcome> {
        let order_id = failure.order_id;
        let correlation = failure.correlation_id;

        let mut txn = self.store.begin(vec![LockKey::Order(order_id)])?;
        let mut order = txn.order(order_id)?;
        let mut payment = self.match_payment(&txn, order_id, &failure.gateway_order_id)?;
        if idempotency::classify_failure(&order, &payment)? == Disposition::AlreadyProcessed {
            tracing::info!(
                order = %order_id,
                correlation = %correlation,
                "Failure callback redelivered; order already cancelled"
            );
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        payment.mark_failed()?;
        order.mark_payment_failed()?;
        txn.put_payment(payment)?;
        txn.put_order(order)?;
        txn.commit()?;

        tracing::info!(
            order = %order_id,
            correlation = %correlation,
            "Payment failed; order cancelled"
        );
        Ok(SettlementOutcome::Applied(SettlementReport {
            order_id,
            earnings_created: 0,
            total_earnings: Decimal::ZERO,
            pickup_job_id: None,
        }))
    }

    /// The order's payment row matching the callback's gateway handle.
    fn match_payment(
        &self,
        txn: &StoreTxn<'_>,
        order_id: OrderId,
        gateway_order_id: &str,
    ) -> Result<Payment> {
        if let Some(payment) = txn
            .payments_for_order(order_id)
            .into_iter()
            .find(|p| p.gateway_order_id == gateway_order_id)
        {
            return Ok(payment);
        }
        // Sharpen the error: does the handle belong to a different order?
        if let Some(other) = self.store.payment_by_gateway_order(gateway_order_id) {
            return Err(FarmgateError::GatewayOrderMismatch {
                gateway_order_id: gateway_order_id.to_string(),
                owner: other.order_id,
                claimed: order_id,
            });
        }
        Err(FarmgateError::PaymentNotFound {
            order_id,
            gateway_order_id: gateway_order_id.to_string(),
        })
    }
}
