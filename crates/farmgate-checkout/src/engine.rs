//! Checkout engine — order intake and payment attempt registration.
//!
//! `place_order` turns a validated cart into one atomic write: the Order
//! row, its price-snapshotted items, and the first PENDING payment attempt.
//! Stock is only prechecked here; the binding compare-and-decrement happens
//! at settlement. Two checkouts may therefore race for the same last units,
//! and the loser finds out at payment confirmation, not at intake.

use std::sync::Arc;

use farmgate_store::{LockKey, Store};
use farmgate_types::{
    AddressId, CheckoutConfig, CustomerId, FarmgateError, Order, OrderId, OrderItem, Payment,
    PaymentId, Result,
};
use rust_decimal::Decimal;

use crate::policy::{CartLine, CheckoutPolicy};

/// A checkout request: who is buying, where it ships, what is in the cart,
/// and the gateway handle minted for the first payment attempt.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    pub lines: Vec<CartLine>,
    /// The gateway's order handle, obtained from the gateway before
    /// checkout commits. Unique store-wide.
    pub gateway_order_id: String,
}

/// Receipt for a placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub total_amount: Decimal,
    pub lines: usize,
}

/// Order intake engine.
pub struct CheckoutEngine {
    store: Arc<Store>,
    policy: CheckoutPolicy,
    config: CheckoutConfig,
}

impl CheckoutEngine {
    pub fn new(store: Arc<Store>, config: CheckoutConfig) -> Result<Self> {
        config.validate()?;
        let policy = CheckoutPolicy::new(&config);
        Ok(Self {
            store,
            policy,
            config,
        })
    }

    /// Place an order from a cart.
    ///
    /// Pipeline:
    /// 1. Policy gate. Rejected carts never open a transaction.
    /// 2. One transaction over the new order's key and every listing in
    ///    the cart.
    /// 3. Per line: the listing must be active and able to cover the
    ///    requested quantity right now (a precheck; nothing is reserved).
    ///    Current prices are snapshotted into an immutable item row.
    /// 4. One commit: the order (CREATED/PENDING), its items, and the
    ///    first PENDING payment attempt.
    ///
    /// If any line fails, nothing is committed.
    ///
    /// # Errors
    /// - `InvalidOrder` from the policy gate or a blank gateway handle
    /// - `ListingNotFound` / `ListingInactive` for dead cart lines
    /// - `InsufficientStock` if a line cannot be covered right now
    /// - `ConstraintViolation` if the gateway handle is already taken
    /// - `LockTimeout` if the lock set cannot be claimed in time
    pub fn place_order(&self, request: PlaceOrder) -> Result<PlacedOrder> {
        self.policy.validate(&request.lines)?;
        if request.gateway_order_id.trim().is_empty() {
            return Err(FarmgateError::InvalidOrder {
                reason: "gateway order id must not be blank".to_string(),
            });
        }

        // The order id is minted before the transaction so its row lock can
        // be claimed together with the listings'.
        let order_id = OrderId::new();
        let mut keys: Vec<LockKey> = request
            .lines
            .iter()
            .map(|line| LockKey::Listing(line.listing_id))
            .collect();
        keys.push(LockKey::Order(order_id));
        let mut txn = self.store.begin(keys)?;

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let listing = txn.listing(line.listing_id)?;
            if !listing.is_active {
                return Err(FarmgateError::ListingInactive(listing.id));
            }
            if !listing.can_fulfill(line.quantity) {
                return Err(FarmgateError::InsufficientStock {
                    listing_id: listing.id,
                    requested: line.quantity,
                    available: listing.available_qty,
                });
            }
            items.push(OrderItem::snapshot(order_id, &listing, line.quantity));
        }
        let total_amount: Decimal = items.iter().map(OrderItem::line_total).sum();
        let line_count = items.len();

        let order = Order::place(
            order_id,
            request.customer_id,
            request.shipping_address_id,
            total_amount,
        );
        let payment = Payment::open(
            order_id,
            self.config.gateway.as_str(),
            request.gateway_order_id,
            total_amount,
        );
        let payment_id = payment.id;

        txn.put_order(order)?;
        txn.insert_order_items(items)?;
        txn.put_payment(payment)?;
        txn.commit()?;

        tracing::info!(
            order = %order_id,
            total = %total_amount,
            lines = line_count,
            "Order placed"
        );
        Ok(PlacedOrder {
            order_id,
            payment_id,
            total_amount,
            lines: line_count,
        })
    }

    /// Register a fresh PENDING payment attempt for an order whose earlier
    /// attempts failed at the gateway or were abandoned mid-checkout.
    ///
    /// # Errors
    /// - `OrderNotFound` if the order does not exist
    /// - `PaymentRetryClosed` once the order has left CREATED
    /// - `PaymentAttemptsExhausted` at the per-order attempt cap
    /// - `ConstraintViolation` if the gateway handle is already taken
    pub fn register_payment_attempt(
        &self,
        order_id: OrderId,
        gateway_order_id: impl Into<String>,
    ) -> Result<PaymentId> {
        let gateway_order_id = gateway_order_id.into();
        if gateway_order_id.trim().is_empty() {
            return Err(FarmgateError::InvalidOrder {
                reason: "gateway order id must not be blank".to_string(),
            });
        }

        let mut txn = self.store.begin(vec![LockKey::Order(order_id)])?;
        let order = txn.order(order_id)?;
        if !order.is_awaiting_payment() {
            return Err(FarmgateError::PaymentRetryClosed {
                order_id,
                status: order.status,
            });
        }
        let attempts = txn.payments_for_order(order_id).len();
        if attempts >= self.config.max_payment_attempts {
            return Err(FarmgateError::PaymentAttemptsExhausted {
                order_id,
                max: self.config.max_payment_attempts,
            });
        }

        let payment = Payment::open(
            order_id,
            self.config.gateway.as_str(),
            gateway_order_id,
            order.total_amount,
        );
        let payment_id = payment.id;
        txn.put_payment(payment)?;
        txn.commit()?;

        tracing::debug!(
            order = %order_id,
            attempt = attempts + 1,
            "Payment attempt registered"
        );
        Ok(payment_id)
    }
}
