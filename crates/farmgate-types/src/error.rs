//! Error types for the Farmgate settlement core.
//!
//! All errors use the `FG_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Payment errors
//! - 3xx: Listing / stock errors
//! - 4xx: Earnings / payout errors
//! - 5xx: Pickup errors
//! - 6xx: Settlement / reconciliation errors
//! - 7xx: Store / transaction errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    EarningId, EarningStatus, ListingId, OrderId, OrderStatus, PaymentStatus, PickupStatus,
};

/// Central error enum for all Farmgate operations.
#[derive(Debug, Error)]
pub enum FarmgateError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order does not exist.
    #[error("FG_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed structural validation at intake.
    #[error("FG_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The order's state machine rejected a transition.
    #[error("FG_ERR_102: Invalid order transition: {from} -> {to}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    // =================================================================
    // Payment Errors (2xx)
    // =================================================================
    /// The callback names a gateway order id with no payment row under
    /// the given order.
    #[error("FG_ERR_200: No payment attempt {gateway_order_id} for order {order_id}")]
    PaymentNotFound {
        order_id: OrderId,
        gateway_order_id: String,
    },

    /// The gateway order id exists but belongs to a different order.
    #[error("FG_ERR_201: Gateway order {gateway_order_id} belongs to order {owner}, not {claimed}")]
    GatewayOrderMismatch {
        gateway_order_id: String,
        owner: OrderId,
        claimed: OrderId,
    },

    /// The gateway reports a captured amount different from the order total.
    #[error(
        "FG_ERR_202: Amount mismatch for order {order_id}: gateway reports {reported}, order total is {expected}"
    )]
    AmountMismatch {
        order_id: OrderId,
        expected: Decimal,
        reported: Decimal,
    },

    /// A gateway signal contradicts already-persisted payment state
    /// (e.g. a failure callback for an order that settled successfully).
    #[error("FG_ERR_203: Conflicting gateway signal for order {order_id}: payment already {status}")]
    PaymentStateConflict {
        order_id: OrderId,
        status: PaymentStatus,
    },

    /// The payment state machine rejected a transition.
    #[error("FG_ERR_204: Invalid payment transition: {from} -> {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// New payment attempts are only accepted while the order is CREATED.
    #[error("FG_ERR_205: Payment attempts are closed for order {order_id}: status is {status}")]
    PaymentRetryClosed {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The per-order cap on gateway attempts was reached.
    #[error("FG_ERR_206: Payment attempt limit reached for order {order_id} ({max})")]
    PaymentAttemptsExhausted { order_id: OrderId, max: usize },

    // =================================================================
    // Listing / Stock Errors (3xx)
    // =================================================================
    /// The requested listing does not exist.
    #[error("FG_ERR_300: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing exists but is no longer for sale.
    #[error("FG_ERR_301: Listing is inactive: {0}")]
    ListingInactive(ListingId),

    /// Reservation asked for more units than the listing has. The order's
    /// whole settlement aborts; nothing is committed.
    #[error(
        "FG_ERR_302: Insufficient stock for listing {listing_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        listing_id: ListingId,
        requested: i64,
        available: i64,
    },

    /// The listing failed structural validation.
    #[error("FG_ERR_303: Invalid listing: {reason}")]
    InvalidListing { reason: String },

    /// A stock mutation carried a zero or wrongly-signed delta.
    #[error("FG_ERR_304: Invalid stock delta {delta} for listing {listing_id}")]
    InvalidStockDelta { listing_id: ListingId, delta: i64 },

    /// A manual adjustment would drive the stock counter below zero.
    #[error("FG_ERR_305: Stock for listing {listing_id} would go negative ({would_be})")]
    NegativeStock { listing_id: ListingId, would_be: i64 },

    // =================================================================
    // Earnings / Payout Errors (4xx)
    // =================================================================
    /// The earnings record is not in a payable state.
    #[error("FG_ERR_400: Earning {earning_id} cannot be paid out from status {from}")]
    InvalidEarningTransition {
        earning_id: EarningId,
        from: EarningStatus,
    },

    // =================================================================
    // Pickup Errors (5xx)
    // =================================================================
    /// The pickup job's state machine rejected a transition.
    #[error("FG_ERR_500: Invalid pickup transition: {from} -> {to}")]
    InvalidPickupTransition {
        from: PickupStatus,
        to: PickupStatus,
    },

    // =================================================================
    // Settlement / Reconciliation Errors (6xx)
    // =================================================================
    /// The inventory ledger no longer replays to the live stock counter.
    /// Critical audit alert: some write bypassed the transactional path.
    #[error(
        "FG_ERR_600: Inventory ledger divergence for listing {listing_id}: counter {counter}, ledger sum {ledger}"
    )]
    LedgerDivergence {
        listing_id: ListingId,
        counter: i64,
        ledger: i64,
    },

    // =================================================================
    // Store / Transaction Errors (7xx)
    // =================================================================
    /// Row locks could not all be claimed before the deadline. Nothing was
    /// committed; the caller may retry the whole operation.
    #[error("FG_ERR_700: Timed out after {waited_ms}ms waiting for {keys} row locks")]
    LockTimeout { waited_ms: u64, keys: usize },

    /// A commit would violate a unique index. Nothing was applied.
    #[error("FG_ERR_701: Unique constraint violated: {constraint}")]
    ConstraintViolation { constraint: &'static str },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("FG_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid values, missing fields, etc.).
    #[error("FG_ERR_901: Configuration error: {0}")]
    Configuration(String),
}

impl FarmgateError {
    /// `true` for errors where nothing was committed and an identical retry
    /// may succeed. Webhook handlers map these to a retry-later response so
    /// the gateway redelivers; the idempotency guard makes redelivery safe.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FarmgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = FarmgateError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("FG_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn insufficient_stock_display() {
        let err = FarmgateError::InsufficientStock {
            listing_id: ListingId::new(),
            requested: 5,
            available: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains("FG_ERR_302"));
        assert!(msg.contains("requested 5"));
        assert!(msg.contains("available 2"));
    }

    #[test]
    fn payment_conflict_display_names_status() {
        let err = FarmgateError::PaymentStateConflict {
            order_id: OrderId::new(),
            status: PaymentStatus::Failed,
        };
        let msg = format!("{err}");
        assert!(msg.contains("FG_ERR_203"));
        assert!(msg.contains("FAILED"));
    }

    #[test]
    fn only_lock_timeout_is_retriable() {
        assert!(
            FarmgateError::LockTimeout {
                waited_ms: 2000,
                keys: 3
            }
            .is_retriable()
        );
        assert!(
            !FarmgateError::ConstraintViolation {
                constraint: "payments.gateway_order_id"
            }
            .is_retriable()
        );
        assert!(!FarmgateError::OrderNotFound(OrderId::new()).is_retriable());
    }

    #[test]
    fn all_errors_have_fg_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(FarmgateError::InvalidOrder {
                reason: "empty cart".into(),
            }),
            Box::new(FarmgateError::ListingInactive(ListingId::new())),
            Box::new(FarmgateError::LockTimeout {
                waited_ms: 100,
                keys: 1,
            }),
            Box::new(FarmgateError::Internal("test".into())),
            Box::new(FarmgateError::LedgerDivergence {
                listing_id: ListingId::new(),
                counter: 5,
                ledger: 7,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("FG_ERR_"),
                "Error missing FG_ERR_ prefix: {msg}"
            );
        }
    }
}
