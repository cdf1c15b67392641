//! Payment attempt records and the payment state machine.
//!
//! One [`Payment`] row exists per gateway checkout attempt. An order may
//! accumulate several rows (the customer retried a failed or abandoned
//! attempt), but at most one of them ever reaches [`PaymentStatus::Success`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{FarmgateError, OrderId, PaymentId, Result};

/// Lifecycle status of a payment attempt (and, mirrored, of an order's
/// overall payment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    RefundRequested,
    Refunded,
}

impl PaymentStatus {
    /// Allowed transitions. Refund states are reachable but the reversal
    /// flow itself lives outside this crate.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Success | Self::Failed)
                | (Self::Success, Self::RefundRequested)
                | (Self::RefundRequested, Self::Refunded)
        )
    }

    /// `true` once the gateway has given a final answer for this attempt.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending | Self::RefundRequested)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
            Self::RefundRequested => write!(f, "REFUND_REQUESTED"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// A single payment attempt against an order.
///
/// `gateway_order_id` is the gateway's handle for the attempt, minted at
/// checkout time and unique across all payments. Callbacks reference it, so
/// it is the join key between the gateway's world and ours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Gateway label (e.g. "razorpay").
    pub gateway: String,
    /// The gateway's order handle for this attempt. Unique store-wide.
    pub gateway_order_id: String,
    /// The gateway's payment handle, known only after a successful capture.
    pub gateway_payment_id: Option<String>,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Open a fresh PENDING attempt.
    #[must_use]
    pub fn open(
        order_id: OrderId,
        gateway: impl Into<String>,
        gateway_order_id: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            gateway: gateway.into(),
            gateway_order_id: gateway_order_id.into(),
            gateway_payment_id: None,
            amount,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful capture. Only a PENDING attempt may succeed.
    pub fn mark_succeeded(&mut self, gateway_payment_id: impl Into<String>) -> Result<()> {
        if !self.status.can_transition_to(PaymentStatus::Success) {
            return Err(FarmgateError::InvalidPaymentTransition {
                from: self.status,
                to: PaymentStatus::Success,
            });
        }
        self.status = PaymentStatus::Success;
        self.gateway_payment_id = Some(gateway_payment_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a failed or abandoned capture. Only a PENDING attempt may fail.
    pub fn mark_failed(&mut self) -> Result<()> {
        if !self.status.can_transition_to(PaymentStatus::Failed) {
            return Err(FarmgateError::InvalidPaymentTransition {
                from: self.status,
                to: PaymentStatus::Failed,
            });
        }
        self.status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Payment {
        Payment::open(
            OrderId::new(),
            "razorpay",
            "order_RZP001",
            Decimal::new(100, 0),
        )
    }

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", PaymentStatus::Pending), "PENDING");
        assert_eq!(
            format!("{}", PaymentStatus::RefundRequested),
            "REFUND_REQUESTED"
        );
    }

    #[test]
    fn pending_can_resolve_either_way() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Success));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn resolved_states_are_sticky() {
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Success));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn mark_succeeded_sets_gateway_payment_id() {
        let mut p = pending();
        p.mark_succeeded("pay_RZP111").unwrap();
        assert_eq!(p.status, PaymentStatus::Success);
        assert_eq!(p.gateway_payment_id.as_deref(), Some("pay_RZP111"));
    }

    #[test]
    fn mark_succeeded_twice_is_rejected() {
        let mut p = pending();
        p.mark_succeeded("pay_RZP111").unwrap();
        let err = p.mark_succeeded("pay_RZP222").unwrap_err();
        assert!(format!("{err}").contains("FG_ERR_204"));
        // The first capture's handle survives.
        assert_eq!(p.gateway_payment_id.as_deref(), Some("pay_RZP111"));
    }

    #[test]
    fn failed_attempt_cannot_succeed_later() {
        let mut p = pending();
        p.mark_failed().unwrap();
        assert!(p.mark_succeeded("pay_RZP333").is_err());
        assert_eq!(p.status, PaymentStatus::Failed);
    }

    #[test]
    fn payment_serde_roundtrip() {
        let p = pending();
        let json = serde_json::to_string(&p).unwrap();
        let back: Payment = serde_json::from_str(&json).unwrap();
        assert_eq!(p.id, back.id);
        assert_eq!(p.gateway_order_id, back.gateway_order_id);
        assert_eq!(p.amount, back.amount);
    }
}
