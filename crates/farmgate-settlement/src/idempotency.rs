//! Settlement idempotency guard — derived from persisted payment state.
//!
//! Payment gateways redeliver callbacks: timeouts, at-least-once queues,
//! manual operator replays. Each delivery may carry a fresh correlation
//! token, so no token cache can recognize a duplicate. Durable idempotency
//! derives from the Order/Payment rows instead: a delivery whose effects are
//! already persisted classifies as [`Disposition::AlreadyProcessed`], and a
//! delivery that contradicts persisted state is an error, never a silent
//! skip.
//!
//! Classification runs inside the same store transaction that would apply
//! the effects, under the order's row lock. Running it anywhere weaker
//! reopens the duplicate-delivery race it exists to close.

use farmgate_types::{FarmgateError, Order, Payment, PaymentStatus, Result};

/// What to do with a gateway callback, given persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// First delivery: apply the full effect set.
    Proceed,
    /// The effects of this delivery are already persisted. Apply nothing.
    AlreadyProcessed,
}

/// Classify a success callback against the order and the payment attempt
/// the callback names.
///
/// # Errors
/// Returns `PaymentStateConflict` when the callback contradicts persisted
/// state: the order settled through a different attempt, the order was
/// already cancelled, this attempt already failed, or a refund is in flight.
pub fn classify_success(order: &Order, payment: &Payment) -> Result<Disposition> {
    // This exact attempt already settled: a redelivery.
    if payment.status == PaymentStatus::Success {
        return Ok(Disposition::AlreadyProcessed);
    }
    // The order settled through a different attempt. A second capture is a
    // double charge, not a duplicate.
    if order.payment_status == PaymentStatus::Success {
        return Err(conflict(order, order.payment_status));
    }
    // The order was already cancelled, or a refund is in flight.
    if order.payment_status != PaymentStatus::Pending {
        return Err(conflict(order, order.payment_status));
    }
    // This attempt was recorded FAILED and the gateway now claims success.
    if payment.status == PaymentStatus::Failed {
        return Err(conflict(order, payment.status));
    }
    Ok(Disposition::Proceed)
}

/// Classify a failure callback against the order and the payment attempt
/// the callback names.
///
/// # Errors
/// Returns `PaymentStateConflict` when the order settled successfully: a
/// late failure signal must never un-settle an order.
pub fn classify_failure(order: &Order, payment: &Payment) -> Result<Disposition> {
    // This exact attempt already failed: a redelivery.
    if payment.status == PaymentStatus::Failed {
        return Ok(Disposition::AlreadyProcessed);
    }
    if order.payment_status == PaymentStatus::Success {
        return Err(conflict(order, order.payment_status));
    }
    // The order was already cancelled through another attempt; this
    // attempt is moot.
    if order.payment_status == PaymentStatus::Failed {
        return Ok(Disposition::AlreadyProcessed);
    }
    if order.payment_status != PaymentStatus::Pending {
        return Err(conflict(order, order.payment_status));
    }
    Ok(Disposition::Proceed)
}

fn conflict(order: &Order, status: PaymentStatus) -> FarmgateError {
    FarmgateError::PaymentStateConflict {
        order_id: order.id,
        status,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn awaiting() -> (Order, Payment) {
        let order = Order::dummy_awaiting(Decimal::new(100, 0));
        let payment = Payment::open(order.id, "razorpay", "order_RZP001", order.total_amount);
        (order, payment)
    }

    #[test]
    fn fresh_success_proceeds() {
        let (order, payment) = awaiting();
        assert_eq!(
            classify_success(&order, &payment).unwrap(),
            Disposition::Proceed
        );
    }

    #[test]
    fn redelivered_success_is_already_processed() {
        let (mut order, mut payment) = awaiting();
        payment.mark_succeeded("pay_RZP111").unwrap();
        order.mark_paid().unwrap();
        assert_eq!(
            classify_success(&order, &payment).unwrap(),
            Disposition::AlreadyProcessed
        );
    }

    #[test]
    fn success_for_superseded_attempt_conflicts() {
        // The order settled through attempt B; a capture now lands on the
        // still-pending attempt A.
        let (mut order, attempt_a) = awaiting();
        order.mark_paid().unwrap();
        let err = classify_success(&order, &attempt_a).unwrap_err();
        assert!(matches!(err, FarmgateError::PaymentStateConflict { .. }));
    }

    #[test]
    fn success_after_cancellation_conflicts() {
        let (mut order, mut payment) = awaiting();
        payment.mark_failed().unwrap();
        order.mark_payment_failed().unwrap();
        let err = classify_success(&order, &payment).unwrap_err();
        assert!(format!("{err}").contains("FG_ERR_203"));
    }

    #[test]
    fn success_for_failed_attempt_on_live_order_conflicts() {
        // Attempt A failed but the order still awaits attempt B; the gateway
        // then claims A succeeded after all.
        let (order, mut attempt_a) = awaiting();
        attempt_a.mark_failed().unwrap();
        let err = classify_success(&order, &attempt_a).unwrap_err();
        assert!(matches!(
            err,
            FarmgateError::PaymentStateConflict {
                status: PaymentStatus::Failed,
                ..
            }
        ));
    }

    #[test]
    fn fresh_failure_proceeds() {
        let (order, payment) = awaiting();
        assert_eq!(
            classify_failure(&order, &payment).unwrap(),
            Disposition::Proceed
        );
    }

    #[test]
    fn redelivered_failure_is_already_processed() {
        let (mut order, mut payment) = awaiting();
        payment.mark_failed().unwrap();
        order.mark_payment_failed().unwrap();
        assert_eq!(
            classify_failure(&order, &payment).unwrap(),
            Disposition::AlreadyProcessed
        );
    }

    #[test]
    fn failure_after_success_conflicts() {
        let (mut order, mut payment) = awaiting();
        payment.mark_succeeded("pay_RZP111").unwrap();
        order.mark_paid().unwrap();
        let err = classify_failure(&order, &payment).unwrap_err();
        assert!(matches!(
            err,
            FarmgateError::PaymentStateConflict {
                status: PaymentStatus::Success,
                ..
            }
        ));
    }

    #[test]
    fn failure_for_moot_attempt_is_already_processed() {
        // The order was cancelled when attempt B failed; a failure for the
        // abandoned attempt A changes nothing.
        let (mut order, attempt_a) = awaiting();
        order.mark_payment_failed().unwrap();
        assert_eq!(
            classify_failure(&order, &attempt_a).unwrap(),
            Disposition::AlreadyProcessed
        );
    }
}
