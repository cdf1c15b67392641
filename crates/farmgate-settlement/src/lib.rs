//! # farmgate-settlement
//!
//! **Settlement Plane**: atomic payment settlement, stock reservation,
//! earnings creation, payout cycles, and ledger reconciliation.
//!
//! ## Architecture
//!
//! The Settlement Plane receives a gateway verdict from the webhook layer
//! and:
//! 1. Classifies it against persisted state (no double-settlement)
//! 2. Verifies the captured amount against the order total
//! 3. Compare-and-decrements stock for every order line, ledgering each
//!    reservation
//! 4. Flips the payment and order, creates one PENDING earning per line,
//!    and spawns the pickup job
//! 5. Commits everything in one store transaction
//!
//! ## Settlement Flow
//!
//! ```text
//! gateway webhook ──▶ SettlementEngine ──▶ Store (one transaction)
//!                       │ success: reserve stock, PAID, earnings, pickup
//!                       │ failure: FAILED, CANCELLED
//!                       └ duplicate: AlreadyProcessed, zero writes
//!
//! PayoutCycle     ──▶ PENDING earnings ──▶ PAID
//! StockReconciler ──▶ counter == Σ ledger deltas, per listing
//! ```

pub mod earnings;
pub mod engine;
pub mod idempotency;
pub mod payout;
pub mod reconciliation;

pub use earnings::EarningsSplit;
pub use engine::{
    PaymentConfirmation, PaymentFailure, SettlementEngine, SettlementOutcome, SettlementReport,
};
pub use payout::{PayoutCycle, PayoutSummary};
pub use reconciliation::StockReconciler;
