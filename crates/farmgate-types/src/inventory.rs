//! The inventory ledger: an append-only audit trail of stock movement.
//!
//! Every change to a listing's `available_qty` writes one
//! [`InventoryTransaction`] in the same store transaction, so the ledger
//! replays to the live counter exactly: for any listing,
//! `Σ(delta) == available_qty`. The reconciler in the settlement crate
//! checks this equality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InventoryTxnId, ListingId, OrderId};

/// Why a listing's stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum InventoryReason {
    /// Settlement reserved stock for a paid order. Delta is negative.
    OrderReserve,
    /// The farmer added harvested stock. Delta is positive.
    Restock,
    /// Manual correction (spoilage, recount). Delta is signed.
    Adjustment,
}

impl InventoryReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderReserve => "ORDER_RESERVE",
            Self::Restock => "RESTOCK",
            Self::Adjustment => "ADJUSTMENT",
        }
    }
}

impl std::fmt::Display for InventoryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable stock-movement row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: InventoryTxnId,
    pub listing_id: ListingId,
    /// Set for ORDER_RESERVE rows; restocks and adjustments carry none.
    pub order_id: Option<OrderId>,
    /// Signed stock movement. Negative for reservations.
    pub delta: i64,
    pub reason: InventoryReason,
    pub recorded_at: DateTime<Utc>,
}

impl InventoryTransaction {
    /// Reservation row for a settled order line. The id is derived from the
    /// (order, listing, reason) key, so replaying the same settlement
    /// produces a colliding id rather than a second row.
    #[must_use]
    pub fn order_reserve(order_id: OrderId, listing_id: ListingId, quantity: i64) -> Self {
        let reason = InventoryReason::OrderReserve;
        Self {
            id: InventoryTxnId::derived(order_id, listing_id, reason.as_str()),
            listing_id,
            order_id: Some(order_id),
            delta: -quantity,
            reason,
            recorded_at: Utc::now(),
        }
    }

    /// Restock row. Freshly-minted id; a farmer may restock the same listing
    /// any number of times.
    #[must_use]
    pub fn restock(listing_id: ListingId, quantity: i64) -> Self {
        Self {
            id: InventoryTxnId::new(),
            listing_id,
            order_id: None,
            delta: quantity,
            reason: InventoryReason::Restock,
            recorded_at: Utc::now(),
        }
    }

    /// Manual adjustment row with a signed delta.
    #[must_use]
    pub fn adjustment(listing_id: ListingId, delta: i64) -> Self {
        Self {
            id: InventoryTxnId::new(),
            listing_id,
            order_id: None,
            delta,
            reason: InventoryReason::Adjustment,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_reservation(&self) -> bool {
        self.reason == InventoryReason::OrderReserve
    }
}

impl std::fmt::Display for InventoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "InvTxn[{}] listing={} delta={:+} {}",
            self.id, self.listing_id, self.delta, self.reason,
        )
    }
}
