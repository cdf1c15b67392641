//! Farmer earnings records.
//!
//! One [`Earning`] row per settled order line. Created PENDING by the
//! settlement engine, flipped to PAID by the payout cycle. The
//! one-row-per-item convention keeps line-level attribution for farmer
//! dashboards and doubles as a settlement double-application tripwire
//! (the store holds a unique index on `order_item_id`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EarningId, FarmerId, FarmgateError, OrderId, OrderItem, Result};

/// Payout status of an earnings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EarningStatus {
    Pending,
    Paid,
}

impl std::fmt::Display for EarningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

/// Money owed to a farmer for one settled order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earning {
    pub id: EarningId,
    pub order_id: OrderId,
    pub order_item_id: crate::OrderItemId,
    pub farmer_id: FarmerId,
    /// `farmer_price × quantity` for the settled line.
    pub amount: Decimal,
    pub status: EarningStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Earning {
    /// Build the PENDING earnings row for a settled line item.
    #[must_use]
    pub fn for_item(item: &OrderItem, farmer_id: FarmerId) -> Self {
        Self {
            id: EarningId::new(),
            order_id: item.order_id,
            order_item_id: item.id,
            farmer_id,
            amount: item.farmer_share(),
            status: EarningStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    /// Payout: PENDING becomes PAID exactly once.
    pub fn mark_paid(&mut self) -> Result<()> {
        if self.status != EarningStatus::Pending {
            return Err(FarmgateError::InvalidEarningTransition {
                earning_id: self.id,
                from: self.status,
            });
        }
        self.status = EarningStatus::Paid;
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == EarningStatus::Pending
    }
}
