//! Order and line-item types.
//!
//! An [`Order`] is created in `CREATED`/`PENDING` state by checkout and only
//! ever leaves it through the settlement engine: `PAID` on a confirmed
//! capture, `CANCELLED` on a failed one. Fulfillment states beyond `PAID`
//! are driven by pickup agents and community representatives.
//!
//! [`OrderItem`] rows snapshot listing prices at order time and are
//! immutable afterwards, so a farmer repricing produce mid-flight never
//! changes what an already-placed order owes or earns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AddressId, CustomerId, FarmgateError, ListingId, OrderId, OrderItemId, PaymentStatus,
    ProductListing, Result,
};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Paid,
    PickupAssigned,
    PickedUp,
    AtCommunityRep,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Allowed transitions: the happy path advances one hop at a time, and
    /// any non-terminal state may cancel.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Self::Created, Self::Paid)
                | (Self::Paid, Self::PickupAssigned)
                | (Self::PickupAssigned, Self::PickedUp)
                | (Self::PickedUp, Self::AtCommunityRep)
                | (Self::AtCommunityRep, Self::OutForDelivery)
                | (Self::OutForDelivery, Self::Delivered)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Paid => write!(f, "PAID"),
            Self::PickupAssigned => write!(f, "PICKUP_ASSIGNED"),
            Self::PickedUp => write!(f, "PICKED_UP"),
            Self::AtCommunityRep => write!(f, "AT_CR"),
            Self::OutForDelivery => write!(f, "OUT_FOR_DELIVERY"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Core order struct.
///
/// `payment_status` mirrors the resolving [`crate::Payment`] attempt so that
/// order readers never need a join to answer "is this paid?".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    /// Sum of `quantity × unit_price` over the order's items, snapshotted
    /// at checkout.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh order in `CREATED`/`PENDING`, awaiting its first gateway
    /// answer. The id is minted by the caller: checkout claims the order's
    /// row lock before the row exists.
    #[must_use]
    pub fn place(
        id: OrderId,
        customer_id: CustomerId,
        shipping_address_id: AddressId,
        total_amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            customer_id,
            shipping_address_id,
            total_amount,
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// `true` while the order is still waiting on its first final gateway
    /// answer.
    #[must_use]
    pub fn is_awaiting_payment(&self) -> bool {
        self.status == OrderStatus::Created && self.payment_status == PaymentStatus::Pending
    }

    /// Settlement success: CREATED/PENDING becomes PAID/SUCCESS.
    pub fn mark_paid(&mut self) -> Result<()> {
        if !self.status.can_transition_to(OrderStatus::Paid) {
            return Err(FarmgateError::InvalidOrderTransition {
                from: self.status,
                to: OrderStatus::Paid,
            });
        }
        if !self.payment_status.can_transition_to(PaymentStatus::Success) {
            return Err(FarmgateError::InvalidPaymentTransition {
                from: self.payment_status,
                to: PaymentStatus::Success,
            });
        }
        self.status = OrderStatus::Paid;
        self.payment_status = PaymentStatus::Success;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Settlement failure: CREATED/PENDING becomes CANCELLED/FAILED.
    pub fn mark_payment_failed(&mut self) -> Result<()> {
        if self.status != OrderStatus::Created {
            return Err(FarmgateError::InvalidOrderTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }
        if !self.payment_status.can_transition_to(PaymentStatus::Failed) {
            return Err(FarmgateError::InvalidPaymentTransition {
                from: self.payment_status,
                to: PaymentStatus::Failed,
            });
        }
        self.status = OrderStatus::Cancelled;
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fulfillment-side advance (pickup assigned, picked up, ...). Guarded
    /// by the status state machine; settlement states use the dedicated
    /// `mark_*` methods instead.
    pub fn advance_status(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(FarmgateError::InvalidOrderTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// One order line, with prices snapshotted from the listing at order time.
///
/// Immutable once created. `platform_fee` is the per-unit margin
/// (`unit_price − farmer_price`) retained by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub listing_id: ListingId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub farmer_price: Decimal,
    pub platform_fee: Decimal,
}

impl OrderItem {
    /// Snapshot a listing's current prices into a new line item.
    #[must_use]
    pub fn snapshot(order_id: OrderId, listing: &ProductListing, quantity: i64) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            listing_id: listing.id,
            quantity,
            unit_price: listing.price_per_unit,
            farmer_price: listing.farmer_price,
            platform_fee: listing.platform_fee(),
        }
    }

    /// Customer-facing line total: `quantity × unit_price`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Farmer's share of this line: `quantity × farmer_price`.
    #[must_use]
    pub fn farmer_share(&self) -> Decimal {
        self.farmer_price * Decimal::from(self.quantity)
    }

    /// Platform's share of this line: `quantity × platform_fee`.
    #[must_use]
    pub fn fee_total(&self) -> Decimal {
        self.platform_fee * Decimal::from(self.quantity)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_awaiting(total_amount: Decimal) -> Self {
        Self::dummy_awaiting_for(CustomerId::new(), total_amount)
    }

    pub fn dummy_awaiting_for(customer_id: CustomerId, total_amount: Decimal) -> Self {
        Self::place(OrderId::new(), customer_id, AddressId::new(), total_amount)
    }
}
