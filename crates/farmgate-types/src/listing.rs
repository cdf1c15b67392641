//! Product listings: one farmer's offer of one produce item.
//!
//! `available_qty` is the live stock counter. It only ever decreases through
//! [`ProductListing::try_reserve`], a guarded compare-and-decrement, so the
//! counter can never observe an interleaved read-then-write and go negative.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{FarmgateError, FarmerId, ListingId, Result};

/// A farmer's produce listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: ListingId,
    pub farmer_id: FarmerId,
    /// Produce name as shown to customers (e.g. "Tomato (Hybrid)").
    pub produce_name: String,
    /// Sale unit label (e.g. "kg", "dozen").
    pub unit: String,
    /// Customer-facing price per unit.
    pub price_per_unit: Decimal,
    /// The farm-gate price: what the farmer receives per unit.
    pub farmer_price: Decimal,
    /// Units currently available for sale. Never negative.
    pub available_qty: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductListing {
    #[must_use]
    pub fn new(
        farmer_id: FarmerId,
        produce_name: impl Into<String>,
        unit: impl Into<String>,
        price_per_unit: Decimal,
        farmer_price: Decimal,
        initial_qty: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ListingId::new(),
            farmer_id,
            produce_name: produce_name.into(),
            unit: unit.into(),
            price_per_unit,
            farmer_price,
            available_qty: initial_qty,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Structural validation, run when a listing enters the store.
    pub fn validate(&self) -> Result<()> {
        if self.produce_name.trim().is_empty() {
            return Err(FarmgateError::InvalidListing {
                reason: "produce name is empty".to_string(),
            });
        }
        if self.price_per_unit <= Decimal::ZERO {
            return Err(FarmgateError::InvalidListing {
                reason: format!("price_per_unit must be positive, got {}", self.price_per_unit),
            });
        }
        if self.farmer_price <= Decimal::ZERO || self.farmer_price > self.price_per_unit {
            return Err(FarmgateError::InvalidListing {
                reason: format!(
                    "farmer_price must be in (0, {}], got {}",
                    self.price_per_unit, self.farmer_price
                ),
            });
        }
        if self.available_qty < 0 {
            return Err(FarmgateError::InvalidListing {
                reason: format!("available_qty must be non-negative, got {}", self.available_qty),
            });
        }
        Ok(())
    }

    /// Per-unit margin retained by the platform.
    #[must_use]
    pub fn platform_fee(&self) -> Decimal {
        self.price_per_unit - self.farmer_price
    }

    /// Non-binding availability check. The binding check is
    /// [`Self::try_reserve`], which settlement runs under the listing's
    /// row lock.
    #[must_use]
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        quantity > 0 && self.available_qty >= quantity
    }

    /// Compare-and-decrement: reserve `quantity` units or change nothing.
    pub fn try_reserve(&mut self, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return Err(FarmgateError::InvalidStockDelta {
                listing_id: self.id,
                delta: -quantity,
            });
        }
        if self.available_qty < quantity {
            return Err(FarmgateError::InsufficientStock {
                listing_id: self.id,
                requested: quantity,
                available: self.available_qty,
            });
        }
        self.available_qty -= quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Add harvested stock. The delta must be positive.
    pub fn restock(&mut self, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return Err(FarmgateError::InvalidStockDelta {
                listing_id: self.id,
                delta: quantity,
            });
        }
        self.available_qty += quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Signed manual correction (spoilage write-off, recount). Rejected if
    /// it would drive the counter negative.
    pub fn adjust(&mut self, delta: i64) -> Result<()> {
        if delta == 0 {
            return Err(FarmgateError::InvalidStockDelta {
                listing_id: self.id,
                delta,
            });
        }
        let would_be = self.available_qty + delta;
        if would_be < 0 {
            return Err(FarmgateError::NegativeStock {
                listing_id: self.id,
                would_be,
            });
        }
        self.available_qty = would_be;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Change both prices together. Already-placed orders are unaffected:
    /// their items carry snapshots.
    pub fn reprice(&mut self, price_per_unit: Decimal, farmer_price: Decimal) -> Result<()> {
        if price_per_unit <= Decimal::ZERO
            || farmer_price <= Decimal::ZERO
            || farmer_price > price_per_unit
        {
            return Err(FarmgateError::InvalidListing {
                reason: format!(
                    "reprice must keep 0 < farmer_price <= price_per_unit, got {farmer_price}/{price_per_unit}"
                ),
            });
        }
        self.price_per_unit = price_per_unit;
        self.farmer_price = farmer_price;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Display for ProductListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Listing[{}] {} @ {}/{} ({} left)",
            self.id, self.produce_name, self.price_per_unit, self.unit, self.available_qty,
        )
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl ProductListing {
    pub fn dummy_priced(price_per_unit: Decimal, farmer_price: Decimal, qty: i64) -> Self {
        Self::new(
            FarmerId::new(),
            "Tomato (Hybrid)",
            "kg",
            price_per_unit,
            farmer_price,
            qty,
        )
    }

    pub fn dummy_for_farmer(farmer_id: FarmerId, qty: i64) -> Self {
        Self::new(
            farmer_id,
            "Okra",
            "kg",
            Decimal::new(50, 0),
            Decimal::new(40, 0),
            qty,
        )
    }
}
