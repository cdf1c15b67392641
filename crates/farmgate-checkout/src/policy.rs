//! Checkout policy — hard gate for cart validation.
//!
//! The policy screens every cart before any store transaction opens. It is
//! stateless and fail-closed: a cart that breaks any rule never reaches the
//! pricing or payment stages, so no lock is claimed and no row is written
//! for it.

use std::collections::HashSet;

use farmgate_types::{CheckoutConfig, FarmgateError, ListingId, Result};

/// One requested cart line: a listing and how many units of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub listing_id: ListingId,
    pub quantity: i64,
}

impl CartLine {
    #[must_use]
    pub fn new(listing_id: ListingId, quantity: i64) -> Self {
        Self {
            listing_id,
            quantity,
        }
    }
}

/// Hard validation gate that every cart passes before an order is created.
pub struct CheckoutPolicy {
    /// Maximum distinct lines per order.
    max_lines_per_order: usize,
    /// Maximum units of one listing per line.
    max_qty_per_line: i64,
}

impl CheckoutPolicy {
    #[must_use]
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            max_lines_per_order: config.max_lines_per_order,
            max_qty_per_line: config.max_qty_per_line,
        }
    }

    /// Validate a cart against all intake rules.
    ///
    /// # Errors
    /// Returns `InvalidOrder` naming the first rule the cart breaks.
    pub fn validate(&self, lines: &[CartLine]) -> Result<()> {
        // 1. Empty carts place nothing.
        if lines.is_empty() {
            return Err(FarmgateError::InvalidOrder {
                reason: "cart is empty".to_string(),
            });
        }

        // 2. Line-count cap.
        if lines.len() > self.max_lines_per_order {
            return Err(FarmgateError::InvalidOrder {
                reason: format!(
                    "cart has {} lines, maximum is {}",
                    lines.len(),
                    self.max_lines_per_order,
                ),
            });
        }

        // 3. Per-line quantity checks.
        for line in lines {
            if line.quantity <= 0 {
                return Err(FarmgateError::InvalidOrder {
                    reason: format!(
                        "quantity {} for listing {} must be positive",
                        line.quantity, line.listing_id,
                    ),
                });
            }
            if line.quantity > self.max_qty_per_line {
                return Err(FarmgateError::InvalidOrder {
                    reason: format!(
                        "quantity {} for listing {} exceeds per-line maximum {}",
                        line.quantity, line.listing_id, self.max_qty_per_line,
                    ),
                });
            }
        }

        // 4. One line per listing. This keeps the lock set and the
        //    reservation math one-to-one with listings.
        let mut seen: HashSet<ListingId> = HashSet::new();
        for line in lines {
            if !seen.insert(line.listing_id) {
                return Err(FarmgateError::InvalidOrder {
                    reason: format!("listing {} appears more than once", line.listing_id),
                });
            }
        }

        Ok(())
    }
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self::new(&CheckoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_lines: usize, max_qty: i64) -> CheckoutPolicy {
        CheckoutPolicy::new(&CheckoutConfig {
            max_lines_per_order: max_lines,
            max_qty_per_line: max_qty,
            ..CheckoutConfig::default()
        })
    }

    #[test]
    fn valid_cart_passes() {
        let lines = vec![
            CartLine::new(ListingId::new(), 2),
            CartLine::new(ListingId::new(), 5),
        ];
        assert!(CheckoutPolicy::default().validate(&lines).is_ok());
    }

    #[test]
    fn empty_cart_rejected() {
        let err = CheckoutPolicy::default().validate(&[]).unwrap_err();
        assert!(matches!(err, FarmgateError::InvalidOrder { .. }));
    }

    #[test]
    fn too_many_lines_rejected() {
        let lines: Vec<CartLine> = (0..3).map(|_| CartLine::new(ListingId::new(), 1)).collect();
        let err = policy(2, 100).validate(&lines).unwrap_err();
        assert!(format!("{err}").contains("maximum is 2"));
    }

    #[test]
    fn zero_quantity_rejected() {
        let lines = vec![CartLine::new(ListingId::new(), 0)];
        let err = CheckoutPolicy::default().validate(&lines).unwrap_err();
        assert!(format!("{err}").contains("must be positive"));
    }

    #[test]
    fn negative_quantity_rejected() {
        let lines = vec![CartLine::new(ListingId::new(), -3)];
        assert!(CheckoutPolicy::default().validate(&lines).is_err());
    }

    #[test]
    fn oversized_line_rejected() {
        let lines = vec![CartLine::new(ListingId::new(), 11)];
        let err = policy(25, 10).validate(&lines).unwrap_err();
        assert!(format!("{err}").contains("per-line maximum 10"));
    }

    #[test]
    fn duplicate_listing_rejected() {
        let listing_id = ListingId::new();
        let lines = vec![
            CartLine::new(listing_id, 1),
            CartLine::new(ListingId::new(), 1),
            CartLine::new(listing_id, 2),
        ];
        let err = CheckoutPolicy::default().validate(&lines).unwrap_err();
        assert!(format!("{err}").contains("more than once"));
    }
}
