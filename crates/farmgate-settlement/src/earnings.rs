//! Earnings and platform-fee math over an order's line items.
//!
//! The amounts come straight from the items' snapshotted prices, so the
//! split an order settles at is exactly the split the customer checked out
//! at, whatever the listings say today.

use farmgate_types::OrderItem;
use rust_decimal::Decimal;

/// How an order's gross amount divides between farmers and the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsSplit {
    /// Σ `farmer_price × quantity` over the items.
    pub farmer_total: Decimal,
    /// Σ `platform_fee × quantity` over the items.
    pub platform_total: Decimal,
    /// Σ `unit_price × quantity`; always `farmer_total + platform_total`.
    pub gross: Decimal,
}

/// Compute the farmer/platform split for a set of order items.
#[must_use]
pub fn split(items: &[OrderItem]) -> EarningsSplit {
    let farmer_total = items.iter().map(OrderItem::farmer_share).sum();
    let platform_total = items.iter().map(OrderItem::fee_total).sum();
    let gross = items.iter().map(OrderItem::line_total).sum();
    EarningsSplit {
        farmer_total,
        platform_total,
        gross,
    }
}

/// Total owed to farmers for these items.
#[must_use]
pub fn total_farmer_earnings(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::farmer_share).sum()
}

#[cfg(test)]
mod tests {
    use farmgate_types::{OrderId, ProductListing};

    use super::*;

    fn item(price: i64, farmer_price: i64, qty: i64) -> OrderItem {
        let listing = ProductListing::dummy_priced(
            Decimal::new(price, 0),
            Decimal::new(farmer_price, 0),
            1_000,
        );
        OrderItem::snapshot(OrderId::new(), &listing, qty)
    }

    #[test]
    fn worked_example() {
        // unit_price 50, farmer_price 40, quantity 2.
        let items = vec![item(50, 40, 2)];
        assert_eq!(total_farmer_earnings(&items), Decimal::new(80, 0));
        let split = split(&items);
        assert_eq!(split.farmer_total, Decimal::new(80, 0));
        assert_eq!(split.platform_total, Decimal::new(20, 0));
        assert_eq!(split.gross, Decimal::new(100, 0));
    }

    #[test]
    fn split_sums_across_items() {
        let items = vec![item(50, 40, 2), item(30, 22, 3)];
        let split = split(&items);
        assert_eq!(split.farmer_total, Decimal::new(146, 0));
        assert_eq!(split.gross, Decimal::new(190, 0));
        assert_eq!(split.farmer_total + split.platform_total, split.gross);
    }

    #[test]
    fn empty_items_split_to_zero() {
        let split = split(&[]);
        assert_eq!(split.farmer_total, Decimal::ZERO);
        assert_eq!(split.gross, Decimal::ZERO);
    }

    #[test]
    fn fractional_prices_stay_exact() {
        // 12.50 each for the farmer, 3 units.
        let listing = ProductListing::dummy_priced(
            Decimal::new(1575, 2),
            Decimal::new(1250, 2),
            1_000,
        );
        let items = vec![OrderItem::snapshot(OrderId::new(), &listing, 3)];
        assert_eq!(total_farmer_earnings(&items), Decimal::new(3750, 2));
        assert_eq!(split(&items).gross, Decimal::new(4725, 2));
    }
}
