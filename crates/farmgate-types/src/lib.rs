//! # farmgate-types
//!
//! Shared types, errors, and configuration for the **Farmgate** settlement
//! core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`CustomerId`], [`FarmerId`], [`ListingId`], [`PaymentId`], [`EarningId`], [`InventoryTxnId`], [`PickupJobId`], [`CorrelationId`]
//! - **Order model**: [`Order`], [`OrderItem`], [`OrderStatus`]
//! - **Catalog model**: [`ProductListing`]
//! - **Payment model**: [`Payment`], [`PaymentStatus`]
//! - **Earnings model**: [`Earning`], [`EarningStatus`]
//! - **Inventory ledger**: [`InventoryTransaction`], [`InventoryReason`]
//! - **Pickup model**: [`PickupJob`], [`PickupStatus`]
//! - **Configuration**: [`StoreConfig`], [`CheckoutConfig`]
//! - **Errors**: [`FarmgateError`] with `FG_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod earning;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod listing;
pub mod order;
pub mod payment;
pub mod pickup;

// Re-export all primary types at crate root for ergonomic imports:
//   use farmgate_types::{Order, OrderItem, Payment, ProductListing, ...};

pub use config::*;
pub use earning::*;
pub use error::*;
pub use ids::*;
pub use inventory::*;
pub use listing::*;
pub use order::*;
pub use payment::*;
pub use pickup::*;

// Constants are accessed via `farmgate_types::constants::FOO`
// (not re-exported to avoid name collisions).
