//! # farmgate-checkout
//!
//! **Order Intake Plane**: cart validation, price snapshotting, and
//! payment attempt registration.
//!
//! ## Architecture
//!
//! Intake sits between the storefront API and the settlement engine:
//! 1. **CheckoutPolicy**: hard gate — validates the cart against intake rules
//! 2. **CheckoutEngine**: turns a validated cart into one atomic write
//!    (Order + items + first PENDING payment attempt)
//!
//! ## Order Flow
//!
//! ```text
//! API → CheckoutPolicy.validate() → CheckoutEngine.place_order()
//!     → Order CREATED/PENDING → gateway checkout → settlement
//! ```
//!
//! Intake never reserves stock. Listing prices are snapshotted into the
//! order's items here, so later repricing cannot change what an order owes
//! or earns; the binding stock decrement happens at settlement.

pub mod engine;
pub mod policy;

pub use engine::{CheckoutEngine, PlaceOrder, PlacedOrder};
pub use policy::{CartLine, CheckoutPolicy};
