//! System-wide constants for the Farmgate settlement core.

/// Default deadline for claiming a transaction's row locks (milliseconds).
pub const DEFAULT_LOCK_WAIT_MS: u64 = 2_000;

/// Maximum distinct line items in a single order (default).
pub const DEFAULT_MAX_LINES_PER_ORDER: usize = 25;

/// Maximum units of one listing in a single order line (default).
pub const DEFAULT_MAX_QTY_PER_LINE: i64 = 1_000;

/// Maximum gateway payment attempts per order before intake refuses more.
pub const DEFAULT_MAX_PAYMENT_ATTEMPTS: usize = 5;

/// Default payment gateway label.
pub const DEFAULT_GATEWAY: &str = "razorpay";

/// Decimal places carried on money amounts (INR paise).
pub const MONEY_PRECISION: u32 = 2;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Farmgate";
