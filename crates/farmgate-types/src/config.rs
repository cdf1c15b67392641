//! Configuration types for the store and the checkout plane.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{constants, FarmgateError, Result};

/// Configuration for the transactional store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Deadline for claiming a transaction's full lock set, in milliseconds.
    /// Exceeding it fails the transaction with `FG_ERR_700` and commits
    /// nothing.
    pub lock_wait_ms: u64,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lock_wait_ms == 0 {
            return Err(FarmgateError::Configuration(
                "lock_wait_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: constants::DEFAULT_LOCK_WAIT_MS,
        }
    }
}

/// Configuration for the checkout / order-intake plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Gateway label stamped on payment attempts (e.g. "razorpay").
    pub gateway: String,
    /// Maximum distinct line items per order.
    pub max_lines_per_order: usize,
    /// Maximum units of one listing per line.
    pub max_qty_per_line: i64,
    /// Maximum gateway attempts per order before intake refuses more.
    pub max_payment_attempts: usize,
}

impl CheckoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gateway.trim().is_empty() {
            return Err(FarmgateError::Configuration(
                "gateway label must not be empty".to_string(),
            ));
        }
        if self.max_lines_per_order == 0 {
            return Err(FarmgateError::Configuration(
                "max_lines_per_order must be positive".to_string(),
            ));
        }
        if self.max_qty_per_line <= 0 {
            return Err(FarmgateError::Configuration(
                "max_qty_per_line must be positive".to_string(),
            ));
        }
        if self.max_payment_attempts == 0 {
            return Err(FarmgateError::Configuration(
                "max_payment_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            gateway: constants::DEFAULT_GATEWAY.to_string(),
            max_lines_per_order: constants::DEFAULT_MAX_LINES_PER_ORDER,
            max_qty_per_line: constants::DEFAULT_MAX_QTY_PER_LINE,
            max_payment_attempts: constants::DEFAULT_MAX_PAYMENT_ATTEMPTS,
        }
    }
}
