//! The order status state machine.
//!
//! | from \ to  | pending | paid | processing | fulfilled | cancelled | timeout |
//! |------------|---------|------|------------|-----------|-----------|---------|
//! | pending    |         | ✓    |            |           | ✓         | ✓       |
//! | paid       |         |      | commit     | commit    | ✓         |         |
//! | processing |         |      |            | ✓         | release   |         |
//! | timeout    | ✓       | ✓    |            |           |           |         |
//!
//! Moving a paid order into `processing` or straight to `fulfilled` commits stock. Cancelling a `processing` order
//! releases it again. `fulfilled` and `cancelled` are terminal.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderStatusType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryEffect {
    None,
    /// Decrement stock for every line item.
    Commit,
    /// Return stock for every line item.
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("The order is already {0}. Nothing to do.")]
    NoOp(OrderStatusType),
    #[error("Changing an order from {from} to {to} is not allowed")]
    Forbidden { from: OrderStatusType, to: OrderStatusType },
}

/// A status change that has passed the transition guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub inventory: InventoryEffect,
}

impl StatusTransition {
    pub fn check(from: OrderStatusType, to: OrderStatusType) -> Result<Self, TransitionError> {
        use OrderStatusType::*;
        if from == to {
            return Err(TransitionError::NoOp(from));
        }
        let inventory = match (from, to) {
            (Pending, Paid | Cancelled | Timeout) => InventoryEffect::None,
            (Paid, Processing | Fulfilled) => InventoryEffect::Commit,
            (Paid, Cancelled) => InventoryEffect::None,
            (Processing, Fulfilled) => InventoryEffect::None,
            (Processing, Cancelled) => InventoryEffect::Release,
            // A timed-out order can be reopened, or paid late
            (Timeout, Pending | Paid) => InventoryEffect::None,
            _ => return Err(TransitionError::Forbidden { from, to }),
        };
        Ok(Self { from, to, inventory })
    }
}
