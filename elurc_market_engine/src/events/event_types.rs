use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFulfilledEvent {
    pub order: Order,
}

impl OrderFulfilledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when an order is cancelled or times out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
    pub reason: String,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order, reason: &str) -> Self {
        let status = order.status;
        Self { order, status, reason: reason.to_string() }
    }
}

/// Emitted when a payment falls short of the order total by more than the tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyDetectedEvent {
    pub order: Order,
}

impl DiscrepancyDetectedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderPaid(OrderPaidEvent),
    OrderFulfilled(OrderFulfilledEvent),
    OrderAnnulled(OrderAnnulledEvent),
    DiscrepancyDetected(DiscrepancyDetectedEvent),
}
