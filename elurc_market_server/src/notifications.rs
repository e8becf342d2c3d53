//! Customer and back-office notifications.
//!
//! Lifecycle events from the order flow engine are turned into [`Notification`]s and handed to a
//! [`NotificationSink`]. The sink is the seam to the transactional email provider. The server ships with
//! [`LogSink`], which writes each notification to the log.
//!
//! | Event                 | Recipient       | Notification           |
//! |-----------------------|-----------------|------------------------|
//! | OrderCreated          | customer wallet | `OrderConfirmation`    |
//! | OrderPaid             | customer wallet | `PaymentReceived`      |
//! | OrderFulfilled        | customer wallet | `OrderShipped`         |
//! | OrderAnnulled         | customer wallet | `OrderCancelled`       |
//! | DiscrepancyDetected   | back office     | `PaymentReviewNeeded`  |
use std::{fmt::Display, sync::Arc};

use elurc_market_engine::{
    db_types::{Order, OrderStatusType},
    events::{EventHandlers, EventHooks},
};
use futures::future::BoxFuture;
use log::*;
use serde::Serialize;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;
pub const BACK_OFFICE_RECIPIENT: &str = "back-office";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum Notification {
    OrderConfirmation { order_number: String, amount: String },
    PaymentReceived { order_number: String },
    OrderShipped { order_number: String },
    OrderCancelled { order_number: String, timed_out: bool, reason: String },
    PaymentReviewNeeded { order_number: String, shortfall: String },
}

impl Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::OrderConfirmation { order_number, amount } => {
                write!(f, "Order {order_number} received. Please send {amount} to complete it.")
            },
            Notification::PaymentReceived { order_number } => write!(f, "Payment for order {order_number} received."),
            Notification::OrderShipped { order_number } => write!(f, "Order {order_number} is on its way."),
            Notification::OrderCancelled { order_number, timed_out: true, .. } => {
                write!(f, "Order {order_number} expired before a payment arrived.")
            },
            Notification::OrderCancelled { order_number, reason, .. } => {
                write!(f, "Order {order_number} was cancelled. {reason}")
            },
            Notification::PaymentReviewNeeded { order_number, shortfall } => {
                write!(f, "Order {order_number} was underpaid by {shortfall} and needs a decision.")
            },
        }
    }
}

/// Delivers notifications. Implementations must not block, since they run on the event handler tasks.
pub trait NotificationSink: Send + Sync {
    fn send(&self, to: &str, notification: Notification);
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, to: &str, notification: Notification) {
        info!("📬️ To {to}: {notification}");
    }
}

/// Wires every lifecycle event to the sink.
pub fn create_notification_handlers(sink: Arc<dyn NotificationSink>) -> EventHandlers {
    let mut hooks = EventHooks::default();
    let s = Arc::clone(&sink);
    hooks.on_order_created(move |ev| {
        let notification = Notification::OrderConfirmation {
            order_number: ev.order.order_number.clone(),
            amount: ev.order.amount_elurc.to_string(),
        };
        deliver(&s, &ev.order.customer_wallet, notification)
    });
    let s = Arc::clone(&sink);
    hooks.on_order_paid(move |ev| {
        let notification = Notification::PaymentReceived { order_number: ev.order.order_number.clone() };
        deliver(&s, &ev.order.customer_wallet, notification)
    });
    let s = Arc::clone(&sink);
    hooks.on_order_fulfilled(move |ev| {
        let notification = Notification::OrderShipped { order_number: ev.order.order_number.clone() };
        deliver(&s, &ev.order.customer_wallet, notification)
    });
    let s = Arc::clone(&sink);
    hooks.on_order_annulled(move |ev| {
        let notification = Notification::OrderCancelled {
            order_number: ev.order.order_number.clone(),
            timed_out: ev.status == OrderStatusType::Timeout,
            reason: ev.reason,
        };
        deliver(&s, &ev.order.customer_wallet, notification)
    });
    hooks.on_discrepancy_detected(move |ev| {
        let notification = review_notification(&ev.order);
        deliver(&sink, BACK_OFFICE_RECIPIENT, notification)
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}

fn review_notification(order: &Order) -> Notification {
    Notification::PaymentReviewNeeded {
        order_number: order.order_number.clone(),
        shortfall: order.payment_discrepancy.difference_amount.to_string(),
    }
}

fn deliver(sink: &Arc<dyn NotificationSink>, to: &str, notification: Notification) -> BoxFuture<'static, ()> {
    let sink = Arc::clone(sink);
    let to = to.to_string();
    Box::pin(async move {
        trace!("📬️ Delivering {notification:?} to {to}");
        sink.send(&to, notification);
    })
}
