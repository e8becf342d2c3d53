//! Waits for an order to be paid by polling its status endpoint.
//!
//! The storefront has no push channel to the customer, so after checkout the client asks the server for the order
//! status at a fixed interval until the order leaves `pending`, an underpayment puts it on hold, or the client gives
//! up.
use std::time::Duration;

use anyhow::Result;
use elurc_market_engine::{
    db_types::{OrderId, OrderStatusType},
    order_objects::OrderStatusSummary,
};
use log::*;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::client::MarketClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Anything that can report the current status of an order.
#[allow(async_fn_in_trait)]
pub trait StatusSource {
    /// `Ok(None)` means the order does not exist.
    async fn fetch_status(&self, order_id: &OrderId) -> Result<Option<OrderStatusSummary>>;
}

impl StatusSource for MarketClient {
    async fn fetch_status(&self, order_id: &OrderId) -> Result<Option<OrderStatusSummary>> {
        self.order_status(order_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The order is paid. It may already have moved on to processing or fulfilment.
    Paid(OrderStatusSummary),
    Cancelled(OrderStatusSummary),
    /// The payment window closed before a payment arrived.
    TimedOut(OrderStatusSummary),
    /// A payment arrived but fell short, and the order waits for an admin decision.
    UnderReview(OrderStatusSummary),
    NotFound,
    /// The poller gave up before the order left the payable state.
    Deadline,
}

pub struct PaymentPoller<S> {
    source: S,
    interval: Duration,
    deadline: Duration,
}

impl<S: StatusSource> PaymentPoller<S> {
    pub fn new(source: S) -> Self {
        Self { source, interval: DEFAULT_POLL_INTERVAL, deadline: DEFAULT_POLL_DEADLINE }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Polls until the order reaches an outcome. Errors fetching the status are logged and the poll is retried on
    /// the next tick.
    pub async fn wait_for_payment(&self, order_id: &OrderId) -> PollOutcome {
        let started = Instant::now();
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            match self.source.fetch_status(order_id).await {
                Ok(Some(summary)) => {
                    trace!("⏳️ Order {order_id} is {}", summary.status);
                    if let Some(outcome) = classify(summary) {
                        return outcome;
                    }
                },
                Ok(None) => {
                    warn!("⏳️ Order {order_id} does not exist");
                    return PollOutcome::NotFound;
                },
                Err(e) => warn!("⏳️ Could not fetch the status of order {order_id}. Will retry. {e}"),
            }
            if started.elapsed() >= self.deadline {
                info!("⏳️ Gave up waiting for payment of order {order_id} after {:?}", self.deadline);
                return PollOutcome::Deadline;
            }
        }
    }
}

fn classify(summary: OrderStatusSummary) -> Option<PollOutcome> {
    match summary.status {
        OrderStatusType::Paid | OrderStatusType::Processing | OrderStatusType::Fulfilled => {
            Some(PollOutcome::Paid(summary))
        },
        OrderStatusType::Cancelled => Some(PollOutcome::Cancelled(summary)),
        OrderStatusType::Timeout => Some(PollOutcome::TimedOut(summary)),
        OrderStatusType::Pending if summary.awaiting_review => Some(PollOutcome::UnderReview(summary)),
        OrderStatusType::Pending => None,
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use anyhow::anyhow;
    use chrono::Utc;
    use elurc_common::Lamports;
    use elurc_market_engine::db_types::PaymentDiscrepancy;

    use super::*;

    type Reply = Result<Option<OrderStatusSummary>>;

    /// Replays a fixed list of replies, then reports `pending` forever.
    struct ScriptedSource {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Reply>) -> Self {
            Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self, _order_id: &OrderId) -> Result<Option<OrderStatusSummary>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Some(summary(OrderStatusType::Pending, false))))
        }
    }

    fn summary(status: OrderStatusType, awaiting_review: bool) -> OrderStatusSummary {
        OrderStatusSummary {
            order_id: OrderId::from("ord-1"),
            order_number: "ELR-20240309-K3J9QX".into(),
            status,
            amount_elurc: Lamports::from(4_000_000),
            transaction_signature: None,
            paid_at: None,
            awaiting_review,
            payment_discrepancy: PaymentDiscrepancy::default(),
            updated_at: Utc::now(),
        }
    }

    fn scripted_poller(replies: Vec<Reply>) -> PaymentPoller<ScriptedSource> {
        PaymentPoller::new(ScriptedSource::new(replies))
            .with_interval(Duration::from_secs(1))
            .with_deadline(Duration::from_secs(10))
    }

    fn pending() -> Reply {
        Ok(Some(summary(OrderStatusType::Pending, false)))
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_paid() {
        let poller = scripted_poller(vec![pending(), pending(), Ok(Some(summary(OrderStatusType::Paid, false)))]);
        let outcome = poller.wait_for_payment(&OrderId::from("ord-1")).await;
        assert!(matches!(outcome, PollOutcome::Paid(s) if s.status == OrderStatusType::Paid));
        assert_eq!(poller.source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn later_statuses_count_as_paid() {
        let poller = scripted_poller(vec![Ok(Some(summary(OrderStatusType::Fulfilled, false)))]);
        let outcome = poller.wait_for_payment(&OrderId::from("ord-1")).await;
        assert!(matches!(outcome, PollOutcome::Paid(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let poller = scripted_poller(vec![
            Err(anyhow!("connection refused")),
            pending(),
            Err(anyhow!("502 Bad Gateway")),
            Ok(Some(summary(OrderStatusType::Paid, false))),
        ]);
        let outcome = poller.wait_for_payment(&OrderId::from("ord-1")).await;
        assert!(matches!(outcome, PollOutcome::Paid(_)));
        assert_eq!(poller.source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_outcomes() {
        let poller = scripted_poller(vec![Ok(Some(summary(OrderStatusType::Cancelled, false)))]);
        assert!(matches!(poller.wait_for_payment(&OrderId::from("ord-1")).await, PollOutcome::Cancelled(_)));

        let poller = scripted_poller(vec![pending(), Ok(Some(summary(OrderStatusType::Timeout, false)))]);
        assert!(matches!(poller.wait_for_payment(&OrderId::from("ord-1")).await, PollOutcome::TimedOut(_)));

        let poller = scripted_poller(vec![Ok(None)]);
        assert_eq!(poller.wait_for_payment(&OrderId::from("ord-1")).await, PollOutcome::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn underpayment_stops_polling() {
        let poller = scripted_poller(vec![pending(), Ok(Some(summary(OrderStatusType::Pending, true)))]);
        let outcome = poller.wait_for_payment(&OrderId::from("ord-1")).await;
        assert!(matches!(outcome, PollOutcome::UnderReview(s) if s.awaiting_review));
        assert_eq!(poller.source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_deadline() {
        let poller = scripted_poller(vec![]);
        let outcome = poller.wait_for_payment(&OrderId::from("ord-1")).await;
        assert_eq!(outcome, PollOutcome::Deadline);
        let calls = poller.source.calls();
        assert!((10..=12).contains(&calls), "{calls} polls");
    }
}
