use std::{fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use elurc_common::Lamports;
use log::*;

use crate::{
    db_types::{DiscrepancyResolution, NewOrder, Order, OrderId, OrderItem, OrderStatusType, ProductId},
    events::{
        DiscrepancyDetectedEvent,
        EventProducers,
        OrderAnnulledEvent,
        OrderCreatedEvent,
        OrderFulfilledEvent,
        OrderPaidEvent,
    },
    helpers::{generate_order_number, Base58AddressValidator, WalletAddressValidator},
    market_api::{
        discrepancy::{assess_payment, PaymentAssessment},
        order_objects::{DiscrepancyDecision, OrderLineRequest, OrderRequest, PaymentConfirmation, PaymentOutcome},
        transitions::StatusTransition,
    },
    traits::{MarketplaceDatabase, MarketplaceError, OrderUpdate, StockShortfall},
};

pub const DEFAULT_PAYMENT_TIMEOUT_MINUTES: i64 = 30;
pub const DEFAULT_UNDERPAYMENT_TOLERANCE: i64 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct OrderFlowOptions {
    /// Underpayments up to and including this amount are accepted without review.
    pub underpayment_tolerance: Lamports,
    /// How long a pending order waits for a payment before it times out.
    pub payment_timeout: Duration,
}

impl Default for OrderFlowOptions {
    fn default() -> Self {
        Self {
            underpayment_tolerance: Lamports::from(DEFAULT_UNDERPAYMENT_TOLERANCE),
            payment_timeout: Duration::minutes(DEFAULT_PAYMENT_TIMEOUT_MINUTES),
        }
    }
}

/// `OrderFlowApi` drives orders through their lifecycle: checkout, payment confirmation, discrepancy review,
/// fulfilment, cancellation and timeouts.
///
/// Every status change is vetted by [`StatusTransition::check`] before it reaches the database, and the matching
/// lifecycle event is published once the change has been committed.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    options: OrderFlowOptions,
    address_validator: Arc<dyn WalletAddressValidator>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.options)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self {
            db,
            producers,
            options: OrderFlowOptions::default(),
            address_validator: Arc::new(Base58AddressValidator),
        }
    }

    pub fn with_options(mut self, options: OrderFlowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_address_validator<V: WalletAddressValidator + 'static>(mut self, validator: V) -> Self {
        self.address_validator = Arc::new(validator);
        self
    }

    pub fn options(&self) -> &OrderFlowOptions {
        &self.options
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Accepts a checkout request and stores it as a `Pending` order.
    ///
    /// Stock availability is checked here, but nothing is reserved. Stock only moves when a paid order goes into
    /// processing or is fulfilled.
    pub async fn process_new_order(&self, request: OrderRequest) -> Result<Order, MarketplaceError> {
        let OrderRequest { customer_wallet, shipping_address, items } = request;
        let customer_wallet = customer_wallet.trim().to_string();
        if !self.address_validator.is_valid(&customer_wallet) {
            return Err(MarketplaceError::InvalidWalletAddress(customer_wallet));
        }
        let missing = shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(MarketplaceError::InvalidOrder(format!(
                "Shipping address is missing: {}",
                missing.join(", ")
            )));
        }
        let lines = merge_order_lines(items)?;
        let mut order_items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = self
                .db
                .fetch_product(&product_id)
                .await?
                .ok_or_else(|| MarketplaceError::ProductNotFound(product_id.clone()))?;
            if !product.can_supply(quantity) {
                return Err(MarketplaceError::InsufficientStock(StockShortfall {
                    product_id,
                    requested: quantity,
                    available: product.stock,
                }));
            }
            order_items.push(OrderItem {
                product_id,
                product_name: product.name,
                quantity,
                price_elurc: product.price_elurc,
                price_eur: product.price_eur,
            });
        }
        let created_at = Utc::now();
        let new_order = NewOrder {
            id: OrderId::random(),
            order_number: generate_order_number(created_at),
            customer_wallet,
            shipping_address,
            items: order_items,
            created_at,
        };
        if new_order.checked_totals().is_none() {
            return Err(MarketplaceError::InvalidOrder("The order total is too large".into()));
        }
        let order = self.db.insert_order(new_order).await?;
        info!(
            "🔄️📦️ Order {} [{}] created for {} ({} items)",
            order.order_number,
            order.id,
            order.amount_elurc,
            order.items.len()
        );
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(order)
    }

    /// Applies a payment reported by the ledger verifier to an order.
    ///
    /// Reporting the same signature for the same order again is harmless and returns
    /// [`PaymentOutcome::AlreadyRecorded`]. A signature can never pay for two different orders.
    ///
    /// Late payments (the order has already timed out) are accepted. If the amount falls short by more than the
    /// tolerance, the payment is recorded but the order stays unpaid until an admin resolves the discrepancy.
    pub async fn confirm_payment(&self, payment: PaymentConfirmation) -> Result<PaymentOutcome, MarketplaceError> {
        let PaymentConfirmation { order_id, transaction_signature, amount_received } = payment;
        let signature = transaction_signature.trim().to_string();
        if signature.is_empty() {
            return Err(MarketplaceError::InvalidPayment("The transaction signature is empty".into()));
        }
        if amount_received <= Lamports::default() {
            return Err(MarketplaceError::InvalidPayment(format!(
                "The received amount must be positive, not {amount_received}"
            )));
        }
        if let Some(existing) = self.db.fetch_order_by_signature(&signature).await? {
            if existing.id == order_id {
                debug!("🔄️💰️ Payment {signature} for order {order_id} has already been recorded");
                return Ok(PaymentOutcome::AlreadyRecorded(existing));
            }
            warn!(
                "🔄️💰️ Payment {signature} was reported for order {order_id}, but it already paid for order {}",
                existing.id
            );
            return Err(MarketplaceError::SignatureAlreadyUsed(signature));
        }
        let order = self.fetch_order(&order_id).await?;
        if order.transaction_signature.is_some() {
            return Err(MarketplaceError::PaymentAlreadyRecorded(order_id));
        }
        if !order.status.accepts_payment() {
            return Err(MarketplaceError::PaymentNotAccepted(order_id, order.status));
        }
        let assessment = assess_payment(order.amount_elurc, amount_received, self.options.underpayment_tolerance);
        let reason = match &assessment {
            PaymentAssessment::Exact(_) => format!("Payment {signature} confirmed"),
            PaymentAssessment::AutoAccepted(d) | PaymentAssessment::NeedsReview(d) => {
                let kind = d.discrepancy_type.map(|t| t.to_string()).unwrap_or_default();
                format!("Payment {signature} confirmed with an {kind} of {}", d.difference_amount)
            },
        };
        if assessment.is_paid() {
            let transition = StatusTransition::check(order.status, OrderStatusType::Paid)?;
            let update = OrderUpdate::default()
                .with_signature(signature)
                .with_paid_at(Utc::now())
                .with_discrepancy(assessment.into_discrepancy());
            let order = self.db.apply_status_transition(&order_id, transition, update, &reason).await?;
            info!("🔄️💰️ Order {} has been paid. {reason}", order.order_number);
            self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
            return Ok(PaymentOutcome::Paid(order));
        }
        let update = OrderUpdate::default().with_signature(signature).with_discrepancy(assessment.into_discrepancy());
        let order = match order.status {
            // A late underpayment puts the order back in the queue so that an admin can look at it
            OrderStatusType::Timeout => {
                let transition = StatusTransition::check(order.status, OrderStatusType::Pending)?;
                let reason = format!("{reason}. Late payment, order reopened for review");
                self.db.apply_status_transition(&order_id, transition, update, &reason).await?
            },
            status => self.db.update_payment_details(&order_id, status, update).await?,
        };
        warn!("🔄️💰️ Order {} is underpaid and needs review. {reason}", order.order_number);
        self.producers.publish_discrepancy(DiscrepancyDetectedEvent::new(order.clone())).await;
        Ok(PaymentOutcome::HeldForReview(order))
    }

    /// Records an admin decision on an underpayment that is awaiting review.
    ///
    /// Approving marks the order as paid. Rejecting cancels it.
    pub async fn resolve_discrepancy(
        &self,
        order_id: &OrderId,
        decision: DiscrepancyDecision,
        notes: &str,
    ) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        if !order.is_awaiting_review() {
            return Err(MarketplaceError::NoPendingDiscrepancy(order_id.clone()));
        }
        let mut discrepancy = order.payment_discrepancy.clone();
        discrepancy.resolution_notes = Some(notes.to_string());
        let order = match decision {
            DiscrepancyDecision::Approve => {
                discrepancy.resolution = Some(DiscrepancyResolution::Approved);
                let transition = StatusTransition::check(order.status, OrderStatusType::Paid)?;
                let update = OrderUpdate::default().with_discrepancy(discrepancy).with_paid_at(Utc::now());
                let reason = format!("Underpayment approved: {notes}");
                let order = self.db.apply_status_transition(order_id, transition, update, &reason).await?;
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
                order
            },
            DiscrepancyDecision::Reject => {
                discrepancy.resolution = Some(DiscrepancyResolution::Rejected);
                let transition = StatusTransition::check(order.status, OrderStatusType::Cancelled)?;
                let update = OrderUpdate::default().with_discrepancy(discrepancy);
                let reason = format!("Underpayment rejected: {notes}");
                let order = self.db.apply_status_transition(order_id, transition, update, &reason).await?;
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone(), &reason)).await;
                order
            },
        };
        info!("🔄️⚖️ Discrepancy on order {} resolved ({decision}). Order is now {}", order.order_number, order.status);
        Ok(order)
    }

    /// Manually moves an order to a new status.
    ///
    /// The change is validated against the order state machine. Moving a paid order into processing or fulfilment
    /// commits stock, and cancelling a processing order returns it.
    pub async fn modify_status_for_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        reason: &str,
    ) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let transition = StatusTransition::check(order.status, new_status)?;
        if new_status == OrderStatusType::Paid && order.is_awaiting_review() {
            return Err(MarketplaceError::AwaitingDiscrepancyReview(order_id.clone()));
        }
        let update = match new_status {
            OrderStatusType::Paid => OrderUpdate::default().with_paid_at(Utc::now()),
            _ => OrderUpdate::default(),
        };
        let order = self.db.apply_status_transition(order_id, transition, update, reason).await?;
        info!(
            "🔄️📦️ Order {} moved from {} to {} ({:?} stock). Reason: {reason}",
            order.order_number, transition.from, transition.to, transition.inventory
        );
        self.publish_status_event(&order, reason).await;
        Ok(order)
    }

    pub async fn fulfil_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, MarketplaceError> {
        self.modify_status_for_order(order_id, OrderStatusType::Fulfilled, reason).await
    }

    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, MarketplaceError> {
        self.modify_status_for_order(order_id, OrderStatusType::Cancelled, reason).await
    }

    /// Times out every pending order that is older than the payment window.
    pub async fn expire_pending_orders(&self) -> Result<Vec<Order>, MarketplaceError> {
        let cutoff = Utc::now() - self.options.payment_timeout;
        let expired = self.db.expire_pending_orders(cutoff).await?;
        for order in &expired {
            let event = OrderAnnulledEvent::new(order.clone(), "Payment window elapsed");
            self.producers.publish_order_annulled(event).await;
        }
        Ok(expired)
    }

    pub async fn update_admin_notes(&self, order_id: &OrderId, notes: &str) -> Result<Order, MarketplaceError> {
        self.db.update_admin_notes(order_id, notes).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order_by_id(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
    }

    async fn publish_status_event(&self, order: &Order, reason: &str) {
        match order.status {
            OrderStatusType::Paid => self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await,
            OrderStatusType::Fulfilled => {
                self.producers.publish_order_fulfilled(OrderFulfilledEvent::new(order.clone())).await
            },
            OrderStatusType::Cancelled | OrderStatusType::Timeout => {
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone(), reason)).await
            },
            OrderStatusType::Pending | OrderStatusType::Processing => {},
        }
    }
}

/// Validates order lines and merges duplicate products, keeping the order in which they first appear.
fn merge_order_lines(lines: Vec<OrderLineRequest>) -> Result<Vec<(ProductId, i64)>, MarketplaceError> {
    if lines.is_empty() {
        return Err(MarketplaceError::InvalidOrder("The order has no items".into()));
    }
    let mut merged: Vec<(ProductId, i64)> = Vec::with_capacity(lines.len());
    for OrderLineRequest { product_id, quantity } in lines {
        if quantity <= 0 {
            return Err(MarketplaceError::InvalidOrder(format!("Quantity for product {product_id} must be positive")));
        }
        match merged.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, q)) => {
                *q = q.checked_add(quantity).ok_or_else(|| {
                    MarketplaceError::InvalidOrder(format!("Quantity for product {product_id} is too large"))
                })?;
            },
            None => merged.push((product_id, quantity)),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod test {
    use super::*;

    fn line(id: &str, quantity: i64) -> OrderLineRequest {
        OrderLineRequest { product_id: id.into(), quantity }
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let merged = merge_order_lines(vec![line("apples", 2), line("bread", 1), line("apples", 3)]).unwrap();
        assert_eq!(merged, vec![(ProductId::from("apples"), 5), (ProductId::from("bread"), 1)]);
    }

    #[test]
    fn empty_and_zero_quantity_orders_are_rejected() {
        assert!(matches!(merge_order_lines(vec![]), Err(MarketplaceError::InvalidOrder(_))));
        assert!(matches!(merge_order_lines(vec![line("apples", 0)]), Err(MarketplaceError::InvalidOrder(_))));
        assert!(matches!(merge_order_lines(vec![line("apples", -1)]), Err(MarketplaceError::InvalidOrder(_))));
    }

    #[test]
    fn merged_quantity_overflow_is_rejected() {
        let result = merge_order_lines(vec![line("apples", i64::MAX), line("apples", 2)]);
        assert!(matches!(result, Err(MarketplaceError::InvalidOrder(msg)) if msg.contains("too large")));
    }
}
