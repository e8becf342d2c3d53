use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    DiscrepancyDetectedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderAnnulledEvent,
    OrderCreatedEvent,
    OrderFulfilledEvent,
    OrderPaidEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing side of the event system. Cheap to clone, and handed to every API that emits events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_fulfilled_producer: Vec<EventProducer<OrderFulfilledEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub discrepancy_producer: Vec<EventProducer<DiscrepancyDetectedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_created(&self, event: OrderCreatedEvent) {
        for p in &self.order_created_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_paid(&self, event: OrderPaidEvent) {
        for p in &self.order_paid_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_fulfilled(&self, event: OrderFulfilledEvent) {
        for p in &self.order_fulfilled_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_annulled(&self, event: OrderAnnulledEvent) {
        for p in &self.order_annulled_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_discrepancy(&self, event: DiscrepancyDetectedEvent) {
        for p in &self.discrepancy_producer {
            p.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_fulfilled: Option<EventHandler<OrderFulfilledEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_discrepancy_detected: Option<EventHandler<DiscrepancyDetectedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f)),
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f)),
            on_order_fulfilled: hooks.on_order_fulfilled.map(|f| EventHandler::new(buffer_size, f)),
            on_order_annulled: hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f)),
            on_discrepancy_detected: hooks.on_discrepancy_detected.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_fulfilled {
            result.order_fulfilled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_discrepancy_detected {
            result.discrepancy_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every registered handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        let mut count = 0;
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
            count += 1;
        }
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
            count += 1;
        }
        if let Some(handler) = self.on_order_fulfilled {
            tokio::spawn(handler.start_handler());
            count += 1;
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(handler.start_handler());
            count += 1;
        }
        if let Some(handler) = self.on_discrepancy_detected {
            tokio::spawn(handler.start_handler());
            count += 1;
        }
        info!("📬️ Started {count} event handlers");
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_fulfilled: Option<Handler<OrderFulfilledEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_discrepancy_detected: Option<Handler<DiscrepancyDetectedEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_fulfilled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderFulfilledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_fulfilled = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_discrepancy_detected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DiscrepancyDetectedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_discrepancy_detected = Some(Arc::new(f));
        self
    }
}
