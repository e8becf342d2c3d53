//! A small stateless pub-sub channel.
//!
//! Handlers only see the event itself, never the engine's state. Each event is handled on its own task, so a slow
//! handler does not hold up the producer.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    /// Runs until every producer has been dropped, then waits for in-flight handlers to finish.
    pub async fn start_handler(self) {
        let Self { mut receiver, sender, handler } = self;
        // Only producers may keep the channel open
        drop(sender);
        debug!("📬️ Starting event handler");
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                ev = receiver.recv() => match ev {
                    Some(ev) => {
                        trace!("📬️ Handling event");
                        jobs.spawn((handler)(ev));
                    },
                    None => break,
                },
                Some(res) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Err(e) = res {
                        warn!("📬️ Event handler task failed: {e}");
                    }
                },
            }
        }
        while let Some(res) = jobs.join_next().await {
            if let Err(e) = res {
                warn!("📬️ Event handler task failed: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
