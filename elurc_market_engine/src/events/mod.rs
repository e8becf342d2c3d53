//! Order lifecycle events.
//!
//! Components outside the engine (customer notifications, analytics) subscribe to these through [`EventHooks`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
