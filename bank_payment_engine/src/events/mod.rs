mod channel;
mod event_types;
mod hooks;
mod hub;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
pub use hub::{Connection, ConnectionId, NotificationHub, DEFAULT_CONNECTION_BUFFER};
