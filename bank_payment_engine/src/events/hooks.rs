use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{EventHandler, EventProducer, Handler, OrderExpiredEvent, PaymentAppliedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_applied_producer: Vec<EventProducer<PaymentAppliedEvent>>,
    pub order_expired_producer: Vec<EventProducer<OrderExpiredEvent>>,
}

impl EventProducers {
    pub fn publish_payment_applied(&self, event: PaymentAppliedEvent) {
        for emitter in &self.payment_applied_producer {
            trace!("📬️ Notifying payment applied hook subscribers");
            emitter.publish_event(event.clone());
        }
    }

    pub fn publish_order_expired(&self, event: OrderExpiredEvent) {
        for emitter in &self.order_expired_producer {
            trace!("📬️ Notifying order expired hook subscribers");
            emitter.publish_event(event.clone());
        }
    }
}

pub struct EventHandlers {
    pub on_payment_applied: Option<EventHandler<PaymentAppliedEvent>>,
    pub on_order_expired: Option<EventHandler<OrderExpiredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_applied = hooks.on_payment_applied.map(|f| EventHandler::new(buffer_size, f));
        let on_order_expired = hooks.on_order_expired.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_applied, on_order_expired }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_applied {
            result.payment_applied_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_expired {
            result.order_expired_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per configured handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_payment_applied {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_expired {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_applied: Option<Handler<PaymentAppliedEvent>>,
    pub on_order_expired: Option<Handler<OrderExpiredEvent>>,
}

impl EventHooks {
    pub fn on_payment_applied<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentAppliedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_applied = Some(Arc::new(f));
        self
    }

    pub fn on_order_expired<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderExpiredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_expired = Some(Arc::new(f));
        self
    }
}
