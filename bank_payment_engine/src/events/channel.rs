//! Simple stateless pub-sub event handler
//!
//! Components of the system can subscribe to reconciliation events through this hook system and react to them. The
//! handlers are stateless: they have no access to the engine's internal state and only receive the event itself.
//! Handlers can be async.
//!
//! Publishing never waits. The reconciliation path hands an event to the channel after the store write has committed,
//! and if the channel is full or the handler has gone away the event is dropped and logged. A slow subscriber can
//! therefore never hold up (or fail) a webhook response.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handler jobs to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Dropping our own sender means the loop ends once the last producer goes away.
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, Ordering::SeqCst);
                trace!("📬️ Event handled");
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for {} event jobs to complete", jobs.load(Ordering::SeqCst));
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Hands the event to the handler without waiting. Returns `false` if the event was dropped.
    pub fn publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("📬️ Event buffer is full. The event has been dropped.");
                false
            },
            Err(TrySendError::Closed(_)) => {
                error!("📬️ Event handler has shut down. The event has been dropped.");
                false
            },
        }
    }
}
