//! Live event hub: fans state-change events out to connected observers.
//!
//! One spawned loop owns the subscriber map; producers and the gateway
//! only talk to it through a bounded command channel, so the map is
//! mutated in exactly one place. Delivery is at-most-once per subscriber
//! in send order. Nothing here ever blocks a producer: a subscriber that
//! cannot keep up is disconnected, and if the command channel itself is
//! full the event is dropped and counted.

pub mod events;

pub use events::{Event, EventType};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Outbound buffer per subscriber.
const SUBSCRIBER_BUFFER: usize = 100;
/// Depth of the command channel shared by all producers.
const COMMAND_BUFFER: usize = 256;

enum HubCommand {
    Register {
        reply: oneshot::Sender<(String, mpsc::Receiver<Event>)>,
    },
    Unregister {
        subscriber_id: String,
    },
    Publish {
        event: Event,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable producer/consumer handle to the hub loop.
#[derive(Clone)]
pub struct EventHub {
    tx: mpsc::Sender<HubCommand>,
    dropped: Arc<AtomicU64>,
}

impl EventHub {
    /// Spawn the coordinating loop and return its handle. Requires a
    /// running tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(run_loop(rx));
        EventHub {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a subscriber and return its id plus the event receiver.
    /// Returns None only if the hub loop has gone away.
    pub async fn subscribe(&self) -> Option<(String, mpsc::Receiver<Event>)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Register { reply }).await.ok()?;
        rx.await.ok()
    }

    pub async fn unsubscribe(&self, subscriber_id: &str) {
        let _ = self
            .tx
            .send(HubCommand::Unregister {
                subscriber_id: subscriber_id.to_string(),
            })
            .await;
    }

    /// Enqueue an event for fan-out without blocking. When the command
    /// channel is full the event is dropped and counted instead of
    /// backpressuring the producer.
    pub fn publish(&self, event: Event) {
        if self.tx.try_send(HubCommand::Publish { event }).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            log::warn!("Event hub queue full; {} events dropped so far", total);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Count { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

async fn run_loop(mut rx: mpsc::Receiver<HubCommand>) {
    let mut subscribers: HashMap<String, mpsc::Sender<Event>> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Register { reply } => {
                let subscriber_id = Uuid::new_v4().to_string();
                let (tx, sub_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
                subscribers.insert(subscriber_id.clone(), tx);
                log::debug!(
                    "Subscriber {} registered ({} total)",
                    subscriber_id,
                    subscribers.len()
                );
                if reply.send((subscriber_id.clone(), sub_rx)).is_err() {
                    subscribers.remove(&subscriber_id);
                }
            }
            HubCommand::Unregister { subscriber_id } => {
                subscribers.remove(&subscriber_id);
                log::debug!("Subscriber {} unregistered", subscriber_id);
            }
            HubCommand::Publish { event } => {
                let mut failed = Vec::new();
                for (subscriber_id, sender) in subscribers.iter() {
                    if sender.try_send(event.clone()).is_err() {
                        failed.push(subscriber_id.clone());
                    }
                }
                for subscriber_id in failed {
                    subscribers.remove(&subscriber_id);
                    log::debug!("Dropped slow or closed subscriber {}", subscriber_id);
                }
            }
            HubCommand::Count { reply } => {
                let _ = reply.send(subscribers.len());
            }
        }
    }
}

#[cfg(test)]
mod hub_tests;
