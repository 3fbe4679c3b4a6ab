use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::entities::KnockEvent;

/// Copies every event from one capture to several independent queues.
///
/// Each subscriber gets its own bounded channel. Sends are awaited one
/// subscriber at a time, so a slow engine applies backpressure instead of
/// losing events, and every subscriber sees events in emission order.
/// Subscribers whose receiver has gone away are dropped. When the source
/// closes, every subscriber queue closes too.
pub struct EventFanout {
    capacity: usize,
    subscribers: Vec<mpsc::Sender<KnockEvent>>,
}

impl EventFanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Vec::new(),
        }
    }

    /// Register a new subscriber. Must be called before [`start`](Self::start).
    pub fn subscribe(&mut self) -> mpsc::Receiver<KnockEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.push(tx);
        rx
    }

    /// Spawn the forwarding task. Resolves to the number of events forwarded.
    pub fn start(self, mut source: mpsc::Receiver<KnockEvent>) -> JoinHandle<u64> {
        let mut subscribers = self.subscribers;

        tokio::spawn(async move {
            let mut forwarded = 0u64;

            while let Some(event) = source.recv().await {
                let mut closed = Vec::new();

                for (index, subscriber) in subscribers.iter().enumerate() {
                    if subscriber.send(event.clone()).await.is_err() {
                        closed.push(index);
                    }
                }

                for index in closed.into_iter().rev() {
                    subscribers.swap_remove(index);
                    debug!(remaining = subscribers.len(), "fan-out subscriber closed");
                }

                forwarded += 1;

                if subscribers.is_empty() {
                    debug!("no fan-out subscribers left");
                    break;
                }
            }

            forwarded
        })
    }
}
