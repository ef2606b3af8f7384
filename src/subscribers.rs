//! Registry of live-channel subscribers.
//!
//! Each subscriber owns a bounded FIFO of serialized envelopes; the
//! registry never touches sockets. A subscriber whose queue is closed or
//! full is treated as broken and removed during delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type SubscriberId = u64;

/// A serialized envelope, shared by every subscriber of one tick.
pub type Frame = Arc<str>;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("subscriber limit of {0} reached")]
pub struct RegistryFull(pub usize);

struct Subscriber {
    registered_at: DateTime<Utc>,
    tx: mpsc::Sender<Frame>,
}

/// Outcome of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub evicted: usize,
}

pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Subscriber>,
    next_id: AtomicU64,
    max_subscribers: usize,
}

impl SubscriberRegistry {
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_subscribers,
        }
    }

    pub fn ensure_capacity(&self) -> Result<(), RegistryFull> {
        if self.subscribers.len() >= self.max_subscribers {
            return Err(RegistryFull(self.max_subscribers));
        }
        Ok(())
    }

    /// Starts receiving broadcasts on `tx`.
    pub fn insert(&self, tx: mpsc::Sender<Frame>) -> Result<SubscriberId, RegistryFull> {
        self.ensure_capacity()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                registered_at: Utc::now(),
                tx,
            },
        );
        tracing::info!(subscriber = id, total = self.len(), "subscriber connected");
        Ok(id)
    }

    pub fn remove(&self, id: SubscriberId) -> bool {
        let Some((_, sub)) = self.subscribers.remove(&id) else {
            return false;
        };
        let connected_for = Utc::now() - sub.registered_at;
        tracing::info!(
            subscriber = id,
            total = self.len(),
            connected_secs = connected_for.num_seconds(),
            "subscriber disconnected"
        );
        true
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Queues every frame, in order, for every current subscriber.
    ///
    /// Works on a copy of the subscriber list, so connects and disconnects
    /// racing with delivery are safe: a newcomer simply waits for the next
    /// tick. Subscribers that fail are removed after the pass.
    pub fn deliver(&self, frames: &[Frame]) -> Delivery {
        let targets: Vec<(SubscriberId, mpsc::Sender<Frame>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().tx.clone()))
            .collect();

        let mut delivery = Delivery::default();
        let mut failed = Vec::new();

        for (id, tx) in targets {
            let sent = frames.iter().try_for_each(|frame| tx.try_send(frame.clone()));
            match sent {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "subscriber queue full, dropping it");
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = id, "subscriber channel closed");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            if self.remove(id) {
                delivery.evicted += 1;
            }
        }
        delivery
    }

    /// Drops every subscriber; their queues close once drained.
    pub fn close_all(&self) {
        let count = self.len();
        self.subscribers.clear();
        tracing::info!(count, "closed all subscribers");
    }
}
