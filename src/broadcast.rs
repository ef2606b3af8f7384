use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::aggregator::{Aggregator, TickSnapshot};
use crate::subscribers::{Delivery, Frame, RegistryFull, SubscriberId, SubscriberRegistry};

/// Every tick and every first-connect snapshot sends one of each.
pub const ENVELOPES_PER_TICK: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    StatusUpdate,
    MetricsUpdate,
    ContainerUpdate,
}

/// Wire shape of a live-channel message: `{ type, timestamp, data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: &'a T,
}

/// Serializes each envelope on its own; one that fails to serialize is
/// logged and skipped without holding back the others.
pub fn encode_snapshot(snapshot: &TickSnapshot) -> Vec<Frame> {
    let timestamp = Utc::now().timestamp_millis();

    [
        encode(EnvelopeKind::StatusUpdate, timestamp, &snapshot.status),
        encode(EnvelopeKind::MetricsUpdate, timestamp, &snapshot.metrics),
        encode(EnvelopeKind::ContainerUpdate, timestamp, &snapshot.containers),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn encode<T: Serialize>(kind: EnvelopeKind, timestamp: i64, data: &T) -> Option<Frame> {
    let envelope = Envelope {
        kind,
        timestamp,
        data,
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            tracing::warn!(?kind, "Failed to serialize envelope: {}", e);
            None
        }
    }
}

/// A registered live-channel subscriber. Dropping it deregisters.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Frame>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued frame; `None` once the registry has let go of us.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    pub(crate) fn close(&mut self) {
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Drives the aggregator on behalf of live-channel subscribers.
///
/// A tick assembles and delivers under `tick_lock`. A new subscriber
/// assembles its first snapshot outside the lock and only queues it and
/// registers under it, so it cannot receive a tick that predates its
/// snapshot and a slow source never makes connects wait on each other.
pub struct Broadcaster {
    aggregator: Arc<Aggregator>,
    registry: Arc<SubscriberRegistry>,
    buffer: usize,
    tick_lock: Mutex<()>,
}

impl Broadcaster {
    pub fn new(aggregator: Arc<Aggregator>, registry: Arc<SubscriberRegistry>, buffer: usize) -> Self {
        Self {
            aggregator,
            registry,
            buffer: buffer.max(ENVELOPES_PER_TICK),
            tick_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Registers a subscriber whose queue already holds a full snapshot set.
    pub async fn connect(&self) -> Result<Subscription, RegistryFull> {
        // Fail fast before paying for a snapshot.
        self.registry.ensure_capacity()?;

        let frames = encode_snapshot(&self.aggregator.tick_snapshot().await);

        let _guard = self.tick_lock.lock().await;
        let (tx, rx) = mpsc::channel(self.buffer);
        for frame in frames {
            if let Err(e) = tx.try_send(frame) {
                tracing::warn!("initial snapshot frame dropped: {}", e);
            }
        }

        let id = self.registry.insert(tx)?;
        Ok(Subscription {
            id,
            rx,
            registry: self.registry.clone(),
        })
    }

    /// One scheduled pass. Skips all source work when nobody listens.
    pub async fn tick(&self) -> Delivery {
        let _guard = self.tick_lock.lock().await;

        if self.registry.is_empty() {
            tracing::trace!("no subscribers, skipping tick");
            return Delivery::default();
        }

        let snapshot = self.aggregator.tick_snapshot().await;
        let frames = encode_snapshot(&snapshot);
        let delivery = self.registry.deliver(&frames);
        tracing::debug!(
            delivered = delivery.delivered,
            evicted = delivery.evicted,
            "broadcast tick"
        );
        delivery
    }

    /// Deregisters everyone; their sockets close once queues drain.
    pub fn shutdown(&self) {
        self.registry.close_all();
    }
}

/// Spawns the fixed-interval broadcast loop. The first tick fires one
/// period after start; new subscribers get their own snapshot on connect.
pub fn spawn_scheduler(
    broadcaster: Arc<Broadcaster>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        tracing::debug!(?period, "broadcast scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    broadcaster.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("broadcast scheduler stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Ttls;
    use crate::testing::{FakeCli, FakeHost, FakeRuntime, Fakes, STATUS_JSON};
    use serde_json::Value;
    use std::path::PathBuf;

    fn broadcaster(fakes: &Fakes) -> Broadcaster {
        let aggregator = Aggregator::new(
            fakes.sources(),
            Ttls {
                status: Duration::from_millis(8000),
                metrics: Duration::from_millis(2000),
            },
            PathBuf::from("/"),
        );
        Broadcaster::new(Arc::new(aggregator), Arc::new(SubscriberRegistry::new(16)), 16)
    }

    fn kind_of(frame: &Frame) -> String {
        let v: Value = serde_json::from_str(frame).unwrap();
        v["type"].as_str().unwrap().to_owned()
    }

    fn drain(sub: &mut Subscription) -> Vec<Frame> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    const KINDS: [&str; 3] = ["status_update", "metrics_update", "container_update"];

    #[tokio::test]
    async fn connect_queues_a_full_snapshot_immediately() {
        let fakes = Fakes::healthy();
        let b = broadcaster(&fakes);

        let mut sub = b.connect().await.unwrap();

        let frames = drain(&mut sub);
        let kinds: Vec<_> = frames.iter().map(kind_of).collect();
        assert_eq!(kinds, KINDS);

        let status: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(status["data"]["gateway"]["mode"], "local");
        assert!(status["timestamp"].as_i64().unwrap() > 0);
        let containers: Value = serde_json::from_str(&frames[2]).unwrap();
        assert_eq!(containers["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn tick_fans_out_and_evicts_broken_subscribers() {
        let fakes = Fakes::healthy();
        let b = broadcaster(&fakes);

        let mut open: Vec<Subscription> = Vec::new();
        for _ in 0..3 {
            open.push(b.connect().await.unwrap());
        }
        let mut broken = b.connect().await.unwrap();
        broken.close();
        for sub in open.iter_mut() {
            drain(sub);
        }

        let delivery = b.tick().await;

        assert_eq!(delivery, Delivery { delivered: 3, evicted: 1 });
        assert_eq!(b.registry().len(), 3);
        assert!(!b.registry().contains(broken.id()));

        let per_sub: Vec<Vec<Frame>> = open.iter_mut().map(drain).collect();
        for frames in &per_sub {
            let kinds: Vec<_> = frames.iter().map(kind_of).collect();
            assert_eq!(kinds, KINDS);
        }
        // Every subscriber got the very same serialized tick.
        for (x, y) in per_sub[0].iter().zip(&per_sub[1]) {
            assert!(Arc::ptr_eq(x, y));
        }
    }

    #[tokio::test]
    async fn idle_tick_touches_no_source() {
        let fakes = Fakes::healthy();
        let b = broadcaster(&fakes);

        assert_eq!(b.tick().await, Delivery::default());
        assert_eq!(fakes.total_calls(), 0);
    }

    #[tokio::test]
    async fn dropping_a_subscription_deregisters_it() {
        let fakes = Fakes::healthy();
        let b = broadcaster(&fakes);

        let sub = b.connect().await.unwrap();
        assert_eq!(b.registry().len(), 1);
        drop(sub);
        assert!(b.registry().is_empty());
    }

    #[tokio::test]
    async fn connect_is_refused_at_capacity() {
        let fakes = Fakes::healthy();
        let aggregator = Aggregator::new(
            fakes.sources(),
            Ttls {
                status: Duration::from_secs(8),
                metrics: Duration::from_secs(2),
            },
            PathBuf::from("/"),
        );
        let b = Broadcaster::new(Arc::new(aggregator), Arc::new(SubscriberRegistry::new(1)), 8);

        let _first = b.connect().await.unwrap();
        let calls = fakes.total_calls();
        assert!(matches!(b.connect().await, Err(RegistryFull(1))));
        assert_eq!(fakes.total_calls(), calls);
    }

    #[tokio::test]
    async fn shutdown_closes_subscriber_queues() {
        let fakes = Fakes::healthy();
        let b = broadcaster(&fakes);
        let mut sub = b.connect().await.unwrap();

        b.shutdown();

        for _ in 0..ENVELOPES_PER_TICK {
            assert!(sub.recv().await.is_some());
        }
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_does_not_queue_connects_behind_each_other() {
        let fakes = Fakes::new(
            FakeCli::default()
                .with("status --json", STATUS_JSON)
                .with_delay(Duration::from_secs(10)),
            FakeRuntime::default(),
            FakeHost::default(),
        );
        let b = broadcaster(&fakes);
        let start = tokio::time::Instant::now();

        let subs = futures::future::join_all((0..4).map(|_| b.connect())).await;

        assert!(start.elapsed() < Duration::from_secs(11));
        assert_eq!(b.registry().len(), 4);
        for sub in subs {
            let mut sub = sub.unwrap();
            assert_eq!(drain(&mut sub).len(), ENVELOPES_PER_TICK);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_ticks_on_its_period_until_shutdown() {
        let fakes = Fakes::healthy();
        let b = Arc::new(broadcaster(&fakes));
        let mut sub = b.connect().await.unwrap();
        assert_eq!(drain(&mut sub).len(), ENVELOPES_PER_TICK);

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let handle = spawn_scheduler(b.clone(), Duration::from_secs(5), stop_rx);

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(drain(&mut sub).is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let kinds: Vec<_> = drain(&mut sub).iter().map(kind_of).collect();
        assert_eq!(kinds, KINDS);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
