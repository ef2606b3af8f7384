//! Status aggregation: cache-first reads over the source adapters.
//!
//! Every accessor goes through [`Aggregator::cached`]. On a miss the adapter
//! runs, a success is stored under its key, and a failure is logged and
//! handed back as [`Unavailable`] without being cached. Composite payloads
//! (metrics, live-channel snapshots) degrade field by field.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::Unavailable;
use crate::models::{
    AgentProfile, CliStatus, ContainerDescriptor, ContainerStats, CronJob, CronRun, DiskUsage,
    MetricsPayload, SessionList, StatusUpdate, StatusView, SystemMetrics,
};
use crate::sources::{cli, docker, Sources};

/// Upper bound for the `--active` window, one week.
pub const MAX_ACTIVE_MINUTES: u32 = 7 * 24 * 60;
pub const MAX_CRON_RUNS: u32 = 200;

/// Source identity of a cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Status,
    Sessions { active_minutes: Option<u32> },
    Agents,
    Cron,
    CronRuns { limit: u32 },
    System,
    Disk,
    Containers,
    ContainerStats,
}

/// A cached snapshot. One variant per source shape.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Status(Arc<CliStatus>),
    Sessions(Arc<SessionList>),
    Agents(Arc<Vec<AgentProfile>>),
    CronJobs(Arc<Vec<CronJob>>),
    CronRuns(Arc<Vec<CronRun>>),
    System(Arc<SystemMetrics>),
    Disk(Arc<DiskUsage>),
    Containers(Arc<Vec<ContainerDescriptor>>),
    ContainerStats(Arc<Vec<ContainerStats>>),
}

/// Ties a snapshot type to its [`Snapshot`] variant so each call site reads
/// back exactly the shape it stored.
pub trait Cacheable: Sized {
    fn wrap(value: Arc<Self>) -> Snapshot;
    fn unwrap(snapshot: Snapshot) -> Option<Arc<Self>>;
}

macro_rules! cacheable {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Cacheable for $ty {
                fn wrap(value: Arc<Self>) -> Snapshot {
                    Snapshot::$variant(value)
                }

                fn unwrap(snapshot: Snapshot) -> Option<Arc<Self>> {
                    match snapshot {
                        Snapshot::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

cacheable! {
    CliStatus => Status,
    SessionList => Sessions,
    Vec<AgentProfile> => Agents,
    Vec<CronJob> => CronJobs,
    Vec<CronRun> => CronRuns,
    SystemMetrics => System,
    DiskUsage => Disk,
    Vec<ContainerDescriptor> => Containers,
    Vec<ContainerStats> => ContainerStats,
}

#[derive(Debug, Clone, Copy)]
pub struct Ttls {
    /// `status`, `sessions`, `agents` and `cron` keys.
    pub status: Duration,
    /// Host and container metrics.
    pub metrics: Duration,
}

/* ───────────── accessor payloads ───────────── */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsView {
    pub count: Option<u64>,
    pub defaults: Option<Value>,
    pub recent: Vec<Value>,
    pub by_agent: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatView {
    pub agents: Vec<Value>,
}

/// What one broadcast tick (or a first-connect snapshot) sends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSnapshot {
    pub status: StatusUpdate,
    pub metrics: MetricsPayload,
    pub containers: Option<Arc<Vec<ContainerDescriptor>>>,
}

pub struct Aggregator {
    cache: TtlCache<CacheKey, Snapshot>,
    sources: Sources,
    ttls: Ttls,
    disk_path: PathBuf,
}

impl Aggregator {
    pub fn new(sources: Sources, ttls: Ttls, disk_path: PathBuf) -> Self {
        Self {
            cache: TtlCache::default(),
            sources,
            ttls,
            disk_path,
        }
    }

    pub fn from_config(sources: Sources, config: &Config) -> Self {
        Self::new(
            sources,
            Ttls {
                status: config.status_ttl,
                metrics: config.metrics_ttl,
            },
            config.disk_path.clone(),
        )
    }

    /// Cache-first read of `key`. Concurrent misses may both reach the
    /// source; the later store wins.
    async fn cached<T, F>(&self, key: CacheKey, ttl: Duration, fetch: F) -> Result<Arc<T>, Unavailable>
    where
        T: Cacheable,
        F: std::future::Future<Output = Result<T, Unavailable>>,
    {
        if let Some(hit) = self.cache.get(&key, ttl).and_then(T::unwrap) {
            return Ok(hit);
        }

        match fetch.await {
            Ok(value) => {
                let value = Arc::new(value);
                self.cache.set(key, T::wrap(value.clone()));
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(?key, %err, "source unavailable");
                Err(err)
            }
        }
    }

    /* ───────────── raw snapshots ───────────── */

    pub async fn status(&self) -> Result<Arc<CliStatus>, Unavailable> {
        let cli = self.sources.cli.as_ref();
        self.cached(CacheKey::Status, self.ttls.status, cli::fetch_status(cli))
            .await
    }

    pub async fn session_list(&self, active_minutes: Option<u32>) -> Result<Arc<SessionList>, Unavailable> {
        let active_minutes = active_minutes.map(|m| m.clamp(1, MAX_ACTIVE_MINUTES));
        let cli = self.sources.cli.as_ref();
        self.cached(
            CacheKey::Sessions { active_minutes },
            self.ttls.status,
            cli::fetch_sessions(cli, active_minutes),
        )
        .await
    }

    pub async fn configured_agents(&self) -> Result<Arc<Vec<AgentProfile>>, Unavailable> {
        let cli = self.sources.cli.as_ref();
        self.cached(CacheKey::Agents, self.ttls.status, cli::fetch_agents(cli))
            .await
    }

    pub async fn cron_jobs(&self) -> Result<Arc<Vec<CronJob>>, Unavailable> {
        let cli = self.sources.cli.as_ref();
        self.cached(CacheKey::Cron, self.ttls.status, cli::fetch_cron_jobs(cli))
            .await
    }

    pub async fn cron_runs(&self, limit: u32) -> Result<Arc<Vec<CronRun>>, Unavailable> {
        let limit = limit.clamp(1, MAX_CRON_RUNS);
        let cli = self.sources.cli.as_ref();
        self.cached(
            CacheKey::CronRuns { limit },
            self.ttls.status,
            cli::fetch_cron_runs(cli, limit),
        )
        .await
    }

    pub async fn system(&self) -> Result<Arc<SystemMetrics>, Unavailable> {
        let host = self.sources.host.as_ref();
        self.cached(CacheKey::System, self.ttls.metrics, host.system())
            .await
    }

    pub async fn disk(&self) -> Result<Arc<DiskUsage>, Unavailable> {
        let host = self.sources.host.as_ref();
        self.cached(CacheKey::Disk, self.ttls.metrics, host.disk(&self.disk_path))
            .await
    }

    pub async fn containers(&self) -> Result<Arc<Vec<ContainerDescriptor>>, Unavailable> {
        let runtime = self.sources.runtime.as_ref();
        self.cached(
            CacheKey::Containers,
            self.ttls.metrics,
            docker::fetch_containers(runtime),
        )
        .await
    }

    pub async fn container_stats(&self) -> Result<Arc<Vec<ContainerStats>>, Unavailable> {
        let runtime = self.sources.runtime.as_ref();
        self.cached(
            CacheKey::ContainerStats,
            self.ttls.metrics,
            docker::fetch_container_stats(runtime),
        )
        .await
    }

    /* ───────────── projections ───────────── */

    pub async fn status_view(&self) -> Result<StatusView, Unavailable> {
        Ok(StatusView::from(self.status().await?.as_ref()))
    }

    pub async fn sessions_view(&self) -> Result<SessionsView, Unavailable> {
        let status = self.status().await?;
        let sessions = status.sessions.clone().unwrap_or_default();
        Ok(SessionsView {
            count: sessions.count,
            defaults: sessions.defaults,
            recent: sessions.recent,
            by_agent: sessions.by_agent,
        })
    }

    pub async fn agents(&self) -> Result<Vec<Value>, Unavailable> {
        let status = self.status().await?;
        Ok(status
            .agents
            .as_ref()
            .map(|a| a.agents.clone())
            .unwrap_or_default())
    }

    /// Heartbeat configuration, which stands in for per-agent schedules.
    pub async fn heartbeat(&self) -> Result<HeartbeatView, Unavailable> {
        let status = self.status().await?;
        Ok(HeartbeatView {
            agents: status
                .heartbeat
                .as_ref()
                .map(|h| h.agents.clone())
                .unwrap_or_default(),
        })
    }

    /// Host, disk and container metrics sampled concurrently; each part is
    /// `None` when its source is unavailable.
    pub async fn metrics(&self) -> MetricsPayload {
        let (system, disk, docker) = tokio::join!(self.system(), self.disk(), self.container_stats());
        MetricsPayload {
            system: system.ok().map(|s| (*s).clone()),
            disk: disk.ok().map(|d| (*d).clone()),
            docker: docker.ok().map(|d| (*d).clone()),
        }
    }

    pub async fn status_update(&self) -> StatusUpdate {
        self.status()
            .await
            .map(|s| StatusUpdate::from(s.as_ref()))
            .unwrap_or_default()
    }

    /// The three live-channel payloads, fetched concurrently. Never fails.
    pub async fn tick_snapshot(&self) -> TickSnapshot {
        let (status, metrics, containers) =
            tokio::join!(self.status_update(), self.metrics(), self.containers());
        TickSnapshot {
            status,
            metrics,
            containers: containers.ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentsSummary, GatewayInfo, SessionsSummary};
    use crate::testing::{FakeCli, FakeHost, FakeRuntime, Fakes, STATUS_JSON};

    const TTL: Duration = Duration::from_millis(8000);

    fn aggregator(fakes: &Fakes) -> Aggregator {
        Aggregator::new(
            fakes.sources(),
            Ttls {
                status: TTL,
                metrics: Duration::from_millis(2000),
            },
            PathBuf::from("/"),
        )
    }

    #[tokio::test]
    async fn status_view_matches_the_reference_projection() {
        let fakes = Fakes::healthy();
        let agg = aggregator(&fakes);

        let view = agg.status_view().await.unwrap();

        assert_eq!(
            view,
            StatusView {
                gateway: GatewayInfo {
                    mode: Some("local".into()),
                    reachable: Some(true),
                    ..Default::default()
                },
                agents: AgentsSummary {
                    total: 1,
                    default_id: None,
                    bootstrap_pending_count: None,
                },
                sessions: SessionsSummary {
                    count: Some(2),
                    defaults: None,
                },
                os: None,
                memory: None,
                security_audit: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hits_are_served_from_cache_until_ttl() {
        let fakes = Fakes::healthy();
        let agg = aggregator(&fakes);

        agg.status().await.unwrap();
        agg.agents().await.unwrap();
        agg.heartbeat().await.unwrap();
        assert_eq!(fakes.cli.calls(), 1);

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        agg.sessions_view().await.unwrap();
        assert_eq!(fakes.cli.calls(), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        agg.status().await.unwrap();
        assert_eq!(fakes.cli.calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let fakes = Fakes::new(FakeCli::default(), FakeRuntime::default(), FakeHost::default());
        let agg = aggregator(&fakes);

        assert!(agg.status().await.is_err());
        assert!(agg.status().await.is_err());
        assert_eq!(fakes.cli.calls(), 2);
    }

    #[tokio::test]
    async fn keys_do_not_leak_shapes_into_each_other() {
        let fakes = Fakes::new(
            FakeCli::default()
                .with("status --json", STATUS_JSON)
                .with("cron list --json", "No cron jobs.")
                .with("agents list", "- main (default)\n  Model: m\n"),
            FakeRuntime::default(),
            FakeHost::default(),
        );
        let agg = aggregator(&fakes);

        assert!(agg.cron_jobs().await.unwrap().is_empty());
        assert_eq!(agg.configured_agents().await.unwrap()[0].id, "main");
        assert_eq!(agg.status().await.unwrap().sessions.as_ref().unwrap().count, Some(2));
    }

    #[tokio::test]
    async fn session_windows_are_clamped_and_cached_per_window() {
        let fakes = Fakes::new(
            FakeCli::default()
                .with("sessions --json --active 1", r#"{"count":0,"sessions":[]}"#)
                .with("sessions --json --active 10080", r#"{"count":3,"sessions":[]}"#),
            FakeRuntime::default(),
            FakeHost::default(),
        );
        let agg = aggregator(&fakes);

        assert_eq!(agg.session_list(Some(0)).await.unwrap().count, 0);
        assert_eq!(agg.session_list(Some(1_000_000)).await.unwrap().count, 3);
        agg.session_list(Some(1)).await.unwrap();
        assert_eq!(fakes.cli.calls(), 2);
    }

    #[tokio::test]
    async fn status_failure_leaves_container_fields_intact() {
        let fakes = Fakes::new(
            FakeCli::default(),
            FakeRuntime::default().with_running("c1", "/web", Some(Default::default())),
            FakeHost::default(),
        );
        let agg = aggregator(&fakes);

        let snap = agg.tick_snapshot().await;

        assert_eq!(snap.status, StatusUpdate::default());
        assert_eq!(snap.containers.as_ref().map(|c| c.len()), Some(1));
        assert_eq!(snap.metrics.docker.as_ref().map(|d| d.len()), Some(1));
        assert!(snap.metrics.system.is_some());
    }

    #[tokio::test]
    async fn metrics_degrade_per_field() {
        let fakes = Fakes::new(FakeCli::default(), FakeRuntime::unreachable(), FakeHost::without_disk());
        let agg = aggregator(&fakes);

        let metrics = agg.metrics().await;

        assert!(metrics.system.is_some());
        assert!(metrics.disk.is_none());
        assert!(metrics.docker.is_none());
    }
}
