//! In-memory backends with call counters, shared by the unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Unavailable;
use crate::models::{ContainerDescriptor, CpuInfo, DiskUsage, SystemMetrics};
use crate::sources::{Cli, ContainerRuntime, HostProbe, Sources, StatsSample};

pub const STATUS_JSON: &str = r#"{"gateway":{"mode":"local","reachable":true},"agents":{"agents":[{"id":"a1"}]},"sessions":{"count":2},"heartbeat":{"agents":[{"agentId":"a1","every":"30m"}]}}"#;

/// Scripted CLI: replies are keyed by the space-joined argument list.
/// Unscripted commands exit non-zero.
#[derive(Default)]
pub struct FakeCli {
    replies: HashMap<String, String>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeCli {
    pub fn with(mut self, args: &str, stdout: &str) -> Self {
        self.replies.insert(args.to_owned(), stdout.to_owned());
        self
    }

    /// Every command takes `delay` (on tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cli for FakeCli {
    async fn run(&self, args: &[&str]) -> Result<String, Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .get(&args.join(" "))
            .cloned()
            .ok_or_else(|| Unavailable::ExitStatus {
                status: "exit status: 1".into(),
                stderr: "unknown command".into(),
            })
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    containers: Vec<(ContainerDescriptor, Option<StatsSample>)>,
    unreachable: bool,
    pub calls: AtomicUsize,
}

impl FakeRuntime {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Adds a running container; `None` stats make its sampling fail.
    pub fn with_running(mut self, id: &str, name: &str, stats: Option<StatsSample>) -> Self {
        self.containers.push((descriptor(id, name, "running"), stats));
        self
    }

    pub fn with_stopped(mut self, id: &str, name: &str) -> Self {
        self.containers.push((descriptor(id, name, "exited"), None));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Unavailable::Runtime("connection refused".into()));
        }
        Ok(())
    }
}

fn descriptor(id: &str, name: &str, state: &str) -> ContainerDescriptor {
    ContainerDescriptor {
        id: id.to_owned(),
        names: vec![name.to_owned()],
        image: "alpine:3".into(),
        runtime_state: state.to_owned(),
        status_text: state.to_owned(),
        ports: Vec::new(),
        created_at: 1_700_000_000,
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerDescriptor>, Unavailable> {
        self.check()?;
        Ok(self
            .containers
            .iter()
            .filter(|(c, _)| all || c.runtime_state == "running")
            .map(|(c, _)| c.clone())
            .collect())
    }

    async fn stats_sample(&self, id: &str) -> Result<StatsSample, Unavailable> {
        self.check()?;
        self.containers
            .iter()
            .find(|(c, _)| c.id == id)
            .and_then(|(_, s)| s.clone())
            .ok_or_else(|| Unavailable::Runtime(format!("container {id} is not running")))
    }
}

#[derive(Default)]
pub struct FakeHost {
    disk_missing: bool,
    pub calls: AtomicUsize,
}

impl FakeHost {
    pub fn without_disk() -> Self {
        Self {
            disk_missing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostProbe for FakeHost {
    async fn system(&self) -> Result<SystemMetrics, Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SystemMetrics {
            cpu: CpuInfo {
                cores: 4,
                usage: 12.5,
                model: "Test CPU".into(),
            },
            ..Default::default()
        })
    }

    async fn disk(&self, path: &Path) -> Result<DiskUsage, Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.disk_missing {
            return Err(Unavailable::Io(format!("statvfs {}: not found", path.display())));
        }
        Ok(crate::sources::host::disk_usage(1000, 400))
    }
}

/// The three fakes, kept as concrete `Arc`s so tests can read counters.
pub struct Fakes {
    pub cli: Arc<FakeCli>,
    pub runtime: Arc<FakeRuntime>,
    pub host: Arc<FakeHost>,
}

impl Fakes {
    pub fn new(cli: FakeCli, runtime: FakeRuntime, host: FakeHost) -> Self {
        Self {
            cli: Arc::new(cli),
            runtime: Arc::new(runtime),
            host: Arc::new(host),
        }
    }

    /// Everything healthy: status JSON available, two running containers.
    pub fn healthy() -> Self {
        Self::new(
            FakeCli::default().with("status --json", STATUS_JSON),
            FakeRuntime::default()
                .with_running("c1", "/web", Some(StatsSample::default()))
                .with_running("c2", "/db", Some(StatsSample::default()))
                .with_stopped("c3", "/old"),
            FakeHost::default(),
        )
    }

    pub fn sources(&self) -> Sources {
        Sources {
            cli: self.cli.clone(),
            runtime: self.runtime.clone(),
            host: self.host.clone(),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.cli.calls() + self.runtime.calls() + self.host.calls()
    }
}
