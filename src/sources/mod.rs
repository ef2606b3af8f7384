//! Source adapters: one per external signal.
//!
//! Each backend sits behind a trait so the aggregator can be driven by
//! fakes in tests. Every call is bounded by a timeout and fails with
//! [`Unavailable`], never with a panic or an unbounded wait.

pub mod cli;
pub mod docker;
pub mod host;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Unavailable;
use crate::models::{ContainerDescriptor, DiskUsage, SystemMetrics};

pub use cli::OpenClawCli;
pub use docker::{DockerRuntime, StatsSample};
pub use host::LocalHost;

/// Subprocess access to the OpenClaw CLI.
#[async_trait]
pub trait Cli: Send + Sync {
    /// Runs the CLI with `args` and returns its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, Unavailable>;
}

/// Container runtime API.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// All containers when `all`, running ones otherwise.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerDescriptor>, Unavailable>;

    /// One non-streaming stats sample for a container.
    async fn stats_sample(&self, id: &str) -> Result<StatsSample, Unavailable>;
}

/// OS counters of the machine the service runs on.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn system(&self) -> Result<SystemMetrics, Unavailable>;

    async fn disk(&self, path: &Path) -> Result<DiskUsage, Unavailable>;
}

/// The backends an [`crate::aggregator::Aggregator`] polls.
#[derive(Clone)]
pub struct Sources {
    pub cli: Arc<dyn Cli>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub host: Arc<dyn HostProbe>,
}
