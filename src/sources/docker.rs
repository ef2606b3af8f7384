use std::time::Duration;

use async_trait::async_trait;
use bollard::models::{ContainerStatsResponse, ContainerSummary, Port};
use bollard::query_parameters::{ListContainersOptionsBuilder, StatsOptions};
use bollard::Docker;
use futures_util::future::join_all;
use futures_util::StreamExt;
use tokio::time::timeout;

use super::ContainerRuntime;
use crate::error::Unavailable;
use crate::models::{
    round2, ContainerDescriptor, ContainerMemory, ContainerStats, PortMapping,
};

/// Raw counters from one stats sample, flattened out of Docker's response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSample {
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_total: u64,
    pub presystem_total: u64,
    pub online_cpus: u32,
    pub memory_usage: u64,
    pub memory_limit: Option<u64>,
    pub network_rx: u64,
    pub network_tx: u64,
}

impl From<ContainerStatsResponse> for StatsSample {
    fn from(s: ContainerStatsResponse) -> Self {
        let cpu = s.cpu_stats.unwrap_or_default();
        let precpu = s.precpu_stats.unwrap_or_default();
        let mem = s.memory_stats.unwrap_or_default();

        let (network_rx, network_tx) = s
            .networks
            .unwrap_or_default()
            .values()
            .fold((0u64, 0u64), |(rx, tx), n| {
                (
                    rx + n.rx_bytes.unwrap_or_default(),
                    tx + n.tx_bytes.unwrap_or_default(),
                )
            });

        Self {
            cpu_total: cpu.cpu_usage.as_ref().and_then(|u| u.total_usage).unwrap_or_default(),
            precpu_total: precpu.cpu_usage.as_ref().and_then(|u| u.total_usage).unwrap_or_default(),
            system_total: cpu.system_cpu_usage.unwrap_or_default(),
            presystem_total: precpu.system_cpu_usage.unwrap_or_default(),
            online_cpus: cpu.online_cpus.unwrap_or_default(),
            memory_usage: mem.usage.unwrap_or_default(),
            memory_limit: mem.limit,
            network_rx,
            network_tx,
        }
    }
}

impl StatsSample {
    /// CPU share between the two samples, scaled by online cores.
    /// Zero when the system counter did not move.
    pub fn cpu_percent(&self) -> f64 {
        let cpu_delta = self.cpu_total as f64 - self.precpu_total as f64;
        let system_delta = self.system_total as f64 - self.presystem_total as f64;
        if system_delta > 0.0 {
            (cpu_delta / system_delta) * f64::from(self.online_cpus.max(1)) * 100.0
        } else {
            0.0
        }
    }

    /// Missing or zero limits count as 1 byte.
    pub fn memory_limit_or_one(&self) -> u64 {
        self.memory_limit.filter(|l| *l > 0).unwrap_or(1)
    }

    pub fn memory_percent(&self) -> f64 {
        self.memory_usage as f64 / self.memory_limit_or_one() as f64 * 100.0
    }

    pub fn into_stats(self, id: String, name: String) -> ContainerStats {
        ContainerStats {
            id,
            name,
            cpu: round2(self.cpu_percent()),
            memory: ContainerMemory {
                usage: self.memory_usage,
                limit: self.memory_limit_or_one(),
                percent: round2(self.memory_percent()),
            },
            network_rx: self.network_rx,
            network_tx: self.network_tx,
        }
    }
}

/* ───────────── bollard-backed runtime ───────────── */

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    timeout: Duration,
}

impl DockerRuntime {
    pub fn new(docker: Docker, timeout: Duration) -> Self {
        Self { docker, timeout }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerDescriptor>, Unavailable> {
        let opts = ListContainersOptionsBuilder::new().all(all).build();
        tracing::debug!(?opts, "Listing containers");

        let containers = timeout(self.timeout, self.docker.list_containers(Some(opts)))
            .await
            .map_err(|_| Unavailable::Timeout(self.timeout))??;

        Ok(containers.into_iter().map(descriptor_from_summary).collect())
    }

    async fn stats_sample(&self, id: &str) -> Result<StatsSample, Unavailable> {
        // one_shot=false lets the daemon fill precpu_stats, which the CPU delta needs.
        let mut stream = self.docker.stats(
            id,
            Some(StatsOptions {
                stream: false,
                one_shot: false,
            }),
        );

        match timeout(self.timeout, stream.next()).await {
            Err(_) => Err(Unavailable::Timeout(self.timeout)),
            Ok(Some(Ok(s))) => Ok(StatsSample::from(s)),
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => Err(Unavailable::Runtime(format!("no stats returned for {id}"))),
        }
    }
}

fn descriptor_from_summary(c: ContainerSummary) -> ContainerDescriptor {
    ContainerDescriptor {
        id: c.id.unwrap_or_default(),
        names: c.names.unwrap_or_default(),
        image: c.image.unwrap_or_default(),
        runtime_state: c.state.map(|s| s.to_string()).unwrap_or_default(),
        status_text: c.status.unwrap_or_default(),
        ports: c
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(port_mapping)
            .collect(),
        created_at: c.created.unwrap_or_default(),
    }
}

fn port_mapping(p: Port) -> PortMapping {
    PortMapping {
        ip: p.ip,
        private_port: p.private_port,
        public_port: p.public_port,
        protocol: p.typ.map(|t| t.to_string()).unwrap_or_default(),
    }
}

/* ───────────── adapters ───────────── */

/// Every container, running or stopped.
pub async fn fetch_containers(
    runtime: &dyn ContainerRuntime,
) -> Result<Vec<ContainerDescriptor>, Unavailable> {
    runtime.list_containers(true).await
}

/// Stats for running containers, sampled concurrently. A container that
/// fails mid-collection (typically because it just stopped) is left out.
pub async fn fetch_container_stats(
    runtime: &dyn ContainerRuntime,
) -> Result<Vec<ContainerStats>, Unavailable> {
    let running = runtime.list_containers(false).await?;

    let samples = join_all(running.iter().map(|c| runtime.stats_sample(&c.id))).await;

    Ok(running
        .into_iter()
        .zip(samples)
        .filter_map(|(c, sample)| match sample {
            Ok(sample) => {
                let name = c.display_name();
                Some(sample.into_stats(c.id, name))
            }
            Err(e) => {
                tracing::debug!("Skipping stats for container {}: {}", c.id, e);
                None
            }
        })
        .collect())
}
