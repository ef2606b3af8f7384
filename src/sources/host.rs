use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::task::spawn_blocking;
use tokio::time::timeout;

use super::HostProbe;
use crate::error::Unavailable;
use crate::models::{round2, CpuInfo, DiskUsage, MemoryInfo, OsInfo, SystemMetrics};

const PROC_STAT: &str = "/proc/stat";

/// Reads OS counters of the local machine.
#[derive(Clone)]
pub struct LocalHost {
    system: Arc<Mutex<System>>,
    timeout: Duration,
}

impl LocalHost {
    pub fn new(timeout: Duration) -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: Arc::new(Mutex::new(System::new_with_specifics(refresh))),
            timeout,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, Unavailable>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, Unavailable> + Send + 'static,
    {
        timeout(self.timeout, spawn_blocking(f))
            .await
            .map_err(|_| Unavailable::Timeout(self.timeout))?
            .map_err(|e| Unavailable::Io(e.to_string()))?
    }
}

#[async_trait]
impl HostProbe for LocalHost {
    async fn system(&self) -> Result<SystemMetrics, Unavailable> {
        let system = self.system.clone();
        self.blocking(move || {
            let mut sys = system
                .lock()
                .map_err(|_| Unavailable::Io("host probe lock poisoned".into()))?;
            sys.refresh_memory();
            sys.refresh_cpu_all();

            let cumulative = std::fs::read_to_string(PROC_STAT)
                .ok()
                .and_then(|stat| cpu_usage_since_boot(&stat));

            Ok(collect_system(&sys, cumulative))
        })
        .await
    }

    async fn disk(&self, path: &Path) -> Result<DiskUsage, Unavailable> {
        let path: PathBuf = path.to_owned();
        self.blocking(move || {
            let stats = fs2::statvfs(&path)
                .map_err(|e| Unavailable::Io(format!("statvfs {}: {e}", path.display())))?;
            Ok(disk_usage(stats.total_space(), stats.free_space()))
        })
        .await
    }
}

fn collect_system(sys: &System, cumulative_cpu: Option<f64>) -> SystemMetrics {
    let total = sys.total_memory();
    let free = sys.available_memory();
    let used = total.saturating_sub(free);
    let load = System::load_average();

    SystemMetrics {
        cpu: CpuInfo {
            cores: sys.cpus().len(),
            usage: round2(cumulative_cpu.unwrap_or_else(|| f64::from(sys.global_cpu_usage()))),
            model: sys
                .cpus()
                .first()
                .map(|c| c.brand().to_owned())
                .unwrap_or_else(|| "Unknown".into()),
        },
        memory: MemoryInfo {
            total,
            used,
            free,
            usage_percent: percent(used, total),
        },
        os: OsInfo {
            platform: std::env::consts::OS.to_owned(),
            release: System::kernel_version().unwrap_or_default(),
            os_type: System::name().unwrap_or_default(),
            hostname: System::host_name().unwrap_or_default(),
        },
        loadavg: [load.one, load.five, load.fifteen],
        uptime: System::uptime(),
    }
}

/// Busy share of all CPU ticks since boot, from the aggregate `cpu` line of
/// `/proc/stat`. This is a smoothed long-run average, not a live reading.
pub fn cpu_usage_since_boot(proc_stat: &str) -> Option<f64> {
    let line = proc_stat
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))?;

    // user nice system idle iowait irq softirq steal
    let ticks: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|t| t.parse().ok())
        .collect::<Option<_>>()?;
    if ticks.len() < 4 {
        return None;
    }

    let total: u64 = ticks.iter().sum();
    let idle = ticks[3] + ticks.get(4).copied().unwrap_or_default();
    if total == 0 {
        return None;
    }

    Some(100.0 - 100.0 * idle as f64 / total as f64)
}

pub fn disk_usage(total: u64, free: u64) -> DiskUsage {
    let used = total.saturating_sub(free);
    DiskUsage {
        total,
        used,
        free,
        usage_percent: percent(used, total),
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}
