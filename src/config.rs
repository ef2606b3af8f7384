//! Service configuration, read from the process environment.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Per-IP request quota for the HTTP accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// One request credit is restored every `replenish_ms` milliseconds.
    pub replenish_ms: u64,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Executable name or path of the OpenClaw CLI.
    pub cli_bin: String,
    pub cli_timeout: Duration,
    pub docker_timeout: Duration,
    /// Bound on one OS counter or filesystem read.
    pub host_timeout: Duration,
    /// TTL for the `status`, `sessions`, `agents` and `cron` keys.
    pub status_ttl: Duration,
    /// TTL for host and container metrics.
    pub metrics_ttl: Duration,
    pub broadcast_interval: Duration,
    /// Mount point sampled by the disk adapter.
    pub disk_path: PathBuf,
    pub max_subscribers: usize,
    /// Envelopes a subscriber may have queued before it is evicted.
    pub subscriber_buffer: usize,
    pub rate_limit: Option<RateLimit>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3002)),
            cli_bin: "openclaw".into(),
            cli_timeout: Duration::from_secs(10),
            docker_timeout: Duration::from_secs(5),
            host_timeout: Duration::from_secs(5),
            status_ttl: Duration::from_millis(8000),
            metrics_ttl: Duration::from_millis(2000),
            broadcast_interval: Duration::from_secs(5),
            disk_path: PathBuf::from("/"),
            max_subscribers: 1000,
            subscriber_buffer: 64,
            rate_limit: Some(RateLimit {
                replenish_ms: 50,
                burst: 60,
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let replenish_ms = parse_or(&lookup, "RATE_LIMIT_REPLENISH_MS", 50u64)?;
        let burst = parse_or(&lookup, "RATE_LIMIT_BURST", 60u32)?;
        let rate_limit = (replenish_ms > 0 && burst > 0).then_some(RateLimit {
            replenish_ms,
            burst,
        });

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", d.bind_addr)?,
            cli_bin: lookup("OPENCLAW_BIN").unwrap_or(d.cli_bin),
            cli_timeout: millis_or(&lookup, "CLI_TIMEOUT_MS", d.cli_timeout)?,
            docker_timeout: millis_or(&lookup, "DOCKER_TIMEOUT_MS", d.docker_timeout)?,
            host_timeout: millis_or(&lookup, "HOST_TIMEOUT_MS", d.host_timeout)?,
            status_ttl: millis_or(&lookup, "STATUS_TTL_MS", d.status_ttl)?,
            metrics_ttl: millis_or(&lookup, "METRICS_TTL_MS", d.metrics_ttl)?,
            broadcast_interval: millis_or(&lookup, "BROADCAST_INTERVAL_MS", d.broadcast_interval)?,
            disk_path: lookup("DISK_PATH").map(PathBuf::from).unwrap_or(d.disk_path),
            max_subscribers: parse_or(&lookup, "MAX_SUBSCRIBERS", d.max_subscribers)?,
            subscriber_buffer: parse_or(&lookup, "SUBSCRIBER_BUFFER", d.subscriber_buffer)?,
            rate_limit,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {key} ({raw:?}): {e}")),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let ms = parse_or(lookup, key, default.as_millis() as u64)?;
    if ms == 0 {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}
