//! OpenClaw CLI adapters.
//!
//! `OpenClawCli` owns process execution; the `parse_*` functions are pure
//! and turn the CLI's JSON or plain-text output into typed snapshots.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;

use super::Cli;
use crate::error::Unavailable;
use crate::models::{AgentProfile, CliStatus, CronJob, CronRun, SessionList};

/// Printed by `openclaw cron list` when nothing is scheduled.
const NO_CRON_JOBS: &str = "No cron jobs";

pub struct OpenClawCli {
    bin: String,
    timeout: Duration,
}

impl OpenClawCli {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Cli for OpenClawCli {
    async fn run(&self, args: &[&str]) -> Result<String, Unavailable> {
        tracing::debug!(bin = %self.bin, ?args, "running OpenClaw command");

        let child = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Unavailable::Spawn)?;

        // On timeout the future is dropped and kill_on_drop reaps the child.
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Unavailable::Timeout(self.timeout))?
            .map_err(|e| Unavailable::Io(e.to_string()))?;

        if !output.status.success() {
            return Err(Unavailable::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/* ───────────── adapters ───────────── */

pub async fn fetch_status(cli: &dyn Cli) -> Result<CliStatus, Unavailable> {
    let out = cli.run(&["status", "--json"]).await?;
    parse_status(&out)
}

pub async fn fetch_sessions(
    cli: &dyn Cli,
    active_minutes: Option<u32>,
) -> Result<SessionList, Unavailable> {
    let out = match active_minutes {
        Some(minutes) => {
            let minutes = minutes.to_string();
            cli.run(&["sessions", "--json", "--active", &minutes]).await?
        }
        None => cli.run(&["sessions", "--json"]).await?,
    };
    parse_sessions(&out)
}

pub async fn fetch_agents(cli: &dyn Cli) -> Result<Vec<AgentProfile>, Unavailable> {
    let out = cli.run(&["agents", "list"]).await?;
    Ok(parse_agents_list(&out))
}

pub async fn fetch_cron_jobs(cli: &dyn Cli) -> Result<Vec<CronJob>, Unavailable> {
    let out = cli.run(&["cron", "list", "--json"]).await?;
    parse_cron_list(&out)
}

pub async fn fetch_cron_runs(cli: &dyn Cli, limit: u32) -> Result<Vec<CronRun>, Unavailable> {
    let limit = limit.to_string();
    let out = cli.run(&["cron", "runs", "--json", "--limit", &limit]).await?;
    Ok(parse_cron_runs(&out))
}

/* ───────────── parsers ───────────── */

pub fn parse_status(out: &str) -> Result<CliStatus, Unavailable> {
    let raw: Value = serde_json::from_str(out.trim())?;
    let mut status: CliStatus = serde_json::from_value(raw.clone())?;
    status.raw = raw;
    Ok(status)
}

pub fn parse_sessions(out: &str) -> Result<SessionList, Unavailable> {
    Ok(serde_json::from_str(out.trim())?)
}

/// Parses the plain-text agent listing:
///
/// ```text
/// - main (default)
///   Workspace: ~/agents/main
///   Model: claude-sonnet
///
/// - scout
///   Model: gpt-4o
/// ```
///
/// A record ends at a blank line, at the next `- <id>` header, or at the end
/// of the input. Lines before the first header are ignored.
pub fn parse_agents_list(out: &str) -> Vec<AgentProfile> {
    let mut agents = Vec::new();
    let mut current: Option<AgentProfile> = None;

    for line in out.lines() {
        let trimmed = line.trim();

        if let Some(header) = trimmed.strip_prefix("- ").filter(|h| !h.contains(':')) {
            agents.extend(current.take());
            let is_default = header.contains("(default)");
            current = Some(AgentProfile {
                id: header.replace("(default)", "").trim().to_owned(),
                is_default,
                ..Default::default()
            });
        } else if trimmed.is_empty() {
            agents.extend(current.take());
        } else if let Some(agent) = current.as_mut() {
            if let Some(ws) = trimmed.strip_prefix("Workspace:") {
                agent.workspace = Some(ws.trim().to_owned());
            } else if let Some(model) = trimmed.strip_prefix("Model:") {
                agent.model = Some(model.trim().to_owned());
            }
        }
    }
    agents.extend(current);

    agents
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CronListOutput {
    Wrapped { jobs: Vec<CronJob> },
    Bare(Vec<CronJob>),
}

/// The "No cron jobs." sentinel means an empty schedule, not an error.
pub fn parse_cron_list(out: &str) -> Result<Vec<CronJob>, Unavailable> {
    if out.contains(NO_CRON_JOBS) {
        return Ok(Vec::new());
    }

    match serde_json::from_str(out.trim())? {
        CronListOutput::Wrapped { jobs } | CronListOutput::Bare(jobs) => Ok(jobs),
    }
}

/// Run history is newline-delimited JSON; lines that do not parse are
/// skipped.
pub fn parse_cron_runs(out: &str) -> Vec<CronRun> {
    if out.contains(NO_CRON_JOBS) {
        return Vec::new();
    }

    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str::<CronRun>(line) {
            Ok(run) => Some(run),
            Err(e) => {
                tracing::debug!(%e, line, "skipping malformed cron run line");
                None
            }
        })
        .collect()
}
