//! Normalised snapshots produced by the source adapters, and the payload
//! shapes the accessors and the live channel hand to clients.
//!
//! Fields the upstream tools may leave out are `Option`s and are omitted
//! from the JSON when absent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reads `null` or a value of an unexpected shape as the field's default, so
/// one odd field cannot void a whole snapshot.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/* ───────────── OpenClaw status (`openclaw status --json`) ───────────── */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliStatus {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub agents: Option<AgentsInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sessions: Option<SessionsInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub os: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub memory: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub security_audit: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<HeartbeatInfo>,
    /// The document as the CLI printed it, for pass-through payloads.
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub connect_latency_ms: Option<f64>,
    #[serde(rename = "self", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub self_info: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub agents: Vec<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub default_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub bootstrap_pending_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub recent: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub by_agent: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub agents: Vec<Value>,
}

/* ───────────── status projections ───────────── */

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub gateway: GatewayInfo,
    pub agents: AgentsSummary,
    pub sessions: SessionsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_audit: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsSummary {
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_pending_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
}

impl From<&CliStatus> for StatusView {
    fn from(status: &CliStatus) -> Self {
        let agents = status.agents.clone().unwrap_or_default();
        let sessions = status.sessions.clone().unwrap_or_default();

        Self {
            gateway: status.gateway.clone().unwrap_or_default(),
            agents: AgentsSummary {
                total: agents.agents.len(),
                default_id: agents.default_id,
                bootstrap_pending_count: agents.bootstrap_pending_count,
            },
            sessions: SessionsSummary {
                count: sessions.count,
                defaults: sessions.defaults,
            },
            os: status.os.clone(),
            memory: status.memory.clone(),
            security_audit: status.security_audit.clone(),
        }
    }
}

/// Body of a `status_update` envelope: the CLI's own `gateway`, `agents` and
/// `sessions` objects, untouched. Every field is `null` when the status
/// source is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub gateway: Option<Value>,
    pub agents: Option<Value>,
    pub sessions: Option<Value>,
}

impl From<&CliStatus> for StatusUpdate {
    fn from(status: &CliStatus) -> Self {
        let field = |name: &str| status.raw.get(name).cloned();
        Self {
            gateway: field("gateway"),
            agents: field("agents"),
            sessions: field("sessions"),
        }
    }
}

/* ───────────── sessions (`openclaw sessions --json`) ───────────── */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionList {
    #[serde(default, deserialize_with = "lenient")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient")]
    pub count: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub active_minutes: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub key: String,
    #[serde(default, deserialize_with = "lenient")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub updated_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub age_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub system_sent: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub aborted_last_run: bool,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,
}

/// One record of `openclaw agents list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub id: String,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/* ───────────── scheduled jobs ───────────── */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Cron expression or structured schedule, passed through as given.
    #[serde(default)]
    pub schedule: Option<Value>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronRun {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/* ───────────── host metrics ───────────── */

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub os: OsInfo,
    /// 1, 5 and 15 minute load averages.
    pub loadavg: [f64; 3],
    /// Seconds since boot.
    pub uptime: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuInfo {
    pub cores: usize,
    /// Busy share of all ticks since boot, not an instantaneous rate.
    pub usage: f64,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OsInfo {
    pub platform: String,
    pub release: String,
    #[serde(rename = "type")]
    pub os_type: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub usage_percent: f64,
}

/* ───────────── containers ───────────── */

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerDescriptor {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    #[serde(rename = "state")]
    pub runtime_state: String,
    #[serde(rename = "status")]
    pub status_text: String,
    pub ports: Vec<PortMapping>,
    #[serde(rename = "created")]
    pub created_at: i64,
}

impl ContainerDescriptor {
    /// First name without Docker's leading slash.
    pub fn display_name(&self) -> String {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortMapping {
    #[serde(rename = "IP", skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub private_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub protocol: String,
}

/// Derived resource usage of one running container.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub id: String,
    pub name: String,
    /// Share of host CPU, 100 = one full core.
    pub cpu: f64,
    pub memory: ContainerMemory,
    pub network_rx: u64,
    pub network_tx: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerMemory {
    pub usage: u64,
    pub limit: u64,
    pub percent: f64,
}

/// Body of a `metrics_update` envelope and of `GET /api/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsPayload {
    pub system: Option<SystemMetrics>,
    pub disk: Option<DiskUsage>,
    pub docker: Option<Vec<ContainerStats>>,
}

/// Rounds to two decimals, the precision the dashboard renders.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
