use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mcpload_core::runner::{SessionPolicy, TestPlan, TimeoutBudget};
use mcpload_core::{TransportDescriptor, TransportKind};

/// On-disk test configuration. Deserialized as-is, validated by
/// [`ConfigFile::into_plan`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub test: TestSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    pub transport: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSection {
    pub tool_name: String,
    #[serde(default = "default_tool_args")]
    pub tool_args: Value,
    #[serde(default = "default_workers", alias = "concurrent_requests")]
    pub workers: u64,
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,
    #[serde(default = "default_session_policy")]
    pub session_policy: String,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_tool_args() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_workers() -> u64 {
    1
}

fn default_duration_seconds() -> u64 {
    60
}

fn default_session_policy() -> String {
    "shared".to_string()
}

fn default_pause_ms() -> u64 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_init_timeout_ms() -> u64 {
    10_000
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

pub async fn load(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("invalid config: {}", path.display()))
}

/// CLI flags that take precedence over config values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub workers: Option<u64>,
    pub duration: Option<Duration>,
}

impl ConfigFile {
    /// Validates and converts into the engine's immutable plan.
    pub fn into_plan(self, overrides: Overrides) -> anyhow::Result<TestPlan> {
        let kind: TransportKind = self.server.transport.parse().map_err(|_| {
            anyhow::anyhow!(
                "unsupported transport `{}` (expected `streamable_http`)",
                self.server.transport
            )
        })?;
        let session_policy: SessionPolicy = self.test.session_policy.parse().map_err(|_| {
            anyhow::anyhow!(
                "invalid session_policy `{}` (expected `shared` or `per-request`)",
                self.test.session_policy
            )
        })?;

        let workers = overrides.workers.unwrap_or(self.test.workers);
        anyhow::ensure!(workers >= 1, "`workers` must be a positive integer");

        let duration = overrides
            .duration
            .unwrap_or_else(|| Duration::from_secs(self.test.duration_seconds));
        anyhow::ensure!(!duration.is_zero(), "`duration` must be positive");

        anyhow::ensure!(
            !self.test.tool_name.trim().is_empty(),
            "`tool_name` must not be empty"
        );

        Ok(TestPlan {
            descriptor: TransportDescriptor {
                kind,
                host: self.server.host,
                port: self.server.port,
                path: self.server.path,
            },
            tool_name: self.test.tool_name,
            tool_args: self.test.tool_args,
            workers,
            duration,
            session_policy,
            pause: Duration::from_millis(self.test.pause_ms),
            timeouts: TimeoutBudget {
                connect: Duration::from_millis(self.test.connect_timeout_ms),
                initialize: Duration::from_millis(self.test.init_timeout_ms),
                call: Duration::from_millis(self.test.call_timeout_ms),
            },
        })
    }
}
