use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

mod client;
mod rpc;

pub use client::HttpTransport;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("session initialize failed: {0}")]
    Initialize(String),

    #[error("session initialize timed out after {0:?}")]
    InitializeTimeout(Duration),

    #[error("tool call failed: {0}")]
    Tool(String),

    #[error("tool call timed out after {0:?}")]
    ToolTimeout(Duration),

    /// The server replied, but the tool reported an application-level failure.
    #[error("tool returned an error: {0}")]
    ToolRejected(String),
}

impl Error {
    /// True when a reply actually made it back from the server. Replied
    /// failures carry a measurable latency; non-replies do not.
    #[must_use]
    pub fn replied(&self) -> bool {
        matches!(self, Self::ToolRejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    StreamableHttp,
}

/// Where and how to reach the server under test.
#[derive(Debug, Clone)]
pub struct TransportDescriptor {
    pub kind: TransportKind,
    pub host: String,
    pub port: Option<u16>,
    pub path: Option<String>,
}

impl TransportDescriptor {
    #[must_use]
    pub fn url(&self) -> String {
        let port = self.port.map(|p| format!(":{p}")).unwrap_or_default();
        let path = self.path.as_deref().unwrap_or("");
        format!("http://{}{port}{path}", self.host)
    }
}

/// Successful tool invocation payload.
#[derive(Debug, Clone)]
pub struct ToolReply {
    pub content: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes a connection and hands back a session that still needs
    /// its protocol handshake via [`Session::initialize`].
    async fn connect(&self, timeout: Duration) -> Result<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send {
    async fn initialize(&mut self, timeout: Duration) -> Result<()>;

    async fn call_tool(&mut self, name: &str, args: &Value, timeout: Duration)
    -> Result<ToolReply>;

    /// Tears the session down. Infallible: teardown problems are not
    /// actionable for the caller.
    async fn close(&mut self);
}
