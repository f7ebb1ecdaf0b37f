use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::StatusCode;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::{Value, json};
use tracing::debug;

use super::rpc::{self, RpcRequest, RpcResponse};
use super::{Error, Result, Session, ToolReply, Transport, TransportDescriptor};

const SESSION_ID_HEADER: &str = "mcp-session-id";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Streamable-HTTP transport: JSON-RPC 2.0 over POST, one request per
/// message, session identity carried in a header.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    descriptor: TransportDescriptor,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(descriptor: TransportDescriptor) -> Self {
        let mut connector = HttpConnector::new();
        connector.enforce_http(false);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self { descriptor, client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// The hyper client dials lazily, so `connect` validates the endpoint
    /// and the TCP setup is bounded by the first handshake request. A
    /// dial failure during any request surfaces as `Error::Connect`.
    async fn connect(&self, _timeout: Duration) -> Result<Box<dyn Session>> {
        let url = self.descriptor.url();
        let parsed = url::Url::parse(&url)
            .map_err(|_| Error::Connect(format!("invalid endpoint url: {url}")))?;
        if parsed.scheme() != "http" {
            return Err(Error::Connect(format!(
                "only http endpoints are supported: {url}"
            )));
        }
        let uri: hyper::Uri = url
            .parse()
            .map_err(|_| Error::Connect(format!("invalid endpoint url: {url}")))?;

        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            uri,
            session_id: None,
            next_id: 0,
        }))
    }
}

struct HttpSession {
    client: Client<HttpConnector, Full<Bytes>>,
    uri: hyper::Uri,
    session_id: Option<String>,
    next_id: u64,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Initialize,
    Tool,
}

impl Phase {
    fn failed(self, detail: String) -> Error {
        match self {
            Self::Initialize => Error::Initialize(detail),
            Self::Tool => Error::Tool(detail),
        }
    }

    fn timed_out(self, timeout: Duration) -> Error {
        match self {
            Self::Initialize => Error::InitializeTimeout(timeout),
            Self::Tool => Error::ToolTimeout(timeout),
        }
    }
}

impl HttpSession {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Posts one JSON-RPC message. Returns `None` when the server merely
    /// accepted it (notifications get a 202 with no body).
    async fn post(
        &mut self,
        payload: &RpcRequest<'_>,
        timeout: Duration,
        phase: Phase,
    ) -> Result<Option<Value>> {
        let body =
            serde_json::to_vec(payload).map_err(|err| phase.failed(err.to_string()))?;

        let mut builder = Request::post(self.uri.clone())
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(
                http::header::ACCEPT,
                "application/json, text/event-stream",
            );
        if let Some(id) = &self.session_id {
            builder = builder.header(SESSION_ID_HEADER, id.as_str());
        }
        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|err| phase.failed(err.to_string()))?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>((parts, body))
        };

        let (parts, body) = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(err)) => {
                if is_connect_error(err.as_ref()) {
                    return Err(Error::Connect(err.to_string()));
                }
                return Err(phase.failed(err.to_string()));
            }
            Err(_) => return Err(phase.timed_out(timeout)),
        };

        if let Some(id) = parts
            .headers
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(id.to_string());
        }

        if parts.status == StatusCode::ACCEPTED {
            return Ok(None);
        }
        if !parts.status.is_success() {
            return Err(phase.failed(format!("server returned http {}", parts.status)));
        }

        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let message = rpc::decode_body(content_type, &body).map_err(|err| phase.failed(err))?;
        Ok(Some(message))
    }
}

fn is_connect_error(err: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    if let Some(legacy) = err.downcast_ref::<hyper_util::client::legacy::Error>() {
        return legacy.is_connect();
    }
    false
}

#[async_trait]
impl Session for HttpSession {
    async fn initialize(&mut self, timeout: Duration) -> Result<()> {
        let id = self.next_id();
        let params = json!({
            "protocolVersion": rpc::PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "mcpload",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let message = self
            .post(&RpcRequest::call(id, "initialize", params), timeout, Phase::Initialize)
            .await?
            .ok_or_else(|| {
                Error::Initialize("server accepted the handshake without replying".to_string())
            })?;

        let response: RpcResponse = serde_json::from_value(message)
            .map_err(|err| Error::Initialize(err.to_string()))?;
        if let Some(err) = response.error {
            return Err(Error::Initialize(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }

        // The handshake completes once the server has seen this notification.
        self.post(
            &RpcRequest::notification("notifications/initialized"),
            timeout,
            Phase::Initialize,
        )
        .await?;

        Ok(())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        args: &Value,
        timeout: Duration,
    ) -> Result<ToolReply> {
        let id = self.next_id();
        let params = json!({"name": name, "arguments": args});

        let message = self
            .post(&RpcRequest::call(id, "tools/call", params), timeout, Phase::Tool)
            .await?
            .ok_or_else(|| Error::Tool("server accepted the call without replying".to_string()))?;

        let response: RpcResponse =
            serde_json::from_value(message).map_err(|err| Error::Tool(err.to_string()))?;
        if let Some(err) = response.error {
            return Err(Error::ToolRejected(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }

        let result = response.result.unwrap_or(Value::Null);
        if result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(Error::ToolRejected(tool_error_message(&result)));
        }

        Ok(ToolReply { content: result })
    }

    async fn close(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };

        let request = Request::delete(self.uri.clone())
            .header(SESSION_ID_HEADER, id)
            .body(Full::new(Bytes::new()));
        let Ok(request) = request else {
            return;
        };

        // Best effort: a server that doesn't support explicit teardown
        // simply expires the session on its own.
        match tokio::time::timeout(CLOSE_TIMEOUT, self.client.request(request)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => debug!(error = %err, "session teardown ignored"),
            Err(_) => debug!("session teardown timed out"),
        }
    }
}

/// Pulls a readable message out of a failed tool result.
fn tool_error_message(result: &Value) -> String {
    if let Some(text) = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
    {
        return text.to_string();
    }
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_error_message_prefers_text_content() {
        let result = json!({
            "isError": true,
            "content": [{"type": "text", "text": "division by zero"}],
        });
        assert_eq!(tool_error_message(&result), "division by zero");
    }

    #[test]
    fn tool_error_message_falls_back_to_raw_json() {
        let result = json!({"isError": true});
        assert_eq!(tool_error_message(&result), r#"{"isError":true}"#);
    }
}
