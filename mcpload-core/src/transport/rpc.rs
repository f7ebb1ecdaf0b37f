use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(super) const JSONRPC_VERSION: &str = "2.0";
pub(super) const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Serialize)]
pub(super) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl<'a> RpcRequest<'a> {
    pub(super) fn call(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: Some(params),
            id: Some(id),
        }
    }

    pub(super) fn notification(method: &'a str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: None,
            id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Decodes the JSON-RPC message out of a POST response body. Streamable
/// HTTP servers may answer with a plain JSON body or with a short
/// event-stream carrying the message as its final `data:` payload.
pub(super) fn decode_body(content_type: &str, body: &[u8]) -> std::result::Result<Value, String> {
    if content_type.starts_with("text/event-stream") {
        let text = std::str::from_utf8(body).map_err(|err| err.to_string())?;
        let data =
            last_sse_data(text).ok_or_else(|| "event stream carried no data".to_string())?;
        serde_json::from_str(&data).map_err(|err| err.to_string())
    } else {
        serde_json::from_slice(body).map_err(|err| err.to_string())
    }
}

/// Joins the `data:` lines of the last event in the stream.
fn last_sse_data(text: &str) -> Option<String> {
    let mut current = String::new();
    let mut last = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.is_empty() && !current.is_empty() {
            last = Some(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        last = Some(current);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_envelope_shape() -> anyhow::Result<()> {
        let req = RpcRequest::call(7, "tools/call", json!({"name": "echo"}));
        let encoded = serde_json::to_value(&req)?;
        assert_eq!(
            encoded,
            json!({
                "jsonrpc": "2.0",
                "method": "tools/call",
                "params": {"name": "echo"},
                "id": 7,
            })
        );
        Ok(())
    }

    #[test]
    fn notification_has_no_id_or_params() -> anyhow::Result<()> {
        let req = RpcRequest::notification("notifications/initialized");
        let encoded = serde_json::to_value(&req)?;
        assert_eq!(
            encoded,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );
        Ok(())
    }

    #[test]
    fn decodes_plain_json_body() -> anyhow::Result<()> {
        let message = decode_body("application/json", br#"{"jsonrpc":"2.0","result":{},"id":1}"#)
            .map_err(anyhow::Error::msg)?;
        assert_eq!(message["id"], 1);
        Ok(())
    }

    #[test]
    fn decodes_single_event_stream_body() -> anyhow::Result<()> {
        let body = b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"result\":{\"ok\":true},\"id\":2}\n\n";
        let message =
            decode_body("text/event-stream", body).map_err(anyhow::Error::msg)?;
        assert_eq!(message["result"]["ok"], true);
        Ok(())
    }

    #[test]
    fn takes_the_last_event_of_a_stream() -> anyhow::Result<()> {
        let body = b"data: {\"id\":1}\n\ndata: {\"id\":2}\n\n";
        let message =
            decode_body("text/event-stream", body).map_err(anyhow::Error::msg)?;
        assert_eq!(message["id"], 2);
        Ok(())
    }

    #[test]
    fn empty_event_stream_is_an_error() {
        assert!(decode_body("text/event-stream", b": keepalive\n\n").is_err());
    }
}
