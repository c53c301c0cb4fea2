//! MCP wire types: newline-delimited JSON-RPC 2.0 over stdio.

use crate::tool_connection::domain::{ToolConnectionDomainError, ToolDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// MCP protocol revision spoken by this client.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version tag carried by every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error code for unknown methods.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Standard JSON-RPC error code for invalid parameters.
pub const INVALID_PARAMS: i64 = -32602;

/// MCP methods used by the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpMethod {
    /// Opens the session and negotiates capabilities.
    Initialize,
    /// Notification confirming the client finished initialisation.
    Initialized,
    /// Lists the server's tools.
    ListTools,
    /// Invokes a tool.
    CallTool,
    /// Liveness probe, valid in both directions.
    Ping,
}

impl McpMethod {
    /// Returns the wire method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "notifications/initialized",
            Self::ListTools => "tools/list",
            Self::CallTool => "tools/call",
            Self::Ping => "ping",
        }
    }

    /// Parses a wire method name.
    #[must_use]
    pub fn from_wire(method: &str) -> Option<Self> {
        [
            Self::Initialize,
            Self::Initialized,
            Self::ListTools,
            Self::CallTool,
            Self::Ping,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str() == method)
    }
}

impl fmt::Display for McpMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// JSON-RPC request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier, as issued by this client.
    Number(i64),
    /// String identifier, as some servers issue.
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(formatter, "{value}"),
            Self::String(value) => formatter.write_str(value),
        }
    }
}

/// JSON-RPC request or, without an `id`, notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version tag.
    pub jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request expecting a response.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: McpMethod) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id.into()),
            method: method.as_str().to_owned(),
            params: None,
        }
    }

    /// Creates a notification, which receives no response.
    #[must_use]
    pub fn notification(method: McpMethod) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: None,
            method: method.as_str().to_owned(),
            params: None,
        }
    }

    /// Attaches parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl JsonRpcError {
    /// Creates an error object.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// JSON-RPC response carrying exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version tag.
    pub jsonrpc: String,
    /// Identifier of the request being answered.
    pub id: RequestId,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A frame read from the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingFrame {
    /// Response to one of our requests.
    Response(JsonRpcResponse),
    /// Request or notification sent by the peer.
    Request(JsonRpcRequest),
}

impl IncomingFrame {
    /// Decodes one line of input.
    ///
    /// Frames carrying a `method` are requests or notifications; everything
    /// else must be a response.
    ///
    /// # Errors
    ///
    /// Returns the decoding error when the line is not a valid frame.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        if value.get("method").is_some() {
            return Ok(Self::Request(serde_json::from_value(value)?));
        }
        Ok(Self::Response(serde_json::from_value(value)?))
    }
}

/// Tool entry as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTool {
    /// Tool name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments.
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object"})
}

impl TryFrom<WireTool> for ToolDescriptor {
    type Error = ToolConnectionDomainError;

    fn try_from(tool: WireTool) -> Result<Self, Self::Error> {
        let descriptor = Self::new(tool.name, tool.input_schema)?;
        Ok(match tool.description {
            Some(description) => descriptor.with_description(description),
            None => descriptor,
        })
    }
}

impl From<&ToolDescriptor> for WireTool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name().to_owned(),
            description: descriptor.description().map(str::to_owned),
            input_schema: descriptor.input_schema().clone(),
        }
    }
}

/// Result payload of `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools on this page.
    pub tools: Vec<WireTool>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_omits_id() {
        let frame = serde_json::to_value(JsonRpcRequest::notification(McpMethod::Initialized))
            .expect("notification should serialize");
        assert_eq!(
            frame,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );
    }

    #[test]
    fn request_carries_id_and_params() {
        let request = JsonRpcRequest::new(7, McpMethod::CallTool)
            .with_params(json!({"name": "echo", "arguments": {}}));
        let frame = serde_json::to_value(request).expect("request should serialize");
        assert_eq!(frame["id"], json!(7));
        assert_eq!(frame["method"], json!("tools/call"));
    }

    #[test]
    fn decode_distinguishes_requests_from_responses() {
        let ping = IncomingFrame::decode(r#"{"jsonrpc":"2.0","id":"s-1","method":"ping"}"#)
            .expect("ping should decode");
        assert!(matches!(ping, IncomingFrame::Request(ref request) if request.method == "ping"));

        let reply = IncomingFrame::decode(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#)
            .expect("reply should decode");
        assert!(matches!(
            reply,
            IncomingFrame::Response(JsonRpcResponse {
                id: RequestId::Number(1),
                ..
            })
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(IncomingFrame::decode("starting server...").is_err());
    }

    #[test]
    fn wire_tool_converts_to_descriptor() {
        let wire: WireTool = serde_json::from_value(json!({
            "name": "read_query",
            "description": "Execute a SELECT query",
            "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
        }))
        .expect("wire tool should parse");

        let descriptor = ToolDescriptor::try_from(wire).expect("descriptor should be valid");
        assert_eq!(descriptor.name(), "read_query");
        assert_eq!(descriptor.description(), Some("Execute a SELECT query"));
    }

    #[test]
    fn wire_tool_with_padded_name_is_rejected() {
        let wire: WireTool =
            serde_json::from_value(json!({"name": " query"})).expect("wire tool should parse");

        assert_eq!(
            ToolDescriptor::try_from(wire),
            Err(ToolConnectionDomainError::PaddedToolName(" query".to_owned()))
        );
    }

    #[test]
    fn wire_tool_without_schema_defaults_to_object() {
        let wire: WireTool =
            serde_json::from_value(json!({"name": "ping"})).expect("wire tool should parse");
        assert_eq!(wire.input_schema, json!({"type": "object"}));
    }

    #[test]
    fn method_round_trips_through_wire_name() {
        assert_eq!(McpMethod::from_wire("tools/list"), Some(McpMethod::ListTools));
        assert_eq!(McpMethod::from_wire("resources/list"), None);
    }
}
