use crate::constants::protocol::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::errors::{ErrorCode, McpError};
use crate::mcp::catalog::list_tools;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::{prompts, resources};
use crate::services::dispatcher::{ToolCall, ToolDispatcher};
use crate::services::logger::Logger;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const INSTRUCTIONS: &str = "Tools mirror the WebPosto ERP API. Most queries are scoped by company: \
call consultar_empresas first and pass the code as empresa_codigo or filial. \
Dates are YYYY-MM-DD. List tools page with limite and ultimo_codigo.";

/// JSON-RPC front door: one request line in, at most one response line out.
pub struct ProtocolAdapter {
    logger: Logger,
    dispatcher: Arc<ToolDispatcher>,
    tools: Value,
}

fn object_param<'a>(params: &'a Value, key: &str) -> Result<Option<&'a Map<String, Value>>, McpError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(McpError::invalid_params(format!("{} must be an object", key))),
    }
}

fn string_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, McpError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| McpError::invalid_params(format!("Missing {}", key)))
}

impl ProtocolAdapter {
    pub fn new(logger: Logger, dispatcher: Arc<ToolDispatcher>) -> Self {
        let tools = json!({ "tools": list_tools(dispatcher.registry()) });
        Self {
            logger: logger.child("protocol"),
            dispatcher,
            tools,
        }
    }

    /// Same as [`handle`](Self::handle) for a raw transport line that may not be UTF-8.
    pub async fn handle_bytes(&self, raw: &[u8]) -> Option<String> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.handle(text.trim()).await,
            Err(err) => {
                self.logger
                    .warn("Request is not UTF-8", Some(&json!({"error": err.to_string()})));
                Some(parse_error())
            }
        }
    }

    pub async fn handle(&self, raw: &str) -> Option<String> {
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                self.logger
                    .warn("Unparseable request", Some(&json!({"error": err.to_string()})));
                return Some(parse_error());
            }
        };
        let fallback_id = parsed.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(request) => request,
            Err(_) => return Some(invalid_request(fallback_id)),
        };
        let bad_version = request.jsonrpc.as_deref().map_or(false, |v| v != "2.0");
        if bad_version || request.method.trim().is_empty() {
            return Some(invalid_request(fallback_id));
        }
        if request.is_notification() {
            self.logger.debug(
                "Notification received",
                Some(&json!({"method": request.method})),
            );
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match self.route(&request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::failure(id, err.code.as_i32(), err.message),
        };
        Some(response.to_line())
    }

    async fn route(&self, request: &JsonRpcRequest) -> Result<Value, McpError> {
        let params = &request.params;
        match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {"listChanged": false},
                    "resources": {"listChanged": false},
                    "prompts": {"listChanged": false}
                },
                "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
                "instructions": INSTRUCTIONS
            })),
            "ping" => Ok(json!({})),
            method if method.starts_with("notifications/") => Ok(json!({})),
            "tools/list" => Ok(self.tools.clone()),
            "tools/call" => self.call_tool(params).await,
            "resources/list" => Ok(resources::list_resources()),
            "resources/read" => {
                let uri = string_param(params, "uri")?;
                resources::read_resource(self.dispatcher.registry(), uri)
            }
            "prompts/list" => Ok(prompts::list_prompts()),
            "prompts/get" => {
                let name = string_param(params, "name")?;
                let empty = Map::new();
                let args = object_param(params, "arguments")?.unwrap_or(&empty);
                prompts::get_prompt(name, args)
            }
            other => Err(McpError::new(
                ErrorCode::MethodNotFound,
                format!("Method not found: {}", other),
            )),
        }
    }

    async fn call_tool(&self, params: &Value) -> Result<Value, McpError> {
        let name = string_param(params, "name").map_err(|_| McpError::invalid_params("Missing tool name"))?;
        let arguments = object_param(params, "arguments")?.cloned().unwrap_or_default();
        let envelope = self.dispatcher.dispatch(ToolCall::new(name, arguments)).await;
        let structured = serde_json::to_value(&envelope)
            .map_err(|err| McpError::new(ErrorCode::InternalError, err.to_string()))?;
        let text = serde_json::to_string(&structured)
            .map_err(|err| McpError::new(ErrorCode::InternalError, err.to_string()))?;
        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": structured,
            "isError": !envelope.success
        }))
    }
}

fn parse_error() -> String {
    JsonRpcResponse::failure(
        Value::Null,
        ErrorCode::ParseError.as_i32(),
        "Parse error".to_string(),
    )
    .to_line()
}

fn invalid_request(id: Value) -> String {
    JsonRpcResponse::failure(
        id,
        ErrorCode::InvalidRequest.as_i32(),
        "Invalid request".to_string(),
    )
    .to_line()
}
