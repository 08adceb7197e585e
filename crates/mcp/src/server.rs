// MCP dispatcher: routes JSON-RPC methods to the registry, prompts and resources

use crate::context::{CallContext, Notifier, Progress, ToolContext};
use crate::prompts;
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListChangedCapability, ListPromptsResult,
    ListResourcesResult, ListToolsResult, ReadResourceParams, ReadResourceResult,
    ResourcesCapability, ServerCapabilities, ServerInfo, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::resources;
use crate::service::Service;
use crate::tools::{ToolRegistry, ToolRequest};
use genmedia_core::{ToolError, ToolResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Strings longer than this are elided from logged arguments.
const MAX_LOGGED_STRING: usize = 256;

/// Argument keys that carry inlined media.
const BINARY_KEYS: &[&str] = &["data", "bytesBase64Encoded", "audioContent", "image_bytes"];

/// One tool server: its registry plus the shared handler context.
pub struct McpServer {
    service: Service,
    registry: ToolRegistry,
    context: ToolContext,
}

impl McpServer {
    pub fn new(service: Service, context: ToolContext) -> Self {
        let registry = ToolRegistry::for_service(service);
        tracing::info!(
            server = service.server_name(),
            tools = registry.len(),
            "tool registry ready"
        );
        Self {
            service,
            registry,
            context,
        }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Handle one raw message. Returns `None` when no response is due.
    pub async fn handle_message(&self, raw: &str, notifier: &Notifier) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse JSON-RPC message");
                return Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(e)));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request(e)));
            }
        };
        self.handle(request, notifier).await
    }

    /// Handle a parsed request. Notifications produce no response.
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        notifier: &Notifier,
    ) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            let id = request.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version {:?}",
                    request.jsonrpc
                )),
            ));
        }

        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "received notification");
            return None;
        };

        tracing::debug!(method = %request.method, id = %id, "received request");
        let response = match self.dispatch(&request.method, request.params, notifier).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        };
        Some(response)
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        notifier: &Notifier,
    ) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => encode(self.initialize()),
            "ping" => Ok(Value::Object(Map::new())),
            "tools/list" => encode(ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            "tools/call" => {
                let params: CallToolParams = decode_params(params)?;
                let result = self.call_tool(params, notifier).await?;
                encode(result)
            }
            "prompts/list" => encode(ListPromptsResult {
                prompts: prompts::list(self.service),
            }),
            "prompts/get" => {
                let params: GetPromptParams = decode_params(params)?;
                encode(prompts::get(self.service, &params.name, &params.arguments)?)
            }
            "resources/list" => encode(ListResourcesResult {
                resources: resources::list(self.service),
            }),
            "resources/read" => {
                let params: ReadResourceParams = decode_params(params)?;
                let contents = resources::read(self.service, &params.uri)?;
                encode(ReadResourceResult {
                    contents: vec![contents],
                })
            }
            _ => Err(JsonRpcError::method_not_found(method)),
        }
    }

    fn initialize(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ListChangedCapability { list_changed: false },
                prompts: ListChangedCapability { list_changed: false },
                resources: ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: self.service.server_name().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Resolve, validate and run one tool call under its timeout.
    pub async fn call_tool(
        &self,
        params: CallToolParams,
        notifier: &Notifier,
    ) -> ToolResult<CallToolResult> {
        let tool = self.registry.resolve(&params.name)?.name;
        tracing::info!(tool = %tool, arguments = %redact(&params.arguments), "tool call");

        let request = ToolRequest::parse(tool, params.arguments)?;
        let budget = if tool.is_long_running() {
            self.context.config.operation_timeout
        } else {
            self.context.config.request_timeout
        };

        let cancel = CancellationToken::new();
        let token = params.meta.and_then(|meta| meta.progress_token);
        let call = CallContext::new(cancel.clone(), Progress::new(token, notifier.clone()));

        let started = Instant::now();
        let execution = request.execute(&self.context, &call);
        let outcome = match tokio::time::timeout(budget, execution).await {
            Ok(outcome) => outcome,
            Err(_) => {
                cancel.cancel();
                Err(ToolError::Timeout(format!(
                    "{} did not complete within {}s",
                    tool,
                    budget.as_secs()
                )))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::info!(tool = %tool, elapsed_ms, "tool call succeeded"),
            Err(e) => tracing::warn!(
                tool = %tool,
                elapsed_ms,
                kind = e.kind().as_str(),
                error = %e,
                "tool call failed"
            ),
        }
        outcome
    }
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn encode<T: Serialize>(result: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Copy of `value` safe to log: inlined media and long strings become size markers.
pub(crate) fn redact(value: &Value) -> Value {
    match value {
        Value::String(s) if s.len() > MAX_LOGGED_STRING => elided(s),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| {
                    let field = match field {
                        Value::String(s) if BINARY_KEYS.contains(&key.as_str()) => elided(s),
                        other => redact(other),
                    };
                    (key.clone(), field)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn elided(s: &str) -> Value {
    Value::String(format!("<{} bytes elided>", s.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolContent;
    use crate::test_support::{context, context_with};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server(service: Service, endpoint: &str) -> McpServer {
        McpServer::new(service, context(endpoint))
    }

    async fn call(server: &McpServer, method: &str, params: Value) -> JsonRpcResponse {
        server
            .handle(JsonRpcRequest::new(1, method, params), &Notifier::disabled())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_reports_server() {
        let server = server(Service::Lyria, "http://127.0.0.1:9");
        let response = call(
            &server,
            "initialize",
            json!({"protocolVersion": PROTOCOL_VERSION, "clientInfo": {"name": "t", "version": "1"}}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "mcp-lyria");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list_is_stable() {
        let server = server(Service::Imagen, "http://127.0.0.1:9");
        let first = call(&server, "tools/list", json!({})).await.result.unwrap();
        let second = call(&server, "tools/list", json!({})).await.result.unwrap();
        assert_eq!(first, second);
        let names: Vec<&str> = first["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["imagen_t2i", "imagen_edit"]);
        assert!(first["tools"][0]["inputSchema"]["properties"]["prompt"].is_object());
    }

    #[tokio::test]
    async fn test_missing_field_never_reaches_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let server = server(Service::Imagen, &upstream.uri());
        let response = call(
            &server,
            "tools/call",
            json!({"name": "imagen_t2i", "arguments": {"num_images": 2}}),
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.kind(), Some("SchemaValidationFailed"));
        assert!(error.message.contains("prompt"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_method() {
        let server = server(Service::Veo, "http://127.0.0.1:9");
        let response =
            call(&server, "tools/call", json!({"name": "imagen_t2i", "arguments": {}})).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.kind(), Some("UnknownTool"));

        let response = call(&server, "tools/destroy", json!({})).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert!(error.kind().is_none());
    }

    #[tokio::test]
    async fn test_list_chirp_voices_call() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "voices": [
                    {"name": "en-US-Chirp3-HD-Puck", "languageCodes": ["en-US"], "ssmlGender": "MALE", "naturalSampleRateHertz": 24000},
                    {"name": "de-DE-Chirp3-HD-Puck", "languageCodes": ["de-DE"], "ssmlGender": "MALE", "naturalSampleRateHertz": 24000}
                ]
            })))
            .mount(&upstream)
            .await;

        let server = server(Service::Chirp3, &upstream.uri());
        let response = call(
            &server,
            "tools/call",
            json!({"name": "list_chirp_voices", "arguments": {"language": "en-US"}}),
        )
        .await;
        let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
        let ToolContent::Text { text } = &result.content[0] else {
            panic!("expected text");
        };
        let voices: Vec<Value> = serde_json::from_str(text).unwrap();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0]["name"], "en-US-Chirp3-HD-Puck");
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/voices"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"voices": []}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&upstream)
            .await;

        let server = McpServer::new(
            Service::Chirp3,
            context_with(&upstream.uri(), &[("GENMEDIA_REQUEST_TIMEOUT_SECS", "1")]),
        );
        let response = call(
            &server,
            "tools/call",
            json!({"name": "list_chirp_voices", "arguments": {"language": "en-US"}}),
        )
        .await;
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32005);
        assert_eq!(error.kind(), Some("Timeout"));
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server(Service::Avtool, "http://127.0.0.1:9");
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server.handle_message(raw, &Notifier::disabled()).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_messages() {
        let server = server(Service::Avtool, "http://127.0.0.1:9");
        let response = server.handle_message("{not json", &Notifier::disabled()).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32700);
        assert_eq!(response.id, Value::Null);

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":4}"#, &Notifier::disabled())
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
        assert_eq!(response.id, json!(4));
    }

    #[tokio::test]
    async fn test_prompts_and_resources() {
        let server = server(Service::Chirp3, "http://127.0.0.1:9");
        let prompts = call(&server, "prompts/list", json!({})).await.result.unwrap();
        assert_eq!(prompts["prompts"][0]["name"], "speak-text");

        let missing = call(&server, "prompts/get", json!({"name": "speak-text"})).await;
        assert_eq!(missing.error.unwrap().code, -32602);

        let read = call(&server, "resources/read", json!({"uri": "chirp3://voices"})).await;
        assert_eq!(read.result.unwrap()["contents"][0]["uri"], "chirp3://voices");

        let unknown = call(&server, "resources/read", json!({"uri": "chirp3://nothing"})).await;
        assert_eq!(unknown.error.unwrap().code, -32602);
    }

    #[test]
    fn test_redaction() {
        let long = "x".repeat(300);
        let redacted = redact(&json!({
            "prompt": "a cat",
            "image": {"data": "aGVsbG8=", "mimeType": "image/png"},
            "notes": [long],
        }));
        assert_eq!(redacted["prompt"], "a cat");
        assert_eq!(redacted["image"]["data"], "<8 bytes elided>");
        assert_eq!(redacted["image"]["mimeType"], "image/png");
        assert_eq!(redacted["notes"][0], "<300 bytes elided>");
    }
}
