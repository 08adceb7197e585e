//! Vertex AI REST client for the generative media models.

use crate::config::ServerConfig;
use crate::error::{ToolError, ToolResult};
use crate::operation::{OperationSource, PollStatus};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const USER_AGENT: &str = concat!("genmedia-mcp/", env!("CARGO_PKG_VERSION"));

/// Phrases the platform uses when its safety filters block a request.
const FILTER_MARKERS: [&str; 4] = [
    "responsible ai",
    "usage guidelines",
    "safety filter",
    "raifiltered",
];

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Turn a non-success response into an error carrying the remote message.
pub(crate) async fn error_from_response(response: Response) -> ToolError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => {
            let label = envelope
                .error
                .status
                .clone()
                .unwrap_or_else(|| status.to_string());
            let code = envelope.error.code.unwrap_or(i64::from(status.as_u16()));
            format!("{} ({}): {}", label, code, envelope.error.message)
        }
        Err(_) if body.trim().is_empty() => format!("upstream returned {}", status),
        Err(_) => format!("upstream returned {}: {}", status, body.trim()),
    };
    classify(message)
}

/// Map a remote failure message to `ContentFiltered` or `Upstream`.
pub fn classify(message: String) -> ToolError {
    let lowered = message.to_lowercase();
    if FILTER_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ToolError::ContentFiltered(message)
    } else {
        ToolError::Upstream(message)
    }
}

/// Common request decoration for Google APIs.
pub(crate) fn authorize(
    builder: RequestBuilder,
    project_id: &str,
    token: Option<&str>,
) -> RequestBuilder {
    let builder = builder.header("x-goog-user-project", project_id);
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

pub(crate) fn http_client() -> ToolResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ToolError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Response of a synchronous `:predict` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Value>,
}

/// Client for `publishers/google/models/*` endpoints.
#[derive(Debug, Clone)]
pub struct VertexClient {
    http: Client,
    base_url: Url,
    project_id: String,
    location: String,
    access_token: Option<String>,
}

impl VertexClient {
    pub fn new(config: &ServerConfig) -> ToolResult<Self> {
        let base_url = match &config.api_endpoint {
            Some(url) => url.clone(),
            None => Url::parse(&format!("https://{}-aiplatform.googleapis.com/", config.location))
                .map_err(|e| ToolError::Internal(format!("invalid location: {}", e)))?,
        };
        Ok(Self {
            http: http_client()?,
            base_url,
            project_id: config.project_id.clone(),
            location: config.location.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn model_url(&self, model: &str, verb: &str) -> ToolResult<Url> {
        let path = format!(
            "v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.project_id, self.location, model, verb
        );
        self.base_url
            .join(&path)
            .map_err(|e| ToolError::Internal(format!("invalid endpoint path {}: {}", path, e)))
    }

    async fn post(&self, url: Url, body: &Value) -> ToolResult<Value> {
        tracing::debug!(url = %url, "calling Vertex AI");
        let request = authorize(
            self.http.post(url).header(header::CONTENT_TYPE, "application/json"),
            &self.project_id,
            self.access_token.as_deref(),
        );
        let response = request.json(body).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::Upstream(format!("malformed response: {}", e)))
    }

    /// Synchronous prediction (Imagen, Lyria).
    pub async fn predict(&self, model: &str, body: &Value) -> ToolResult<PredictResponse> {
        let url = self.model_url(model, "predict")?;
        let value = self.post(url, body).await?;
        serde_json::from_value(value)
            .map_err(|e| ToolError::Upstream(format!("malformed prediction response: {}", e)))
    }

    /// Submit a long-running prediction (Veo) and return the operation name.
    pub async fn predict_long_running(&self, model: &str, body: &Value) -> ToolResult<String> {
        let url = self.model_url(model, "predictLongRunning")?;
        let value = self.post(url, body).await?;
        value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ToolError::Upstream("operation response had no name".to_string()))
    }

    /// Check a long-running prediction once.
    pub async fn fetch_operation(&self, model: &str, operation: &str) -> ToolResult<PollStatus> {
        let url = self.model_url(model, "fetchPredictOperation")?;
        let value = self.post(url, &json!({ "operationName": operation })).await?;
        Ok(operation_status(value))
    }

    /// Bind this client to one model so the poller can track its jobs.
    pub fn operations<'a>(&'a self, model: &'a str) -> ModelOperations<'a> {
        ModelOperations {
            client: self,
            model,
        }
    }
}

/// Interpret an operation resource.
pub fn operation_status(value: Value) -> PollStatus {
    if !value.get("done").and_then(Value::as_bool).unwrap_or(false) {
        return PollStatus::Running;
    }
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("operation failed without a message")
            .to_string();
        return PollStatus::Failed(classify(message));
    }
    let response = value.get("response").cloned().unwrap_or(Value::Null);
    PollStatus::Done(response)
}

/// A [`VertexClient`] scoped to one model's operations.
pub struct ModelOperations<'a> {
    client: &'a VertexClient,
    model: &'a str,
}

#[async_trait::async_trait]
impl OperationSource for ModelOperations<'_> {
    async fn poll(&self, operation: &str) -> ToolResult<PollStatus> {
        self.client.fetch_operation(self.model, operation).await
    }
}
