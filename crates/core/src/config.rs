//! Process-wide configuration, read once from the environment at startup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
/// Upper bound for any duration setting: one week.
const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Errors raised while assembling the startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Channel over which protocol messages are exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Sse,
    Http,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "sse" => Ok(Self::Sse),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Invalid {
                name: "MCP_TRANSPORT",
                value: other.to_string(),
                reason: "expected one of stdio, sse, http".to_string(),
            }),
        }
    }
}

/// Immutable server configuration shared by the listener and every handler.
#[derive(Clone)]
pub struct ServerConfig {
    pub project_id: String,
    pub location: String,
    /// Default bucket for generated outputs and staged local inputs.
    pub bucket: Option<String>,
    pub port: u16,
    pub transport: TransportMode,
    /// Upper bound for a single tool call.
    pub request_timeout: Duration,
    /// Upper bound for tools that wait on long-running remote jobs.
    pub operation_timeout: Duration,
    pub poll_interval: Duration,
    /// Overrides the Vertex AI and Text-to-Speech base URLs.
    pub api_endpoint: Option<Url>,
    pub access_token: Option<String>,
    pub output_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_id = get("PROJECT_ID")
            .or_else(|| get("GOOGLE_CLOUD_PROJECT"))
            .ok_or(ConfigError::Missing("PROJECT_ID"))?;

        let port = match get("PORT") {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let transport = match get("MCP_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => TransportMode::default(),
        };

        let api_endpoint = match get("VERTEX_API_ENDPOINT") {
            Some(raw) => Some(Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                name: "VERTEX_API_ENDPOINT",
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            project_id,
            location: get("LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            bucket: get("GENMEDIA_BUCKET").map(|b| b.trim_start_matches("gs://").to_string()),
            port,
            transport,
            request_timeout: seconds(
                "GENMEDIA_REQUEST_TIMEOUT_SECS",
                get("GENMEDIA_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            operation_timeout: seconds(
                "GENMEDIA_OPERATION_TIMEOUT_SECS",
                get("GENMEDIA_OPERATION_TIMEOUT_SECS"),
                DEFAULT_OPERATION_TIMEOUT_SECS,
            )?,
            poll_interval: seconds(
                "GENMEDIA_POLL_INTERVAL_SECS",
                get("GENMEDIA_POLL_INTERVAL_SECS"),
                DEFAULT_POLL_INTERVAL_SECS,
            )?,
            api_endpoint,
            access_token: get("GOOGLE_ACCESS_TOKEN"),
            output_dir: get("GENMEDIA_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("genmedia")),
            ffmpeg_path: get("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            ffprobe_path: get("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffprobe")),
        })
    }

    /// Replace the transport selected by the environment (CLI flag wins).
    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    /// Socket address for the HTTP and SSE transports.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("bucket", &self.bucket)
            .field("port", &self.port)
            .field("transport", &self.transport)
            .field("request_timeout", &self.request_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("api_endpoint", &self.api_endpoint.as_ref().map(Url::as_str))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("output_dir", &self.output_dir)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("ffprobe_path", &self.ffprobe_path)
            .finish()
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn seconds(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => parse_value::<u64>(name, &raw)?,
        None => default,
    };
    if secs == 0 || secs > MAX_DURATION_SECS {
        return Err(ConfigError::Invalid {
            name,
            value: secs.to_string(),
            reason: format!("must be between 1 and {} seconds", MAX_DURATION_SECS),
        });
    }
    Ok(Duration::from_secs(secs))
}
