// Helpers for reporting generated artifacts

use crate::context::ToolContext;
use base64::Engine;
use genmedia_core::storage::save_file;
use genmedia_core::{GcsUri, ToolError, ToolResult};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Where one generated artifact ended up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifact {
    pub local: Option<PathBuf>,
    pub remote: Option<GcsUri>,
    pub mime_type: Option<String>,
}

impl Artifact {
    pub fn local(path: PathBuf) -> Self {
        Self {
            local: Some(path),
            ..Self::default()
        }
    }

    pub fn remote(uri: GcsUri) -> Self {
        Self {
            remote: Some(uri),
            ..Self::default()
        }
    }

    pub fn with_mime(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }
}

/// Human-readable listing of artifacts, one per line.
pub fn summarize(what: &str, artifacts: &[Artifact]) -> String {
    let mut text = format!("Generated {} {}:", artifacts.len(), what);
    for (i, artifact) in artifacts.iter().enumerate() {
        let _ = write!(text, "\n{}.", i + 1);
        if let Some(path) = &artifact.local {
            let _ = write!(text, " saved to {}", path.display());
        }
        if let Some(uri) = &artifact.remote {
            let _ = write!(text, " stored at {}", uri);
        }
        if let Some(mime) = &artifact.mime_type {
            let _ = write!(text, " ({})", mime);
        }
    }
    text
}

/// Directory for local outputs: the call's own choice, else the configured default.
pub fn output_dir(ctx: &ToolContext, requested: Option<&str>) -> PathBuf {
    match requested.map(str::trim).filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => ctx.config.output_dir.clone(),
    }
}

/// Parse an optional bucket argument into an output location.
pub fn bucket_location(requested: Option<&str>) -> ToolResult<Option<GcsUri>> {
    requested
        .map(str::trim)
        .filter(|bucket| !bucket.is_empty())
        .map(GcsUri::parse_location)
        .transpose()
}

pub fn decode_base64(data: &str) -> ToolResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| ToolError::Upstream(format!("invalid base64 payload: {}", e)))
}

/// Object URI reported by a generation API. A malformed one is the API's fault.
pub fn upstream_uri(raw: &str) -> ToolResult<GcsUri> {
    GcsUri::parse(raw)
        .map_err(|e| ToolError::Upstream(format!("unusable output URI {:?}: {}", raw, e)))
}

/// File extension for a generated media MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/png" => "png",
        "video/mp4" => "mp4",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        other if other.starts_with("video/") => "mp4",
        other if other.starts_with("audio/") => "wav",
        _ => "png",
    }
}

/// Persist a downloaded or inline artifact under `dir`.
pub async fn save(dir: &Path, name: &str, data: &[u8]) -> ToolResult<Artifact> {
    let path = save_file(dir, name, data).await?;
    tracing::info!(path = %path.display(), bytes = data.len(), "saved artifact");
    Ok(Artifact::local(path))
}
