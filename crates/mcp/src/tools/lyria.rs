// Lyria tool: instrumental music generation

use super::output;
use super::{require_range, require_text, Validate};
use crate::context::ToolContext;
use crate::protocol::CallToolResult;
use genmedia_core::media::timestamped_name;
use genmedia_core::{ToolError, ToolResult};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

fn default_model() -> String {
    "lyria-002".to_string()
}

/// Arguments of `lyria_generate_music`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateMusicParams {
    /// Description of the music: genre, mood, instrumentation.
    pub prompt: String,
    /// What the music should not contain.
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Seed for reproducible output. Cannot be combined with sample_count.
    #[serde(default)]
    pub seed: Option<u32>,
    /// Number of clips (1-4). Cannot be combined with seed.
    #[serde(default)]
    pub sample_count: Option<u32>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Output file name. Clips after the first get a numeric suffix.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Local directory for the WAV files.
    #[serde(default)]
    pub local_path: Option<String>,
    /// Bucket to upload the WAV files to.
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

impl Validate for GenerateMusicParams {
    fn validate(&self) -> ToolResult<()> {
        require_text("prompt", &self.prompt)?;
        if self.seed.is_some() && self.sample_count.is_some() {
            return Err(ToolError::invalid("`seed` and `sample_count` are mutually exclusive"));
        }
        if let Some(count) = self.sample_count {
            require_range("sample_count", count, 1, 4)?;
        }
        if let Some(name) = &self.file_name {
            require_text("file_name", name)?;
            if name.contains(['/', '\\']) {
                return Err(ToolError::invalid("`file_name` must not contain path separators"));
            }
        }
        output::bucket_location(self.output_gcs_bucket.as_deref())?;
        Ok(())
    }
}

/// Name of clip `index`: the caller's name (suffixed after the first), else a timestamped one.
fn clip_name(file_name: Option<&str>, index: usize) -> String {
    let Some(name) = file_name else {
        return timestamped_name("lyria", index, "wav");
    };
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());
    if index == 0 {
        format!("{}.{}", stem, extension)
    } else {
        format!("{}-{}.{}", stem, index, extension)
    }
}

pub async fn generate(
    params: GenerateMusicParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let bucket = output::bucket_location(params.output_gcs_bucket.as_deref())?;

    let mut instance = json!({ "prompt": params.prompt });
    if let Some(negative) = params.negative_prompt.as_deref().filter(|n| !n.trim().is_empty()) {
        instance["negative_prompt"] = json!(negative);
    }
    if let Some(seed) = params.seed {
        instance["seed"] = json!(seed);
    }
    let mut parameters = json!({});
    if let Some(count) = params.sample_count {
        parameters["sample_count"] = json!(count);
    }
    let body = json!({ "instances": [instance], "parameters": parameters });

    tracing::info!(model = %params.model, "generating music");
    let response = ctx.vertex.predict(&params.model, &body).await?;

    let clips: Vec<&str> = response
        .predictions
        .iter()
        .filter_map(|p| {
            p.get("bytesBase64Encoded")
                .or_else(|| p.get("audioContent"))
                .and_then(Value::as_str)
        })
        .collect();
    if clips.is_empty() {
        return Err(ToolError::Upstream("the model returned no audio".to_string()));
    }

    let dir = output::output_dir(ctx, params.local_path.as_deref());
    let mut artifacts = Vec::with_capacity(clips.len());
    for (i, clip) in clips.into_iter().enumerate() {
        let data = output::decode_base64(clip)?;
        let name = clip_name(params.file_name.as_deref(), i);
        let mut artifact = output::save(&dir, &name, &data).await?;
        if let (Some(location), Some(path)) = (&bucket, &artifact.local) {
            artifact.remote = Some(ctx.stager.publish(path, location).await?);
        }
        artifacts.push(artifact.with_mime(Some("audio/wav".to_string())));
    }
    Ok(CallToolResult::text(output::summarize("music clip(s)", &artifacts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use crate::tools::{ToolName, ToolRequest};
    use genmedia_core::ErrorKind;
    use wiremock::matchers::{body_partial_json, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_seed_and_sample_count_exclusive() {
        let err = ToolRequest::parse(
            ToolName::LyriaGenerateMusic,
            json!({"prompt": "lofi", "seed": 7, "sample_count": 2}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidationFailed);
        assert!(err.to_string().contains("mutually exclusive"));

        assert!(ToolRequest::parse(ToolName::LyriaGenerateMusic, json!({"prompt": "lofi", "seed": 7})).is_ok());
        assert!(ToolRequest::parse(ToolName::LyriaGenerateMusic, json!({"prompt": "lofi", "sample_count": 5})).is_err());
    }

    #[test]
    fn test_clip_names() {
        assert_eq!(clip_name(Some("theme.wav"), 0), "theme.wav");
        assert_eq!(clip_name(Some("theme.wav"), 2), "theme-2.wav");
        assert_eq!(clip_name(Some("theme"), 1), "theme-1.wav");
        assert!(clip_name(None, 0).starts_with("lyria-"));
    }

    #[tokio::test]
    async fn test_generate_writes_each_clip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"lyria-002:predict$"))
            .and(body_partial_json(json!({
                "instances": [{"prompt": "calm piano", "negative_prompt": "drums"}],
                "parameters": {"sample_count": 2}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [
                    {"bytesBase64Encoded": "UklGRg==", "mimeType": "audio/wav"},
                    {"bytesBase64Encoded": "UklGRg==", "mimeType": "audio/wav"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let ctx = context(&server.uri());
        let params = GenerateMusicParams {
            prompt: "calm piano".into(),
            negative_prompt: Some("drums".into()),
            seed: None,
            sample_count: Some(2),
            model: default_model(),
            file_name: Some("calm.wav".into()),
            local_path: Some(out.path().to_string_lossy().into_owned()),
            output_gcs_bucket: None,
        };
        generate(params, &ctx).await.unwrap();

        assert!(out.path().join("calm.wav").exists());
        assert!(out.path().join("calm-1.wav").exists());
    }

    #[tokio::test]
    async fn test_empty_predictions_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        let params = GenerateMusicParams {
            prompt: "x".into(),
            negative_prompt: None,
            seed: Some(1),
            sample_count: None,
            model: default_model(),
            file_name: None,
            local_path: None,
            output_gcs_bucket: None,
        };
        let err = generate(params, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamApiError);
    }
}
