// Veo tools: text-to-video and image-to-video through long-running operations

use super::output::{self, Artifact};
use super::{require_range, require_text, Validate};
use crate::context::{CallContext, ToolContext};
use crate::protocol::CallToolResult;
use genmedia_core::media::timestamped_name;
use genmedia_core::{GcsUri, MediaReference, ToolError, ToolResult};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

const ASPECT_RATIOS: [&str; 2] = ["16:9", "9:16"];
const STEPS: u64 = 3;

fn default_model() -> String {
    "veo-2.0-generate-001".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_duration() -> u32 {
    5
}

fn one() -> u32 {
    1
}

/// Arguments of `veo_t2v`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TextToVideoParams {
    /// Text description of the video.
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Number of videos (1-4).
    #[serde(default = "one")]
    #[schemars(range(min = 1, max = 4))]
    pub num_videos: u32,
    /// 16:9 or 9:16.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Clip length in seconds (5-8).
    #[serde(default = "default_duration")]
    #[schemars(range(min = 5, max = 8))]
    pub duration: u32,
    /// Bucket (optionally with a prefix) the API writes videos to.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Local directory to download the videos into.
    #[serde(default)]
    pub output_directory: Option<String>,
}

impl Validate for TextToVideoParams {
    fn validate(&self) -> ToolResult<()> {
        require_text("prompt", &self.prompt)?;
        validate_common(self.num_videos, &self.aspect_ratio, self.duration, self.bucket.as_deref())
    }
}

/// Arguments of `veo_i2v`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ImageToVideoParams {
    /// Starting frame: a local path or a gs:// URI.
    pub image_uri: String,
    /// MIME type of the image. Derived from the file extension when omitted.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Optional description of the motion.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "one")]
    #[schemars(range(min = 1, max = 4))]
    pub num_videos: u32,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_duration")]
    #[schemars(range(min = 5, max = 8))]
    pub duration: u32,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub output_directory: Option<String>,
}

impl Validate for ImageToVideoParams {
    fn validate(&self) -> ToolResult<()> {
        let reference: MediaReference = self.image_uri.parse()?;
        let mime = self.mime_type.clone().or_else(|| reference.mime_type());
        match mime.as_deref() {
            Some(mime) if mime.starts_with("image/") => {}
            Some(mime) => {
                return Err(ToolError::invalid(format!("{} is not an image type", mime)));
            }
            None => {
                return Err(ToolError::invalid(
                    "`mime_type` is required when it cannot be derived from `image_uri`",
                ));
            }
        }
        validate_common(self.num_videos, &self.aspect_ratio, self.duration, self.bucket.as_deref())
    }
}

fn validate_common(
    num_videos: u32,
    aspect_ratio: &str,
    duration: u32,
    bucket: Option<&str>,
) -> ToolResult<()> {
    require_range("num_videos", num_videos, 1, 4)?;
    require_range("duration", duration, 5, 8)?;
    if !ASPECT_RATIOS.contains(&aspect_ratio) {
        return Err(ToolError::invalid(format!(
            "unsupported aspect_ratio {:?}, expected 16:9 or 9:16",
            aspect_ratio
        )));
    }
    output::bucket_location(bucket)?;
    Ok(())
}

struct VideoJob<'a> {
    model: &'a str,
    instance: Value,
    num_videos: u32,
    aspect_ratio: &'a str,
    duration: u32,
    storage: Option<GcsUri>,
    output_directory: Option<&'a str>,
}

pub async fn text_to_video(
    params: TextToVideoParams,
    ctx: &ToolContext,
    call: &CallContext,
) -> ToolResult<CallToolResult> {
    let job = VideoJob {
        model: &params.model,
        instance: json!({ "prompt": params.prompt }),
        num_videos: params.num_videos,
        aspect_ratio: &params.aspect_ratio,
        duration: params.duration,
        storage: output::bucket_location(params.bucket.as_deref())?,
        output_directory: params.output_directory.as_deref(),
    };
    run(job, ctx, call).await
}

pub async fn image_to_video(
    params: ImageToVideoParams,
    ctx: &ToolContext,
    call: &CallContext,
) -> ToolResult<CallToolResult> {
    let storage = output::bucket_location(params.bucket.as_deref())?;
    let reference: MediaReference = params.image_uri.parse()?;
    let mime_type = params
        .mime_type
        .clone()
        .or_else(|| reference.mime_type())
        .unwrap_or_else(|| "image/png".to_string());
    let staging = storage
        .as_ref()
        .map(|location| location.bucket.as_str())
        .or(ctx.config.bucket.as_deref());
    let image = ctx.stager.stage(&reference, staging).await?;

    let mut instance = json!({
        "image": { "gcsUri": image.to_string(), "mimeType": mime_type },
    });
    if let Some(prompt) = params.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        instance["prompt"] = json!(prompt);
    }
    let job = VideoJob {
        model: &params.model,
        instance,
        num_videos: params.num_videos,
        aspect_ratio: &params.aspect_ratio,
        duration: params.duration,
        storage,
        output_directory: params.output_directory.as_deref(),
    };
    run(job, ctx, call).await
}

/// Submit, wait for the operation, then collect the videos.
async fn run(
    job: VideoJob<'_>,
    ctx: &ToolContext,
    call: &CallContext,
) -> ToolResult<CallToolResult> {
    let mut parameters = json!({
        "sampleCount": job.num_videos,
        "aspectRatio": job.aspect_ratio,
        "durationSeconds": job.duration,
    });
    if let Some(location) = &job.storage {
        parameters["storageUri"] = json!(location.to_string());
    }
    let body = json!({ "instances": [job.instance], "parameters": parameters });

    let operation = ctx.vertex.predict_long_running(job.model, &body).await?;
    tracing::info!(model = job.model, operation = %operation, "video generation submitted");
    call.progress.report(Some(STEPS), format!("submitted {}", operation));

    let response = ctx
        .poller
        .wait(&ctx.vertex.operations(job.model), &operation, &call.cancel)
        .await?;
    call.progress.report(Some(STEPS), "generation finished");

    let artifacts = collect_videos(&response, ctx, job.output_directory).await?;
    call.progress.report(Some(STEPS), "videos collected");
    Ok(CallToolResult::text(output::summarize("video(s)", &artifacts)))
}

async fn collect_videos(
    response: &Value,
    ctx: &ToolContext,
    output_directory: Option<&str>,
) -> ToolResult<Vec<Artifact>> {
    let videos = response
        .get("videos")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if videos.is_empty() {
        let reasons: Vec<String> = response
            .get("raiMediaFilteredReasons")
            .and_then(Value::as_array)
            .map(|reasons| {
                reasons
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        return Err(if reasons.is_empty() {
            ToolError::Upstream("the operation finished without producing videos".to_string())
        } else {
            ToolError::ContentFiltered(reasons.join("; "))
        });
    }

    let dir = output::output_dir(ctx, output_directory);
    let mut artifacts = Vec::with_capacity(videos.len());
    for (i, video) in videos.iter().enumerate() {
        let mime_type = video
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or("video/mp4")
            .to_string();
        let name = timestamped_name("veo", i, output::extension_for(&mime_type));

        let artifact = if let Some(uri) = video.get("gcsUri").and_then(Value::as_str) {
            let uri = output::upstream_uri(uri)?;
            if output_directory.is_some() {
                let bytes = ctx.stager.fetch(&uri).await?;
                let file_name = uri.file_name().map(str::to_string).unwrap_or(name);
                let mut artifact = output::save(&dir, &file_name, &bytes).await?;
                artifact.remote = Some(uri);
                artifact
            } else {
                Artifact::remote(uri)
            }
        } else if let Some(data) = video.get("bytesBase64Encoded").and_then(Value::as_str) {
            output::save(&dir, &name, &output::decode_base64(data)?).await?
        } else {
            return Err(ToolError::Upstream(format!("video {} has neither a URI nor data", i)));
        };
        artifacts.push(artifact.with_mime(Some(mime_type)));
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Notifier, Progress};
    use crate::protocol::{Outgoing, ToolContent};
    use crate::test_support::{context, context_with};
    use crate::tools::{ToolName, ToolRequest};
    use bytes::Bytes;
    use genmedia_core::storage::ObjectStorage;
    use genmedia_core::ErrorKind;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn t2v(
        prompt: &str,
        bucket: Option<&str>,
        output_directory: Option<String>,
    ) -> TextToVideoParams {
        TextToVideoParams {
            prompt: prompt.into(),
            model: default_model(),
            num_videos: 1,
            aspect_ratio: default_aspect_ratio(),
            duration: default_duration(),
            bucket: bucket.map(str::to_string),
            output_directory,
        }
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path_regex(r":predictLongRunning$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ops/veo-1"})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_parameter_ranges() {
        for arguments in [
            json!({"prompt": "p", "duration": 4}),
            json!({"prompt": "p", "duration": 9}),
            json!({"prompt": "p", "num_videos": 5}),
            json!({"prompt": "p", "aspect_ratio": "1:1"}),
        ] {
            let err = ToolRequest::parse(ToolName::VeoT2v, arguments).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaValidationFailed);
        }
        assert!(ToolRequest::parse(ToolName::VeoT2v, json!({"prompt": "p", "duration": 8})).is_ok());
    }

    #[test]
    fn test_i2v_needs_image_type() {
        assert!(ToolRequest::parse(ToolName::VeoI2v, json!({"image_uri": "gs://b/a.png"})).is_ok());
        assert!(ToolRequest::parse(ToolName::VeoI2v, json!({"image_uri": "gs://b/a.mp4"})).is_err());
        assert!(ToolRequest::parse(ToolName::VeoI2v, json!({"image_uri": "gs://b/frame"})).is_err());
        assert!(ToolRequest::parse(
            ToolName::VeoI2v,
            json!({"image_uri": "gs://b/frame", "mime_type": "image/jpeg"})
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_text_to_video_downloads_results() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r":fetchPredictOperation$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ops/veo-1",
                "done": true,
                "response": {"videos": [{"gcsUri": "gs://renders/veo/sample_0.mp4", "mimeType": "video/mp4"}]}
            })))
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        ctx.stager
            .storage()
            .put(&GcsUri::new("renders", "veo/sample_0.mp4"), Bytes::from_static(b"mp4"))
            .await
            .unwrap();

        let out = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let call = CallContext::new(
            CancellationToken::new(),
            Progress::new(Some(json!(7)), Notifier::new(tx)),
        );
        let params = t2v(
            "waves at dusk",
            Some("gs://renders/veo"),
            Some(out.path().to_string_lossy().into_owned()),
        );
        let result = text_to_video(params, &ctx, &call).await.unwrap();

        let saved = out.path().join("sample_0.mp4");
        assert_eq!(std::fs::read(&saved).unwrap(), b"mp4");
        match &result.content[0] {
            ToolContent::Text { text } => {
                assert!(text.contains("gs://renders/veo/sample_0.mp4"));
                assert!(text.contains("sample_0.mp4"));
            }
            other => panic!("unexpected content {other:?}"),
        }

        let mut progress = 0;
        while let Ok(Outgoing::Notification(_)) = rx.try_recv() {
            progress += 1;
        }
        assert_eq!(progress, 3);
    }

    #[tokio::test]
    async fn test_never_finishing_job_times_out() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r":fetchPredictOperation$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ops/veo-1"})))
            .mount(&server)
            .await;

        let ctx = context_with(
            &server.uri(),
            &[
                ("GENMEDIA_OPERATION_TIMEOUT_SECS", "1"),
                ("GENMEDIA_POLL_INTERVAL_SECS", "1"),
            ],
        );
        let call = CallContext::default();
        let err = text_to_video(t2v("never", None, None), &ctx, &call).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(call.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_operation_failure_is_verbatim() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        let reason = "Veo could not generate videos because the input image violates Vertex AI's usage guidelines.";
        Mock::given(method("POST"))
            .and(path_regex(r":fetchPredictOperation$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ops/veo-1",
                "done": true,
                "error": {"code": 3, "message": reason}
            })))
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        let err = text_to_video(t2v("x", None, None), &ctx, &CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFiltered);
        assert!(err.to_string().contains(reason));
    }

    #[tokio::test]
    async fn test_malformed_result_uri_is_upstream_error() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r":fetchPredictOperation$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "response": {"videos": [{"gcsUri": "gs://renders", "mimeType": "video/mp4"}]}
            })))
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        let err = text_to_video(t2v("x", None, None), &ctx, &CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamApiError);
    }

    #[tokio::test]
    async fn test_filtered_response_without_videos() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r":fetchPredictOperation$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "response": {"raiMediaFilteredCount": 1, "raiMediaFilteredReasons": ["Unable to generate videos due to child content."]}
            })))
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        let err = text_to_video(t2v("x", None, None), &ctx, &CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFiltered);
        assert!(err.to_string().contains("child content"));
    }
}
