// Imagen tools: text-to-image and image editing

use super::output::{self, Artifact};
use super::{require_range, require_text, Validate};
use crate::context::ToolContext;
use crate::protocol::{CallToolResult, ToolContent};
use crate::resources::SEGMENTATION_CLASS_COUNT;
use genmedia_core::media::timestamped_name;
use genmedia_core::vertex::PredictResponse;
use genmedia_core::{MediaReference, ToolError, ToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const ASPECT_RATIOS: [&str; 5] = ["1:1", "3:4", "4:3", "16:9", "9:16"];
const MAX_MASK_CLASSES: usize = 5;

fn default_generate_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

fn default_edit_model() -> String {
    "imagen-3.0-capability-001".to_string()
}

fn one() -> u32 {
    1
}

/// Arguments of `imagen_t2i`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateImageParams {
    /// Text description of the image to generate.
    pub prompt: String,
    /// Imagen model id.
    #[serde(default = "default_generate_model")]
    pub model: String,
    /// Number of images to generate (1-4).
    #[serde(default = "one")]
    #[schemars(range(min = 1, max = 4))]
    pub num_images: u32,
    /// One of 1:1, 3:4, 4:3, 16:9, 9:16. The API default applies when omitted.
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Bucket (optionally with a prefix) the API writes images to.
    #[serde(default)]
    pub gcs_bucket_uri: Option<String>,
    /// Local directory to save images into.
    #[serde(default)]
    pub output_directory: Option<String>,
}

impl Validate for GenerateImageParams {
    fn validate(&self) -> ToolResult<()> {
        require_text("prompt", &self.prompt)?;
        require_range("num_images", self.num_images, 1, 4)?;
        validate_aspect_ratio(self.aspect_ratio.as_deref())?;
        output::bucket_location(self.gcs_bucket_uri.as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    InpaintInsert,
    InpaintRemove,
    Outpaint,
    BackgroundSwap,
}

impl EditMode {
    fn api_name(&self) -> &'static str {
        match self {
            Self::InpaintInsert => "EDIT_MODE_INPAINT_INSERTION",
            Self::InpaintRemove => "EDIT_MODE_INPAINT_REMOVAL",
            Self::Outpaint => "EDIT_MODE_OUTPAINT",
            Self::BackgroundSwap => "EDIT_MODE_BGSWAP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    #[default]
    Background,
    Foreground,
    Semantic,
}

impl MaskMode {
    fn api_name(&self) -> &'static str {
        match self {
            Self::Background => "MASK_MODE_BACKGROUND",
            Self::Foreground => "MASK_MODE_FOREGROUND",
            Self::Semantic => "MASK_MODE_SEMANTIC",
        }
    }
}

/// Arguments of `imagen_edit`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EditImageParams {
    /// Image to edit: a local path or a gs:// URI.
    pub image_uri: String,
    /// What to insert or how to fill the edited region.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub edit_mode: EditMode,
    /// How the edit mask is derived from the image.
    #[serde(default)]
    pub mask_mode: MaskMode,
    /// Class ids (see imagen://segmentation_classes) for semantic masks, at most 5.
    #[serde(default)]
    pub segmentation_classes: Vec<u32>,
    #[serde(default = "default_edit_model")]
    pub model: String,
    #[serde(default = "one")]
    #[schemars(range(min = 1, max = 4))]
    pub number_of_images: u32,
    #[serde(default)]
    pub gcs_bucket_uri: Option<String>,
    #[serde(default)]
    pub output_directory: Option<String>,
}

impl Validate for EditImageParams {
    fn validate(&self) -> ToolResult<()> {
        self.image_uri.parse::<MediaReference>()?;
        require_range("number_of_images", self.number_of_images, 1, 4)?;
        if matches!(self.edit_mode, EditMode::InpaintInsert | EditMode::BackgroundSwap) {
            require_text("prompt", self.prompt.as_deref().unwrap_or_default())?;
        }
        match self.mask_mode {
            MaskMode::Semantic if self.segmentation_classes.is_empty() => {
                return Err(ToolError::invalid(
                    "`segmentation_classes` is required for the semantic mask mode",
                ));
            }
            MaskMode::Background | MaskMode::Foreground
                if !self.segmentation_classes.is_empty() =>
            {
                return Err(ToolError::invalid(
                    "`segmentation_classes` only applies to the semantic mask mode",
                ));
            }
            _ => {}
        }
        if self.segmentation_classes.len() > MAX_MASK_CLASSES {
            return Err(ToolError::invalid(format!(
                "at most {} segmentation classes may be given",
                MAX_MASK_CLASSES
            )));
        }
        if let Some(class) = self
            .segmentation_classes
            .iter()
            .find(|&&class| class as usize >= SEGMENTATION_CLASS_COUNT)
        {
            return Err(ToolError::invalid(format!("unknown segmentation class {}", class)));
        }
        output::bucket_location(self.gcs_bucket_uri.as_deref())?;
        Ok(())
    }
}

fn validate_aspect_ratio(ratio: Option<&str>) -> ToolResult<()> {
    match ratio {
        Some(ratio) if !ASPECT_RATIOS.contains(&ratio) => Err(ToolError::invalid(format!(
            "unsupported aspect_ratio {:?}, expected one of {}",
            ratio,
            ASPECT_RATIOS.join(", ")
        ))),
        _ => Ok(()),
    }
}

pub async fn generate(
    params: GenerateImageParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let storage = output::bucket_location(params.gcs_bucket_uri.as_deref())?;

    let mut parameters = json!({
        "sampleCount": params.num_images,
        "includeRaiReason": true,
    });
    if let Some(ratio) = &params.aspect_ratio {
        parameters["aspectRatio"] = json!(ratio);
    }
    if let Some(location) = &storage {
        parameters["storageUri"] = json!(location.to_string());
    }
    let body = json!({
        "instances": [{ "prompt": params.prompt }],
        "parameters": parameters,
    });

    tracing::info!(model = %params.model, count = params.num_images, "generating images");
    let response = ctx.vertex.predict(&params.model, &body).await?;
    collect_images(response, ctx, params.output_directory.as_deref(), "imagen").await
}

pub async fn edit(params: EditImageParams, ctx: &ToolContext) -> ToolResult<CallToolResult> {
    let storage = output::bucket_location(params.gcs_bucket_uri.as_deref())?;
    let reference: MediaReference = params.image_uri.parse()?;
    let staging = storage
        .as_ref()
        .map(|location| location.bucket.as_str())
        .or(ctx.config.bucket.as_deref());
    let image = ctx.stager.stage(&reference, staging).await?;

    let mut mask_config = json!({
        "maskMode": params.mask_mode.api_name(),
        "dilation": 0.01,
    });
    if !params.segmentation_classes.is_empty() {
        mask_config["maskClasses"] = json!(params.segmentation_classes);
    }
    let instance = json!({
        "prompt": params.prompt.clone().unwrap_or_default(),
        "referenceImages": [
            {
                "referenceType": "REFERENCE_TYPE_RAW",
                "referenceId": 1,
                "referenceImage": { "gcsUri": image.to_string() },
            },
            {
                "referenceType": "REFERENCE_TYPE_MASK",
                "referenceId": 2,
                "maskImageConfig": mask_config,
            },
        ],
    });
    let mut parameters = json!({
        "editMode": params.edit_mode.api_name(),
        "sampleCount": params.number_of_images,
        "includeRaiReason": true,
    });
    if let Some(location) = &storage {
        parameters["storageUri"] = json!(location.to_string());
    }
    let body = json!({ "instances": [instance], "parameters": parameters });

    tracing::info!(
        model = %params.model,
        mode = params.edit_mode.api_name(),
        source = %image,
        "editing image"
    );
    let response = ctx.vertex.predict(&params.model, &body).await?;
    collect_images(response, ctx, params.output_directory.as_deref(), "imagen-edit").await
}

/// Turn predictions into saved files and inline image blocks.
async fn collect_images(
    response: PredictResponse,
    ctx: &ToolContext,
    output_directory: Option<&str>,
    prefix: &str,
) -> ToolResult<CallToolResult> {
    let filtered: Vec<&str> = response
        .predictions
        .iter()
        .filter_map(|p| p.get("raiFilteredReason").and_then(Value::as_str))
        .collect();
    let images: Vec<&Value> = response
        .predictions
        .iter()
        .filter(|p| p.get("bytesBase64Encoded").is_some() || p.get("gcsUri").is_some())
        .collect();

    if images.is_empty() {
        return Err(match filtered.first() {
            Some(reason) => ToolError::ContentFiltered(reason.to_string()),
            None => ToolError::Upstream("the model returned no images".to_string()),
        });
    }

    let dir = output::output_dir(ctx, output_directory);
    let mut artifacts = Vec::with_capacity(images.len());
    let mut content = Vec::new();
    for (i, prediction) in images.into_iter().enumerate() {
        let mime_type = prediction
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();
        let name = timestamped_name(prefix, i, output::extension_for(&mime_type));

        let inline = prediction.get("bytesBase64Encoded").and_then(Value::as_str);
        let artifact = if let Some(data) = inline {
            let bytes = output::decode_base64(data)?;
            content.push(ToolContent::Image {
                data: data.to_string(),
                mime_type: mime_type.clone(),
            });
            output::save(&dir, &name, &bytes).await?
        } else {
            let uri = prediction
                .get("gcsUri")
                .and_then(Value::as_str)
                .map(output::upstream_uri)
                .transpose()?
                .ok_or_else(|| ToolError::Upstream("prediction had no image".to_string()))?;
            match output_directory {
                Some(_) => {
                    let bytes = ctx.stager.fetch(&uri).await?;
                    let file_name = uri.file_name().map(str::to_string).unwrap_or(name);
                    let mut artifact = output::save(&dir, &file_name, &bytes).await?;
                    artifact.remote = Some(uri);
                    artifact
                }
                None => Artifact::remote(uri),
            }
        };
        artifacts.push(artifact.with_mime(Some(mime_type)));
    }

    let mut text = output::summarize("image(s)", &artifacts);
    if !filtered.is_empty() {
        text.push_str(&format!(
            "\n{} image(s) were filtered: {}",
            filtered.len(),
            filtered.join("; ")
        ));
    }
    content.insert(0, ToolContent::text(text));
    Ok(CallToolResult::new(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolName, ToolRequest};
    use crate::test_support::{context, context_with};
    use genmedia_core::{ErrorKind, GcsUri};
    use wiremock::matchers::{body_partial_json, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse_edit(arguments: Value) -> ToolResult<ToolRequest> {
        ToolRequest::parse(ToolName::ImagenEdit, arguments)
    }

    #[test]
    fn test_generate_defaults() {
        let request =
            ToolRequest::parse(ToolName::ImagenT2i, json!({"prompt": "a red fox"})).unwrap();
        match request {
            ToolRequest::ImagenT2i(params) => {
                assert_eq!(params.num_images, 1);
                assert_eq!(params.model, "imagen-3.0-generate-002");
                assert!(params.aspect_ratio.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_generate_range_checks() {
        for arguments in [
            json!({"prompt": "x", "num_images": 0}),
            json!({"prompt": "x", "num_images": 5}),
            json!({"prompt": "x", "aspect_ratio": "2:1"}),
            json!({"prompt": "   "}),
        ] {
            let err = ToolRequest::parse(ToolName::ImagenT2i, arguments).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaValidationFailed);
        }
    }

    #[test]
    fn test_edit_mask_rules() {
        assert!(parse_edit(json!({"image_uri": "gs://b/i.png", "prompt": "a hat"})).is_ok());
        assert!(parse_edit(json!({"image_uri": "gs://b/i.png", "edit_mode": "inpaint_remove"})).is_ok());
        // Insertion needs something to insert.
        assert!(parse_edit(json!({"image_uri": "gs://b/i.png"})).is_err());
        assert!(parse_edit(json!({
            "image_uri": "gs://b/i.png", "prompt": "p", "mask_mode": "semantic"
        }))
        .is_err());
        assert!(parse_edit(json!({
            "image_uri": "gs://b/i.png", "prompt": "p", "mask_mode": "semantic",
            "segmentation_classes": [7, 8]
        }))
        .is_ok());
        assert!(parse_edit(json!({
            "image_uri": "gs://b/i.png", "prompt": "p", "mask_mode": "semantic",
            "segmentation_classes": [9999]
        }))
        .is_err());
        assert!(parse_edit(json!({"image_uri": "gs://b/i.png", "edit_mode": "recolor"})).is_err());
    }

    #[tokio::test]
    async fn test_generate_saves_inline_images() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"imagen-3\.0-generate-002:predict$"))
            .and(body_partial_json(json!({"parameters": {"sampleCount": 2, "aspectRatio": "16:9"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [
                    {"bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/png"},
                    {"bytesBase64Encoded": "d29ybGQ=", "mimeType": "image/png"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let ctx = context(&server.uri());
        let params = GenerateImageParams {
            prompt: "a lighthouse".into(),
            model: default_generate_model(),
            num_images: 2,
            aspect_ratio: Some("16:9".into()),
            gcs_bucket_uri: None,
            output_directory: Some(out.path().to_string_lossy().into_owned()),
        };
        let result = generate(params, &ctx).await.unwrap();

        assert_eq!(result.content.len(), 3);
        assert!(matches!(result.content[1], ToolContent::Image { .. }));
        let saved: Vec<_> = std::fs::read_dir(out.path()).unwrap().collect();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn test_filtered_prediction_is_content_filtered() {
        let server = MockServer::start().await;
        let reason = "Your current safety filter threshold filtered out the generated images.";
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{"raiFilteredReason": reason}]
            })))
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        let params = GenerateImageParams {
            prompt: "x".into(),
            model: default_generate_model(),
            num_images: 1,
            aspect_ratio: None,
            gcs_bucket_uri: None,
            output_directory: None,
        };
        let err = generate(params, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFiltered);
        assert!(err.to_string().contains(reason));
    }

    #[tokio::test]
    async fn test_edit_stages_local_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"imagen-3\.0-capability-001:predict$"))
            .and(body_partial_json(json!({"parameters": {"editMode": "EDIT_MODE_INPAINT_REMOVAL"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{"gcsUri": "gs://out/edited/0.png", "mimeType": "image/png"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        std::fs::write(&input, b"png-bytes").unwrap();

        let ctx = context_with(&server.uri(), &[("GENMEDIA_BUCKET", "staging")]);
        let params = EditImageParams {
            image_uri: input.to_string_lossy().into_owned(),
            prompt: None,
            edit_mode: EditMode::InpaintRemove,
            mask_mode: MaskMode::Foreground,
            segmentation_classes: vec![],
            model: default_edit_model(),
            number_of_images: 1,
            gcs_bucket_uri: Some("gs://out/edited".into()),
            output_directory: None,
        };
        let result = edit(params, &ctx).await.unwrap();

        match &result.content[0] {
            ToolContent::Text { text } => assert!(text.contains("gs://out/edited/0.png")),
            other => panic!("unexpected content {other:?}"),
        }

        // The request referenced the staged copy under the call's bucket.
        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let staged = body["instances"][0]["referenceImages"][0]["referenceImage"]["gcsUri"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(staged.starts_with("gs://out/genmedia-staging/"));
        let uri = GcsUri::parse(&staged).unwrap();
        assert_eq!(&ctx.stager.fetch(&uri).await.unwrap()[..], b"png-bytes");
    }

    #[tokio::test]
    async fn test_edit_without_bucket_fails_before_calling_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = context(&server.uri());
        let params = EditImageParams {
            image_uri: "/tmp/does-not-matter.png".into(),
            prompt: Some("a hat".into()),
            edit_mode: EditMode::InpaintInsert,
            mask_mode: MaskMode::Background,
            segmentation_classes: vec![],
            model: default_edit_model(),
            number_of_images: 1,
            gcs_bucket_uri: None,
            output_directory: None,
        };
        let err = edit(params, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageAccessError);
    }
}
