// Compositing tools backed by ffmpeg and ffprobe
//
// Object-storage inputs are downloaded to a per-call temporary directory.
// Outputs land in the requested local directory and are uploaded when a
// bucket is given.

use super::output::{self, Artifact};
use super::{require_text, Validate};
use crate::context::ToolContext;
use crate::protocol::CallToolResult;
use genmedia_core::media::timestamped_name;
use genmedia_core::toolchain::GifOptions;
use genmedia_core::{MediaReference, ToolError, ToolResult};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn default_scale() -> f64 {
    GifOptions::default().scale_width_factor
}

fn default_fps() -> u32 {
    GifOptions::default().fps
}

/// Arguments of `ffmpeg_get_media_info`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MediaInfoParams {
    /// Local path or gs:// URI of the media file.
    pub input_media_uri: String,
}

impl Validate for MediaInfoParams {
    fn validate(&self) -> ToolResult<()> {
        reference(&self.input_media_uri).map(|_| ())
    }
}

/// Arguments of `ffmpeg_convert_audio_wav_to_mp3`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WavToMp3Params {
    /// Local path or gs:// URI of the WAV file.
    pub input_audio_uri: String,
    /// Name of the output file. Generated when omitted.
    #[serde(default)]
    pub output_file_name: Option<String>,
    /// Directory for the output file.
    #[serde(default)]
    pub output_local_dir: Option<String>,
    /// Bucket to upload the output to.
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Arguments of `ffmpeg_video_to_gif`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VideoToGifParams {
    pub input_video_uri: String,
    /// Output width as a fraction of the input width, in (0, 1].
    #[serde(default = "default_scale")]
    pub scale_width_factor: f64,
    /// Frames per second (1-50).
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_local_dir: Option<String>,
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Arguments of `ffmpeg_combine_audio_and_video`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CombineAudioVideoParams {
    pub input_video_uri: String,
    pub input_audio_uri: String,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_local_dir: Option<String>,
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Arguments of `ffmpeg_overlay_image_on_video`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OverlayImageParams {
    pub input_video_uri: String,
    pub input_image_uri: String,
    /// Horizontal offset of the image's top-left corner, in pixels.
    #[serde(default)]
    pub x_coordinate: i64,
    /// Vertical offset of the image's top-left corner, in pixels.
    #[serde(default)]
    pub y_coordinate: i64,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_local_dir: Option<String>,
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Arguments of `ffmpeg_concatenate_media_files`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ConcatenateParams {
    /// Files to join, in order. They should share codecs and format.
    pub input_media_uris: Vec<String>,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_local_dir: Option<String>,
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Arguments of `ffmpeg_adjust_volume`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AdjustVolumeParams {
    pub input_media_uri: String,
    /// Gain in decibels; negative values lower the volume.
    pub volume_db_change: f64,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_local_dir: Option<String>,
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Arguments of `ffmpeg_layer_audio_files`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LayerAudioParams {
    /// Audio files to mix together (at least two).
    pub input_audio_uris: Vec<String>,
    #[serde(default)]
    pub output_file_name: Option<String>,
    #[serde(default)]
    pub output_local_dir: Option<String>,
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

/// Where a compositing result goes.
struct OutputTarget<'a> {
    file_name: Option<&'a str>,
    local_dir: Option<&'a str>,
    gcs_bucket: Option<&'a str>,
}

impl OutputTarget<'_> {
    fn validate(&self) -> ToolResult<()> {
        if let Some(name) = self.file_name {
            require_text("output_file_name", name)?;
            if name.contains(['/', '\\']) {
                return Err(ToolError::invalid(
                    "`output_file_name` must not contain path separators",
                ));
            }
        }
        output::bucket_location(self.gcs_bucket)?;
        Ok(())
    }

    /// Output path inside the target directory, which is created if missing.
    async fn path(
        &self,
        ctx: &ToolContext,
        operation: &str,
        extension: &str,
    ) -> ToolResult<PathBuf> {
        let dir = output::output_dir(ctx, self.local_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ToolError::storage(format!("cannot create {}: {}", dir.display(), e)))?;
        let name = match self.file_name {
            Some(name) if Path::new(name).extension().is_some() => name.to_string(),
            Some(name) => format!("{}.{}", name, extension),
            None => timestamped_name(operation, 0, extension),
        };
        Ok(dir.join(name))
    }

    /// Upload when requested and describe the result.
    async fn finish(
        &self,
        ctx: &ToolContext,
        path: PathBuf,
        what: &str,
    ) -> ToolResult<CallToolResult> {
        let remote = match output::bucket_location(self.gcs_bucket)? {
            Some(location) => Some(ctx.stager.publish(&path, &location).await?),
            None => None,
        };
        tracing::info!(output = %path.display(), "compositing finished");
        let artifact = Artifact {
            mime_type: MediaReference::LocalPath(path.clone()).mime_type(),
            local: Some(path),
            remote,
        };
        Ok(CallToolResult::text(output::summarize(what, &[artifact])))
    }
}

macro_rules! output_target {
    ($($params:ty),+ $(,)?) => {
        $(
            impl $params {
                fn target(&self) -> OutputTarget<'_> {
                    OutputTarget {
                        file_name: self.output_file_name.as_deref(),
                        local_dir: self.output_local_dir.as_deref(),
                        gcs_bucket: self.output_gcs_bucket.as_deref(),
                    }
                }
            }
        )+
    };
}

output_target!(
    WavToMp3Params,
    VideoToGifParams,
    CombineAudioVideoParams,
    OverlayImageParams,
    ConcatenateParams,
    AdjustVolumeParams,
    LayerAudioParams,
);

fn reference(uri: &str) -> ToolResult<MediaReference> {
    uri.parse()
}

fn references(uris: &[String], minimum: usize, field: &str) -> ToolResult<Vec<MediaReference>> {
    if uris.len() < minimum {
        return Err(ToolError::invalid(format!(
            "`{}` needs at least {} entries, got {}",
            field,
            minimum,
            uris.len()
        )));
    }
    uris.iter().map(|uri| reference(uri)).collect()
}

/// Extension of a reference, falling back to `default`.
fn extension_of(reference: &MediaReference, default: &str) -> String {
    reference
        .file_name()
        .and_then(|name| {
            Path::new(&name)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| default.to_string())
}

fn workdir() -> ToolResult<TempDir> {
    tempfile::Builder::new()
        .prefix("genmedia-")
        .tempdir()
        .map_err(|e| ToolError::storage(format!("cannot create working directory: {}", e)))
}

impl Validate for WavToMp3Params {
    fn validate(&self) -> ToolResult<()> {
        reference(&self.input_audio_uri)?;
        self.target().validate()
    }
}

impl Validate for VideoToGifParams {
    fn validate(&self) -> ToolResult<()> {
        reference(&self.input_video_uri)?;
        if !(self.scale_width_factor > 0.0 && self.scale_width_factor <= 1.0) {
            return Err(ToolError::invalid(format!(
                "`scale_width_factor` must be in (0, 1], got {}",
                self.scale_width_factor
            )));
        }
        super::require_range("fps", self.fps, 1, 50)?;
        self.target().validate()
    }
}

impl Validate for CombineAudioVideoParams {
    fn validate(&self) -> ToolResult<()> {
        reference(&self.input_video_uri)?;
        reference(&self.input_audio_uri)?;
        self.target().validate()
    }
}

impl Validate for OverlayImageParams {
    fn validate(&self) -> ToolResult<()> {
        reference(&self.input_video_uri)?;
        reference(&self.input_image_uri)?;
        self.target().validate()
    }
}

impl Validate for ConcatenateParams {
    fn validate(&self) -> ToolResult<()> {
        references(&self.input_media_uris, 1, "input_media_uris")?;
        self.target().validate()
    }
}

impl Validate for AdjustVolumeParams {
    fn validate(&self) -> ToolResult<()> {
        reference(&self.input_media_uri)?;
        if !self.volume_db_change.is_finite() {
            return Err(ToolError::invalid("`volume_db_change` must be a finite number"));
        }
        self.target().validate()
    }
}

impl Validate for LayerAudioParams {
    fn validate(&self) -> ToolResult<()> {
        references(&self.input_audio_uris, 2, "input_audio_uris")?;
        self.target().validate()
    }
}

pub async fn media_info(params: MediaInfoParams, ctx: &ToolContext) -> ToolResult<CallToolResult> {
    let work = workdir()?;
    let input = ctx.stager.localize(&reference(&params.input_media_uri)?, work.path()).await?;
    let info = ctx.toolchain.probe(&input).await?;
    let text = serde_json::to_string_pretty(&info)
        .map_err(|e| ToolError::Internal(format!("failed to encode media info: {}", e)))?;
    Ok(CallToolResult::text(text))
}

pub async fn wav_to_mp3(params: WavToMp3Params, ctx: &ToolContext) -> ToolResult<CallToolResult> {
    let target = params.target();
    let work = workdir()?;
    let input = ctx.stager.localize(&reference(&params.input_audio_uri)?, work.path()).await?;
    let output = target.path(ctx, "converted", "mp3").await?;
    ctx.toolchain.wav_to_mp3(&input, &output).await?;
    target.finish(ctx, output, "MP3 file").await
}

pub async fn video_to_gif(
    params: VideoToGifParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let target = params.target();
    let work = workdir()?;
    let input = ctx.stager.localize(&reference(&params.input_video_uri)?, work.path()).await?;
    let output = target.path(ctx, "animated", "gif").await?;
    let options = GifOptions {
        scale_width_factor: params.scale_width_factor,
        fps: params.fps,
    };
    ctx.toolchain.video_to_gif(&input, &output, options, work.path()).await?;
    target.finish(ctx, output, "GIF").await
}

pub async fn combine(
    params: CombineAudioVideoParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let target = params.target();
    let work = workdir()?;
    let video_ref = reference(&params.input_video_uri)?;
    let video = ctx.stager.localize(&video_ref, work.path()).await?;
    let audio = ctx.stager.localize(&reference(&params.input_audio_uri)?, work.path()).await?;
    let output = target.path(ctx, "combined", &extension_of(&video_ref, "mp4")).await?;
    ctx.toolchain.combine_audio_video(&video, &audio, &output).await?;
    target.finish(ctx, output, "video").await
}

pub async fn overlay(params: OverlayImageParams, ctx: &ToolContext) -> ToolResult<CallToolResult> {
    let target = params.target();
    let work = workdir()?;
    let video_ref = reference(&params.input_video_uri)?;
    let video = ctx.stager.localize(&video_ref, work.path()).await?;
    let image = ctx.stager.localize(&reference(&params.input_image_uri)?, work.path()).await?;
    let output = target.path(ctx, "overlay", &extension_of(&video_ref, "mp4")).await?;
    ctx.toolchain
        .overlay_image(&video, &image, params.x_coordinate, params.y_coordinate, &output)
        .await?;
    target.finish(ctx, output, "video").await
}

pub async fn concatenate(
    params: ConcatenateParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let target = params.target();
    let refs = references(&params.input_media_uris, 1, "input_media_uris")?;
    let work = workdir()?;
    let mut inputs = Vec::with_capacity(refs.len());
    for reference in &refs {
        inputs.push(ctx.stager.localize(reference, work.path()).await?);
    }
    let output = target.path(ctx, "concatenated", &extension_of(&refs[0], "mp4")).await?;
    ctx.toolchain.concatenate(&inputs, &output, work.path()).await?;
    target.finish(ctx, output, "concatenated file").await
}

pub async fn adjust_volume(
    params: AdjustVolumeParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let target = params.target();
    let work = workdir()?;
    let input_ref = reference(&params.input_media_uri)?;
    let input = ctx.stager.localize(&input_ref, work.path()).await?;
    let output = target.path(ctx, "volume", &extension_of(&input_ref, "wav")).await?;
    ctx.toolchain.adjust_volume(&input, params.volume_db_change, &output).await?;
    target.finish(ctx, output, "audio file").await
}

pub async fn layer(params: LayerAudioParams, ctx: &ToolContext) -> ToolResult<CallToolResult> {
    let target = params.target();
    let refs = references(&params.input_audio_uris, 2, "input_audio_uris")?;
    let work = workdir()?;
    let mut inputs = Vec::with_capacity(refs.len());
    for reference in &refs {
        inputs.push(ctx.stager.localize(reference, work.path()).await?);
    }
    let output = target.path(ctx, "layered", &extension_of(&refs[0], "wav")).await?;
    ctx.toolchain.layer_audio(&inputs, &output).await?;
    target.finish(ctx, output, "audio file").await
}
