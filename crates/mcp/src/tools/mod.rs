// Tool variants: one typed parameter struct per tool
//
// Arguments are validated by deserializing into the variant's struct and
// then running its `validate` checks. Both happen before any handler runs.

pub mod avtool;
pub mod chirp;
pub mod imagen;
pub mod lyria;
mod output;
pub mod registry;
pub mod veo;

pub use registry::{ToolDefinition, ToolRegistry};

use crate::context::{CallContext, ToolContext};
use crate::protocol::CallToolResult;
use crate::service::Service;
use genmedia_core::{ToolError, ToolResult};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Every tool any server can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ImagenT2i,
    ImagenEdit,
    VeoT2v,
    VeoI2v,
    ChirpTts,
    ListChirpVoices,
    LyriaGenerateMusic,
    FfmpegGetMediaInfo,
    FfmpegConvertAudioWavToMp3,
    FfmpegVideoToGif,
    FfmpegCombineAudioAndVideo,
    FfmpegOverlayImageOnVideo,
    FfmpegConcatenateMediaFiles,
    FfmpegAdjustVolume,
    FfmpegLayerAudioFiles,
}

impl ToolName {
    pub const ALL: [ToolName; 15] = [
        ToolName::ImagenT2i,
        ToolName::ImagenEdit,
        ToolName::VeoT2v,
        ToolName::VeoI2v,
        ToolName::ChirpTts,
        ToolName::ListChirpVoices,
        ToolName::LyriaGenerateMusic,
        ToolName::FfmpegGetMediaInfo,
        ToolName::FfmpegConvertAudioWavToMp3,
        ToolName::FfmpegVideoToGif,
        ToolName::FfmpegCombineAudioAndVideo,
        ToolName::FfmpegOverlayImageOnVideo,
        ToolName::FfmpegConcatenateMediaFiles,
        ToolName::FfmpegAdjustVolume,
        ToolName::FfmpegLayerAudioFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImagenT2i => "imagen_t2i",
            Self::ImagenEdit => "imagen_edit",
            Self::VeoT2v => "veo_t2v",
            Self::VeoI2v => "veo_i2v",
            Self::ChirpTts => "chirp_tts",
            Self::ListChirpVoices => "list_chirp_voices",
            Self::LyriaGenerateMusic => "lyria_generate_music",
            Self::FfmpegGetMediaInfo => "ffmpeg_get_media_info",
            Self::FfmpegConvertAudioWavToMp3 => "ffmpeg_convert_audio_wav_to_mp3",
            Self::FfmpegVideoToGif => "ffmpeg_video_to_gif",
            Self::FfmpegCombineAudioAndVideo => "ffmpeg_combine_audio_and_video",
            Self::FfmpegOverlayImageOnVideo => "ffmpeg_overlay_image_on_video",
            Self::FfmpegConcatenateMediaFiles => "ffmpeg_concatenate_media_files",
            Self::FfmpegAdjustVolume => "ffmpeg_adjust_volume",
            Self::FfmpegLayerAudioFiles => "ffmpeg_layer_audio_files",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ImagenT2i => "Generate images from a text prompt with Imagen.",
            Self::ImagenEdit => {
                "Edit an image with Imagen: insert or remove content in a masked region, outpaint, or swap the background."
            }
            Self::VeoT2v => {
                "Generate videos from a text prompt with Veo. Waits for the long-running job to finish."
            }
            Self::VeoI2v => {
                "Generate videos from a starting image with Veo. Waits for the long-running job to finish."
            }
            Self::ChirpTts => {
                "Synthesize speech from text with a Chirp 3 HD voice and save it as a WAV file."
            }
            Self::ListChirpVoices => "List the Chirp 3 HD voices available for a language.",
            Self::LyriaGenerateMusic => {
                "Generate instrumental music from a text prompt with Lyria."
            }
            Self::FfmpegGetMediaInfo => {
                "Report stream and format information for a media file (ffprobe)."
            }
            Self::FfmpegConvertAudioWavToMp3 => "Convert a WAV audio file to MP3.",
            Self::FfmpegVideoToGif => {
                "Convert a video to an animated GIF using a generated palette."
            }
            Self::FfmpegCombineAudioAndVideo => {
                "Mux an audio track into a video, replacing its audio."
            }
            Self::FfmpegOverlayImageOnVideo => "Overlay an image on a video at the given position.",
            Self::FfmpegConcatenateMediaFiles => {
                "Concatenate media files of the same format in order."
            }
            Self::FfmpegAdjustVolume => {
                "Raise or lower the volume of an audio file by a number of decibels."
            }
            Self::FfmpegLayerAudioFiles => "Mix several audio files into a single layered track.",
        }
    }

    pub fn service(&self) -> Service {
        match self {
            Self::ImagenT2i | Self::ImagenEdit => Service::Imagen,
            Self::VeoT2v | Self::VeoI2v => Service::Veo,
            Self::ChirpTts | Self::ListChirpVoices => Service::Chirp3,
            Self::LyriaGenerateMusic => Service::Lyria,
            _ => Service::Avtool,
        }
    }

    /// Tools that submit a job and poll it, bounded by the operation timeout.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Self::VeoT2v | Self::VeoI2v)
    }

    /// JSON schema advertised as `inputSchema`, generated from the parameter struct.
    pub fn input_schema(&self) -> Value {
        match self {
            Self::ImagenT2i => schema::<imagen::GenerateImageParams>(),
            Self::ImagenEdit => schema::<imagen::EditImageParams>(),
            Self::VeoT2v => schema::<veo::TextToVideoParams>(),
            Self::VeoI2v => schema::<veo::ImageToVideoParams>(),
            Self::ChirpTts => schema::<chirp::SynthesizeParams>(),
            Self::ListChirpVoices => schema::<chirp::ListVoicesParams>(),
            Self::LyriaGenerateMusic => schema::<lyria::GenerateMusicParams>(),
            Self::FfmpegGetMediaInfo => schema::<avtool::MediaInfoParams>(),
            Self::FfmpegConvertAudioWavToMp3 => schema::<avtool::WavToMp3Params>(),
            Self::FfmpegVideoToGif => schema::<avtool::VideoToGifParams>(),
            Self::FfmpegCombineAudioAndVideo => schema::<avtool::CombineAudioVideoParams>(),
            Self::FfmpegOverlayImageOnVideo => schema::<avtool::OverlayImageParams>(),
            Self::FfmpegConcatenateMediaFiles => schema::<avtool::ConcatenateParams>(),
            Self::FfmpegAdjustVolume => schema::<avtool::AdjustVolumeParams>(),
            Self::FfmpegLayerAudioFiles => schema::<avtool::LayerAudioParams>(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Checks that run after deserialization and before any side effect.
pub trait Validate {
    fn validate(&self) -> ToolResult<()> {
        Ok(())
    }
}

/// A validated tool call.
#[derive(Debug, Clone)]
pub enum ToolRequest {
    ImagenT2i(imagen::GenerateImageParams),
    ImagenEdit(imagen::EditImageParams),
    VeoT2v(veo::TextToVideoParams),
    VeoI2v(veo::ImageToVideoParams),
    ChirpTts(chirp::SynthesizeParams),
    ListChirpVoices(chirp::ListVoicesParams),
    LyriaGenerateMusic(lyria::GenerateMusicParams),
    FfmpegGetMediaInfo(avtool::MediaInfoParams),
    FfmpegConvertAudioWavToMp3(avtool::WavToMp3Params),
    FfmpegVideoToGif(avtool::VideoToGifParams),
    FfmpegCombineAudioAndVideo(avtool::CombineAudioVideoParams),
    FfmpegOverlayImageOnVideo(avtool::OverlayImageParams),
    FfmpegConcatenateMediaFiles(avtool::ConcatenateParams),
    FfmpegAdjustVolume(avtool::AdjustVolumeParams),
    FfmpegLayerAudioFiles(avtool::LayerAudioParams),
}

impl ToolRequest {
    /// Deserialize and validate `arguments` for `name`.
    pub fn parse(name: ToolName, arguments: Value) -> ToolResult<Self> {
        Ok(match name {
            ToolName::ImagenT2i => Self::ImagenT2i(decode(arguments)?),
            ToolName::ImagenEdit => Self::ImagenEdit(decode(arguments)?),
            ToolName::VeoT2v => Self::VeoT2v(decode(arguments)?),
            ToolName::VeoI2v => Self::VeoI2v(decode(arguments)?),
            ToolName::ChirpTts => Self::ChirpTts(decode(arguments)?),
            ToolName::ListChirpVoices => Self::ListChirpVoices(decode(arguments)?),
            ToolName::LyriaGenerateMusic => Self::LyriaGenerateMusic(decode(arguments)?),
            ToolName::FfmpegGetMediaInfo => Self::FfmpegGetMediaInfo(decode(arguments)?),
            ToolName::FfmpegConvertAudioWavToMp3 => {
                Self::FfmpegConvertAudioWavToMp3(decode(arguments)?)
            }
            ToolName::FfmpegVideoToGif => Self::FfmpegVideoToGif(decode(arguments)?),
            ToolName::FfmpegCombineAudioAndVideo => {
                Self::FfmpegCombineAudioAndVideo(decode(arguments)?)
            }
            ToolName::FfmpegOverlayImageOnVideo => {
                Self::FfmpegOverlayImageOnVideo(decode(arguments)?)
            }
            ToolName::FfmpegConcatenateMediaFiles => {
                Self::FfmpegConcatenateMediaFiles(decode(arguments)?)
            }
            ToolName::FfmpegAdjustVolume => Self::FfmpegAdjustVolume(decode(arguments)?),
            ToolName::FfmpegLayerAudioFiles => Self::FfmpegLayerAudioFiles(decode(arguments)?),
        })
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::ImagenT2i(_) => ToolName::ImagenT2i,
            Self::ImagenEdit(_) => ToolName::ImagenEdit,
            Self::VeoT2v(_) => ToolName::VeoT2v,
            Self::VeoI2v(_) => ToolName::VeoI2v,
            Self::ChirpTts(_) => ToolName::ChirpTts,
            Self::ListChirpVoices(_) => ToolName::ListChirpVoices,
            Self::LyriaGenerateMusic(_) => ToolName::LyriaGenerateMusic,
            Self::FfmpegGetMediaInfo(_) => ToolName::FfmpegGetMediaInfo,
            Self::FfmpegConvertAudioWavToMp3(_) => ToolName::FfmpegConvertAudioWavToMp3,
            Self::FfmpegVideoToGif(_) => ToolName::FfmpegVideoToGif,
            Self::FfmpegCombineAudioAndVideo(_) => ToolName::FfmpegCombineAudioAndVideo,
            Self::FfmpegOverlayImageOnVideo(_) => ToolName::FfmpegOverlayImageOnVideo,
            Self::FfmpegConcatenateMediaFiles(_) => ToolName::FfmpegConcatenateMediaFiles,
            Self::FfmpegAdjustVolume(_) => ToolName::FfmpegAdjustVolume,
            Self::FfmpegLayerAudioFiles(_) => ToolName::FfmpegLayerAudioFiles,
        }
    }

    /// Run the handler for this request.
    pub async fn execute(
        self,
        ctx: &ToolContext,
        call: &CallContext,
    ) -> ToolResult<CallToolResult> {
        match self {
            Self::ImagenT2i(params) => imagen::generate(params, ctx).await,
            Self::ImagenEdit(params) => imagen::edit(params, ctx).await,
            Self::VeoT2v(params) => veo::text_to_video(params, ctx, call).await,
            Self::VeoI2v(params) => veo::image_to_video(params, ctx, call).await,
            Self::ChirpTts(params) => chirp::synthesize(params, ctx).await,
            Self::ListChirpVoices(params) => chirp::list_voices(params, ctx).await,
            Self::LyriaGenerateMusic(params) => lyria::generate(params, ctx).await,
            Self::FfmpegGetMediaInfo(params) => avtool::media_info(params, ctx).await,
            Self::FfmpegConvertAudioWavToMp3(params) => avtool::wav_to_mp3(params, ctx).await,
            Self::FfmpegVideoToGif(params) => avtool::video_to_gif(params, ctx).await,
            Self::FfmpegCombineAudioAndVideo(params) => avtool::combine(params, ctx).await,
            Self::FfmpegOverlayImageOnVideo(params) => avtool::overlay(params, ctx).await,
            Self::FfmpegConcatenateMediaFiles(params) => avtool::concatenate(params, ctx).await,
            Self::FfmpegAdjustVolume(params) => avtool::adjust_volume(params, ctx).await,
            Self::FfmpegLayerAudioFiles(params) => avtool::layer(params, ctx).await,
        }
    }
}

fn decode<T: DeserializeOwned + Validate>(arguments: Value) -> ToolResult<T> {
    // Absent arguments are treated as an empty object so the error names the missing field.
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    let params: T = serde_json::from_value(arguments)?;
    params.validate()?;
    Ok(params)
}

fn schema<T: JsonSchema>() -> Value {
    let mut schema = schemars::schema_for!(T).to_value();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

/// Reject an empty or whitespace-only required string.
pub(crate) fn require_text(field: &str, value: &str) -> ToolResult<()> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid(format!("`{}` must not be empty", field)));
    }
    Ok(())
}

/// Reject a count outside `min..=max`.
pub(crate) fn require_range(field: &str, value: u32, min: u32, max: u32) -> ToolResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ToolError::invalid(format!(
            "`{}` must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genmedia_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
        let err = "imagen_t3i".parse::<ToolName>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
    }

    #[test]
    fn test_missing_required_field_fails_validation() {
        // One representative required field per tool.
        let cases = [
            (ToolName::ImagenT2i, "prompt"),
            (ToolName::ImagenEdit, "image_uri"),
            (ToolName::VeoT2v, "prompt"),
            (ToolName::VeoI2v, "image_uri"),
            (ToolName::ChirpTts, "text"),
            (ToolName::ListChirpVoices, "language"),
            (ToolName::LyriaGenerateMusic, "prompt"),
            (ToolName::FfmpegGetMediaInfo, "input_media_uri"),
            (ToolName::FfmpegConvertAudioWavToMp3, "input_audio_uri"),
            (ToolName::FfmpegVideoToGif, "input_video_uri"),
            (ToolName::FfmpegCombineAudioAndVideo, "input_video_uri"),
            (ToolName::FfmpegOverlayImageOnVideo, "input_video_uri"),
            (ToolName::FfmpegConcatenateMediaFiles, "input_media_uris"),
            (ToolName::FfmpegAdjustVolume, "input_media_uri"),
            (ToolName::FfmpegLayerAudioFiles, "input_audio_uris"),
        ];
        assert_eq!(cases.len(), ToolName::ALL.len());

        for (tool, field) in cases {
            let err = ToolRequest::parse(tool, json!({})).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaValidationFailed, "{}", tool);
            assert!(err.to_string().contains(field), "{}: {}", tool, err);
        }
    }

    #[test]
    fn test_schema_lists_required_fields() {
        for tool in ToolName::ALL {
            let schema = tool.input_schema();
            assert_eq!(schema["type"], "object", "{}", tool);
            assert!(schema["required"].is_array(), "{} has no required fields", tool);
            assert!(schema.get("$schema").is_none());
        }
        let schema = ToolName::ImagenT2i.input_schema();
        assert_eq!(schema["required"], json!(["prompt"]));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = ToolRequest::parse(
            ToolName::ListChirpVoices,
            json!({"language": "en-US", "lang": "en"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaValidationFailed);
    }

    #[test]
    fn test_null_arguments_report_missing_field() {
        let err = ToolRequest::parse(ToolName::ChirpTts, Value::Null).unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn test_parse_keeps_variant() {
        let request =
            ToolRequest::parse(ToolName::ListChirpVoices, json!({"language": "en-US"})).unwrap();
        assert_eq!(request.name(), ToolName::ListChirpVoices);
    }
}
