// Chirp 3 HD tools: speech synthesis and voice discovery

use super::output;
use super::{require_text, Validate};
use crate::context::ToolContext;
use crate::protocol::CallToolResult;
use genmedia_core::media::timestamped_name;
use genmedia_core::speech::{PhoneticEncoding, Pronunciation, SynthesisRequest, Voice};
use genmedia_core::{ToolError, ToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const CHIRP3_MARKER: &str = "Chirp3-HD";

fn default_voice() -> String {
    "en-US-Chirp3-HD-Zephyr".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_prefix() -> String {
    "chirp_audio".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingName {
    #[default]
    Ipa,
    XSampa,
}

impl From<EncodingName> for PhoneticEncoding {
    fn from(name: EncodingName) -> Self {
        match name {
            EncodingName::Ipa => PhoneticEncoding::Ipa,
            EncodingName::XSampa => PhoneticEncoding::XSampa,
        }
    }
}

/// Arguments of `chirp_tts`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SynthesizeParams {
    /// Text to speak.
    pub text: String,
    /// Full voice name, e.g. en-US-Chirp3-HD-Zephyr.
    #[serde(default = "default_voice")]
    pub voice_name: String,
    #[serde(default = "default_language")]
    pub language_code: String,
    /// Custom pronunciations as `phrase:phonetic` pairs.
    #[serde(default)]
    pub pronunciations: Vec<String>,
    /// Phonetic alphabet of the pronunciations: ipa or x-sampa.
    #[serde(default)]
    pub pronunciation_encoding: EncodingName,
    #[serde(default = "default_prefix")]
    pub output_filename_prefix: String,
    /// Local directory for the WAV file.
    #[serde(default)]
    pub output_directory: Option<String>,
    /// Bucket to upload the WAV file to.
    #[serde(default)]
    pub output_gcs_bucket: Option<String>,
}

impl SynthesizeParams {
    fn parsed_pronunciations(&self) -> ToolResult<Vec<Pronunciation>> {
        self.pronunciations
            .iter()
            .map(|entry| {
                let (phrase, phonetic) = entry
                    .split_once(':')
                    .map(|(phrase, phonetic)| (phrase.trim(), phonetic.trim()))
                    .filter(|(phrase, phonetic)| !phrase.is_empty() && !phonetic.is_empty())
                    .ok_or_else(|| {
                        ToolError::invalid(format!(
                            "pronunciation {:?} is not of the form phrase:phonetic",
                            entry
                        ))
                    })?;
                Ok(Pronunciation {
                    phrase: phrase.to_string(),
                    phonetic: phonetic.to_string(),
                })
            })
            .collect()
    }
}

impl Validate for SynthesizeParams {
    fn validate(&self) -> ToolResult<()> {
        require_text("text", &self.text)?;
        require_text("voice_name", &self.voice_name)?;
        require_text("language_code", &self.language_code)?;
        self.parsed_pronunciations()?;
        if self.output_filename_prefix.contains(['/', '\\']) {
            return Err(ToolError::invalid(
                "`output_filename_prefix` must not contain path separators",
            ));
        }
        output::bucket_location(self.output_gcs_bucket.as_deref())?;
        Ok(())
    }
}

/// Arguments of `list_chirp_voices`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListVoicesParams {
    /// BCP-47 language code such as en-US.
    pub language: String,
}

impl Validate for ListVoicesParams {
    fn validate(&self) -> ToolResult<()> {
        require_text("language", &self.language)
    }
}

pub async fn synthesize(params: SynthesizeParams, ctx: &ToolContext) -> ToolResult<CallToolResult> {
    let request = SynthesisRequest {
        pronunciations: params.parsed_pronunciations()?,
        text: params.text,
        voice_name: params.voice_name,
        language_code: params.language_code,
        encoding: params.pronunciation_encoding.into(),
    };
    let bucket = output::bucket_location(params.output_gcs_bucket.as_deref())?;

    tracing::info!(voice = %request.voice_name, chars = request.text.len(), "synthesizing speech");
    let audio = ctx.speech.synthesize(&request).await?;

    let dir = output::output_dir(ctx, params.output_directory.as_deref());
    let name = timestamped_name(&params.output_filename_prefix, 0, "wav");
    let mut artifact = output::save(&dir, &name, &audio).await?;
    if let (Some(location), Some(path)) = (&bucket, &artifact.local) {
        artifact.remote = Some(ctx.stager.publish(path, location).await?);
    }
    let artifact = artifact.with_mime(Some("audio/wav".to_string()));
    Ok(CallToolResult::text(output::summarize("audio file(s)", &[artifact])))
}

pub async fn list_voices(
    params: ListVoicesParams,
    ctx: &ToolContext,
) -> ToolResult<CallToolResult> {
    let language = params.language.trim();
    let voices = ctx.speech.list_voices(Some(language)).await?;
    let voices = chirp3_voices(voices, language);
    tracing::debug!(language, count = voices.len(), "listed voices");

    let body = serde_json::to_string_pretty(&voices)
        .map_err(|e| ToolError::Internal(format!("failed to encode voices: {}", e)))?;
    Ok(CallToolResult::text(body))
}

/// Keep Chirp 3 HD voices whose locale matches `language` exactly.
pub fn chirp3_voices(voices: Vec<Voice>, language: &str) -> Vec<Voice> {
    voices
        .into_iter()
        .filter(|voice| voice.name.contains(CHIRP3_MARKER))
        .filter(|voice| {
            voice
                .language_codes
                .iter()
                .any(|code| code.eq_ignore_ascii_case(language))
        })
        .collect()
}
