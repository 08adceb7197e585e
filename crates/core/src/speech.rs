//! Cloud Text-to-Speech client (Chirp 3 HD voices).

use crate::config::ServerConfig;
use crate::error::{ToolError, ToolResult};
use crate::vertex::{authorize, error_from_response, http_client};
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com/";

/// A voice as reported by `voices.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub name: String,
    #[serde(default)]
    pub language_codes: Vec<String>,
    #[serde(default)]
    pub ssml_gender: Option<String>,
    #[serde(default)]
    pub natural_sample_rate_hertz: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VoiceList {
    #[serde(default)]
    voices: Vec<Voice>,
}

/// Phonetic alphabet for custom pronunciations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneticEncoding {
    Ipa,
    XSampa,
}

impl PhoneticEncoding {
    fn api_name(&self) -> &'static str {
        match self {
            Self::Ipa => "PHONETIC_ENCODING_IPA",
            Self::XSampa => "PHONETIC_ENCODING_X_SAMPA",
        }
    }
}

/// Override for how one phrase is spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pronunciation {
    pub phrase: String,
    pub phonetic: String,
}

/// Input for `text:synthesize`.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_name: String,
    pub language_code: String,
    pub pronunciations: Vec<Pronunciation>,
    pub encoding: PhoneticEncoding,
}

impl SynthesisRequest {
    pub fn to_body(&self) -> serde_json::Value {
        let mut input = serde_json::json!({ "text": self.text });
        if !self.pronunciations.is_empty() {
            let entries: Vec<serde_json::Value> = self
                .pronunciations
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "phrase": p.phrase,
                        "pronunciation": p.phonetic,
                        "phoneticEncoding": self.encoding.api_name(),
                    })
                })
                .collect();
            input["customPronunciations"] = serde_json::json!({ "pronunciations": entries });
        }
        serde_json::json!({
            "input": input,
            "voice": {
                "languageCode": self.language_code,
                "name": self.voice_name,
            },
            "audioConfig": { "audioEncoding": "LINEAR16" },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisResponse {
    audio_content: String,
}

/// Text-to-Speech REST client.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: Client,
    base_url: Url,
    project_id: String,
    access_token: Option<String>,
}

impl SpeechClient {
    pub fn new(config: &ServerConfig) -> ToolResult<Self> {
        let base_url = match &config.api_endpoint {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_ENDPOINT)
                .map_err(|e| ToolError::Internal(format!("invalid endpoint: {}", e)))?,
        };
        Ok(Self {
            http: http_client()?,
            base_url,
            project_id: config.project_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, path: &str) -> ToolResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ToolError::Internal(format!("invalid endpoint path {}: {}", path, e)))
    }

    /// List voices, optionally narrowed to one BCP-47 language code.
    pub async fn list_voices(&self, language: Option<&str>) -> ToolResult<Vec<Voice>> {
        let mut url = self.url("v1/voices")?;
        if let Some(language) = language {
            url.query_pairs_mut().append_pair("languageCode", language);
        }
        let request = authorize(self.http.get(url), &self.project_id, self.access_token.as_deref());
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let list: VoiceList = response
            .json()
            .await
            .map_err(|e| ToolError::Upstream(format!("malformed voice list: {}", e)))?;
        Ok(list.voices)
    }

    /// Synthesize speech and return LINEAR16 WAV bytes.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> ToolResult<Bytes> {
        let url = self.url("v1/text:synthesize")?;
        let builder = authorize(
            self.http.post(url),
            &self.project_id,
            self.access_token.as_deref(),
        );
        let response = builder.json(&request.to_body()).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Upstream(format!("malformed synthesis response: {}", e)))?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| ToolError::Upstream(format!("invalid audio payload: {}", e)))?;
        Ok(Bytes::from(audio))
    }
}
