use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::http;
use super::BaseVoiceSynthesizer;
use crate::common::PipelineError;

const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io/v1";
const PROVIDER: &str = "elevenlabs";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs text-to-speech client. Returns mp3 bytes.
pub struct ElevenLabsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(120))?,
            base_url: ELEVENLABS_API_URL.to_string(),
            api_key,
            model_id: "eleven_monolingual_v1".to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl BaseVoiceSynthesizer for ElevenLabsClient {
    async fn synthesize_voice(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::configuration("ElevenLabs API key not configured"))?;

        if text.trim().is_empty() {
            return Err(PipelineError::data("cannot synthesize empty narration").into());
        }

        let request = SpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.5,
            },
        };

        let response = http::checked(
            PROVIDER,
            self.client
                .post(format!("{}/text-to-speech/{}", self.base_url, voice_id))
                .header("xi-api-key", api_key)
                .header(reqwest::header::ACCEPT, "audio/mpeg")
                .json(&request)
                .send()
                .await,
        )
        .await?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| PipelineError::from_transport(PROVIDER, e))?;

        debug!(voice_id, bytes = audio.len(), "voice synthesized");
        Ok(audio.to_vec())
    }
}
