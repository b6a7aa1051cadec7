//! ElevenLabs text-to-speech.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::error::{AiError, AiResult};
use crate::types::{TtsRequest, VoiceSettings};

/// Voice used when the caller does not pick one.
pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";

/// Configuration for the TTS client.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub voice_settings: VoiceSettings,
    pub timeout: Duration,
}

impl TtsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.elevenlabs.io".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            voice_settings: VoiceSettings::default(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        let key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| AiError::MissingConfig("ELEVENLABS_API_KEY not set".to_string()))?;

        let mut config = Self::new(key);
        if let Ok(base_url) = std::env::var("ELEVENLABS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model_id) = std::env::var("ELEVENLABS_MODEL_ID") {
            config.model_id = model_id;
        }
        Ok(config)
    }
}

/// Text-to-speech client.
pub struct TtsClient {
    http: Client,
    config: TtsConfig,
}

impl TtsClient {
    pub fn new(config: TtsConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(TtsConfig::from_env()?)
    }

    /// Synthesize `text` with `voice_id` into an MP3 file. Returns bytes written.
    pub async fn synthesize(&self, text: &str, voice_id: &str, output: &Path) -> AiResult<u64> {
        let url = format!("{}/v1/text-to-speech/{}", self.config.base_url, voice_id);
        let request = TtsRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: self.config.voice_settings.clone(),
        };

        info!(voice_id, chars = text.len(), "Synthesizing narration");

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::api(status.as_u16(), body));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(AiError::InvalidResponse("Empty audio response".to_string()));
        }

        tokio::fs::write(output, &audio).await?;
        Ok(audio.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TtsClient {
        let mut config = TtsConfig::new("xi-key");
        config.base_url = server.uri();
        TtsClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_writes_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
            .and(header("xi-api-key", "xi-key"))
            .and(header("accept", "audio/mpeg"))
            .and(body_partial_json(serde_json::json!({
                "model_id": "eleven_multilingual_v2",
                "voice_settings": {"use_speaker_boost": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 2048]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("voice.mp3");
        let written = client(&server)
            .synthesize("HELLO", DEFAULT_VOICE_ID, &out)
            .await
            .unwrap();
        assert_eq!(written, 2048);
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client(&server)
            .synthesize("x", "voice", &dir.path().join("v.mp3"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
