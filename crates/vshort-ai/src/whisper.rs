//! Speech-to-text through Replicate-hosted Whisper.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use tracing::{debug, info};

use vshort_models::Transcript;

use crate::error::{AiError, AiResult};
use crate::types::{Prediction, PredictionRequest, PredictionStatus, WhisperInput};

const DEFAULT_MODEL_VERSION: &str =
    "91ee9c0c3df30478510ff8c8a3a545add1ad0259ad3a9f78fba57fbc05ee64f7";

/// Configuration for the Whisper client.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub api_token: String,
    pub base_url: String,
    pub model_version: String,
    /// Whisper model size
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl WhisperConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: "https://api.replicate.com".to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            model: "large-v3".to_string(),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_polls: 120,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        let token = std::env::var("REPLICATE_API_TOKEN")
            .map_err(|_| AiError::MissingConfig("REPLICATE_API_TOKEN not set".to_string()))?;

        let mut config = Self::new(token);
        if let Ok(base_url) = std::env::var("REPLICATE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(version) = std::env::var("WHISPER_MODEL_VERSION") {
            config.model_version = version;
        }
        config.timeout = Duration::from_secs(
            std::env::var("WHISPER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
        );
        Ok(config)
    }
}

/// Client for the Whisper prediction API.
pub struct WhisperClient {
    http: Client,
    config: WhisperConfig,
}

impl WhisperClient {
    pub fn new(config: WhisperConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(WhisperConfig::from_env()?)
    }

    /// Transcribe an audio file with word timestamps.
    pub async fn transcribe(&self, audio: &Path, mime_type: &str, language: &str) -> AiResult<Transcript> {
        let bytes = tokio::fs::read(audio).await?;
        let data_uri = format!(
            "data:{};base64,{}",
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        info!(
            audio = %audio.display(),
            size_kb = bytes.len() / 1024,
            language,
            "Submitting audio for transcription"
        );

        let request = PredictionRequest {
            version: &self.config.model_version,
            input: WhisperInput {
                audio: data_uri,
                model: &self.config.model,
                language,
                word_timestamps: true,
                transcription: "plain text",
            },
        };

        let url = format!("{}/v1/predictions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await?;

        let prediction = Self::parse_prediction(response).await?;
        let prediction = self.wait_for_completion(prediction).await?;

        let output = prediction
            .output
            .ok_or_else(|| AiError::InvalidResponse("Prediction succeeded without output".to_string()))?;

        let transcript = output.into_transcript();
        info!(
            segments = transcript.segments.len(),
            chars = transcript.text.len(),
            "Transcription complete"
        );
        Ok(transcript)
    }

    async fn parse_prediction(response: reqwest::Response) -> AiResult<Prediction> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::api(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }

    /// Poll until the prediction reaches a terminal status.
    async fn wait_for_completion(&self, mut prediction: Prediction) -> AiResult<Prediction> {
        let mut polls = 0;

        while !prediction.status.is_terminal() {
            if polls >= self.config.max_polls {
                return Err(AiError::Timeout(
                    self.config.poll_interval.as_secs() * u64::from(self.config.max_polls),
                ));
            }
            polls += 1;

            let get_url = prediction
                .urls
                .as_ref()
                .map(|u| u.get.clone())
                .unwrap_or_else(|| format!("{}/v1/predictions/{}", self.config.base_url, prediction.id));

            tokio::time::sleep(self.config.poll_interval).await;
            debug!(prediction = %prediction.id, poll = polls, "Polling prediction");

            let response = self
                .http
                .get(&get_url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            prediction = Self::parse_prediction(response).await?;
        }

        match prediction.status {
            PredictionStatus::Succeeded => Ok(prediction),
            PredictionStatus::Canceled => Err(AiError::PredictionFailed(
                "Prediction was canceled (interrupted)".to_string(),
            )),
            _ => Err(AiError::PredictionFailed(
                prediction
                    .error
                    .as_ref()
                    .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                    .unwrap_or_else(|| "Unknown prediction error".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> (WhisperClient, tempfile::TempDir, std::path::PathBuf) {
        let mut config = WhisperConfig::new("token");
        config.base_url = server.uri();
        config.poll_interval = Duration::from_millis(10);
        config.max_polls = 3;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.wav");
        tokio::fs::write(&audio, b"RIFF....WAVE").await.unwrap();
        (WhisperClient::new(config).unwrap(), dir, audio)
    }

    #[tokio::test]
    async fn test_transcribe_sync_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .and(header("authorization", "Bearer token"))
            .and(header("prefer", "wait"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p1",
                "status": "succeeded",
                "output": {
                    "transcription": "bonjour tout le monde",
                    "segments": [{"start": 0.0, "end": 2.0, "text": "bonjour tout le monde",
                                  "words": [{"word": "bonjour", "start": 0.0, "end": 0.6}]}]
                }
            })))
            .mount(&server)
            .await;

        let (client, _dir, audio) = client(&server).await;
        let transcript = client.transcribe(&audio, "audio/wav", "fr").await.unwrap();
        assert_eq!(transcript.text, "bonjour tout le monde");
        assert_eq!(transcript.segments[0].words.len(), 1);
    }

    #[tokio::test]
    async fn test_transcribe_polls_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p2",
                "status": "processing",
                "urls": {"get": format!("{}/v1/predictions/p2", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "p2",
                "status": "succeeded",
                "output": {"segments": [{"start": 1.0, "end": 3.0, "text": "hi"}]}
            })))
            .mount(&server)
            .await;

        let (client, _dir, audio) = client(&server).await;
        let transcript = client.transcribe(&audio, "audio/wav", "en").await.unwrap();
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.text, "hi");
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let (client, _dir, audio) = client(&server).await;
        let err = client.transcribe(&audio, "audio/wav", "en").await.unwrap_err();
        assert!(matches!(err, AiError::Api { status: 429, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_failed_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p3",
                "status": "failed",
                "error": "Audio file could not be decoded"
            })))
            .mount(&server)
            .await;

        let (client, _dir, audio) = client(&server).await;
        let err = client.transcribe(&audio, "audio/wav", "en").await.unwrap_err();
        assert!(err.to_string().contains("could not be decoded"));
        assert!(!err.is_retryable());
    }
}
