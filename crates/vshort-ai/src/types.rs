//! Wire types for the backend APIs.

use serde::{Deserialize, Serialize};

use vshort_models::{Transcript, TranscriptSegment, Word};

// ============================================================================
// Replicate predictions
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PredictionRequest<'a> {
    pub version: &'a str,
    pub input: WhisperInput<'a>,
}

#[derive(Debug, Serialize)]
pub struct WhisperInput<'a> {
    /// Data URI of the audio file
    pub audio: String,
    pub model: &'a str,
    pub language: &'a str,
    pub word_timestamps: bool,
    pub transcription: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<WhisperOutput>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictionUrls {
    pub get: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhisperOutput {
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
pub struct WhisperSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
pub struct WhisperWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Length assumed for a transcript that came back without segments.
const UNSEGMENTED_SPAN_SECS: f64 = 60.0;

impl WhisperOutput {
    /// Convert to the shared model.
    ///
    /// Text without segments becomes one segment spanning the first minute.
    pub fn into_transcript(self) -> Transcript {
        let segments: Vec<TranscriptSegment> = self
            .segments
            .into_iter()
            .map(|s| {
                TranscriptSegment::new(s.start, s.end, s.text.trim()).with_words(
                    s.words
                        .into_iter()
                        .map(|w| Word::new(w.word.trim(), w.start, w.end))
                        .collect(),
                )
            })
            .collect();

        let text = self
            .transcription
            .or(self.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                segments
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            });

        if segments.is_empty() && !text.is_empty() {
            let segment = TranscriptSegment::new(0.0, UNSEGMENTED_SPAN_SECS, text.clone());
            return Transcript {
                text,
                segments: vec![segment],
            };
        }

        Transcript { text, segments }
    }
}

// ============================================================================
// Chat completions
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

// ============================================================================
// Text-to-speech
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TtsRequest<'a> {
    pub text: &'a str,
    pub model_id: &'a str,
    pub voice_settings: VoiceSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.5,
            use_speaker_boost: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_output_with_words() {
        let output: WhisperOutput = serde_json::from_str(
            r#"{
                "transcription": " hello there ",
                "segments": [
                    {"start": 0.0, "end": 1.2, "text": " hello there",
                     "words": [{"word": " hello", "start": 0.0, "end": 0.5},
                               {"word": " there", "start": 0.6, "end": 1.2}]}
                ]
            }"#,
        )
        .unwrap();

        let transcript = output.into_transcript();
        assert_eq!(transcript.text, "hello there");
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].words[1].word, "there");
    }

    #[test]
    fn test_whisper_output_text_only() {
        let output: WhisperOutput =
            serde_json::from_str(r#"{"transcription": "just text"}"#).unwrap();
        let transcript = output.into_transcript();
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].end, 60.0);
    }

    #[test]
    fn test_whisper_output_joins_segment_text() {
        let output: WhisperOutput = serde_json::from_str(
            r#"{"segments": [{"start": 0, "end": 1, "text": "a"}, {"start": 1, "end": 2, "text": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(output.into_transcript().text, "a b");
    }

    #[test]
    fn test_prediction_status() {
        let p: Prediction = serde_json::from_str(r#"{"id":"x","status":"processing"}"#).unwrap();
        assert!(!p.status.is_terminal());
        assert!(p.output.is_none());
    }
}
