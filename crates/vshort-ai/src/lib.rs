//! HTTP clients for the VShort AI backends.
//!
//! - [`WhisperClient`]: speech-to-text with word timestamps (Replicate)
//! - [`ChatClient`]: OpenAI-compatible chat completions
//! - [`TtsClient`]: ElevenLabs text-to-speech

pub mod chat;
pub mod error;
pub mod tts;
pub mod types;
pub mod whisper;

pub use chat::{ChatClient, ChatConfig};
pub use error::{is_retryable_message, AiError, AiResult};
pub use tts::{TtsClient, TtsConfig, DEFAULT_VOICE_ID};
pub use whisper::{WhisperClient, WhisperConfig};
