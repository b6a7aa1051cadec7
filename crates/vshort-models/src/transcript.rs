//! Transcript data produced by speech-to-text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One recognized word with its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// A time-bounded span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Spoken text
    pub text: String,
    /// Word-level timings, when the backend provides them
    #[serde(default)]
    pub words: Vec<Word>,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = words;
        self
    }

    /// Finite timestamps with `start < end`.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Word count from word timings, falling back to whitespace tokens.
    pub fn word_count(&self) -> usize {
        if self.words.is_empty() {
            self.text.split_whitespace().count()
        } else {
            self.words.len()
        }
    }

    /// Overlap in seconds with another segment (zero or negative when disjoint).
    pub fn overlap_with(&self, other: &TranscriptSegment) -> f64 {
        self.end.min(other.end) - self.start.max(other.start)
    }
}

/// Full speech-to-text result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Drop malformed segments.
    pub fn valid_segments(&self) -> Vec<TranscriptSegment> {
        self.segments.iter().filter(|s| s.is_valid()).cloned().collect()
    }

    pub fn has_word_timings(&self) -> bool {
        self.segments.iter().any(|s| !s.words.is_empty())
    }
}

/// A transcript segment chosen for the clip, with its importance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectedSegment {
    #[serde(flatten)]
    pub segment: TranscriptSegment,
    /// Importance in [0, 1]
    pub importance: f64,
}

impl SelectedSegment {
    pub fn start(&self) -> f64 {
        self.segment.start
    }

    pub fn end(&self) -> f64 {
        self.segment.end
    }

    pub fn duration(&self) -> f64 {
        self.segment.duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_validity() {
        assert!(TranscriptSegment::new(0.0, 1.0, "a").is_valid());
        assert!(!TranscriptSegment::new(1.0, 1.0, "a").is_valid());
        assert!(!TranscriptSegment::new(2.0, 1.0, "a").is_valid());
        assert!(!TranscriptSegment::new(f64::NAN, 1.0, "a").is_valid());
    }

    #[test]
    fn test_word_count_prefers_words() {
        let seg = TranscriptSegment::new(0.0, 2.0, "one two three");
        assert_eq!(seg.word_count(), 3);
        let seg = seg.with_words(vec![Word::new("one", 0.0, 1.0)]);
        assert_eq!(seg.word_count(), 1);
    }

    #[test]
    fn test_overlap() {
        let a = TranscriptSegment::new(0.0, 5.0, "a");
        let b = TranscriptSegment::new(4.0, 8.0, "b");
        let c = TranscriptSegment::new(6.0, 8.0, "c");
        assert!((a.overlap_with(&b) - 1.0).abs() < 1e-9);
        assert!(a.overlap_with(&c) < 0.0);
    }

    #[test]
    fn test_words_default_when_missing() {
        let seg: TranscriptSegment =
            serde_json::from_str(r#"{"start":0.0,"end":1.5,"text":"hi"}"#).unwrap();
        assert!(seg.words.is_empty());
    }
}
