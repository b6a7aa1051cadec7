//! Caption cues, either word-timed or spread across a known duration.

use std::path::PathBuf;

use tracing::{debug, info, Level};

use vshort_models::{SelectedSegment, Stage, SubtitleCue, Word};

use crate::stages::narration::Narration;
use crate::stages::StageContext;

/// Character budget of one distributed caption line.
pub const LINE_BUDGET: usize = 40;
/// Delay applied to distributed cues so captions land with the speech onset.
pub const SYNC_OFFSET: f64 = 0.5;
/// Neighbouring words shown on each side of the active word.
const WORD_CONTEXT: usize = 1;
/// Shorter cues are dropped.
const MIN_CUE_SECS: f64 = 0.01;

/// How cues were timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleMode {
    WordTimed,
    Distributed,
}

impl SubtitleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleMode::WordTimed => "word_timed",
            SubtitleMode::Distributed => "distributed",
        }
    }
}

/// Written subtitle file.
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub mode: SubtitleMode,
    pub cues: Vec<SubtitleCue>,
}

/// Uppercase with digits and bracket/brace characters removed.
pub fn sanitize_cue_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !c.is_numeric() && !matches!(c, '[' | ']' | '{' | '}' | '(' | ')' | '<' | '>'))
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Greedy word wrap; a single word longer than the budget gets its own line.
pub fn split_lines(text: &str, budget: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > budget && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Spread `text` evenly over `duration`, shifted by [`SYNC_OFFSET`].
pub fn distributed_cues(text: &str, duration: f64) -> Vec<SubtitleCue> {
    let lines = split_lines(&sanitize_cue_text(text), LINE_BUDGET);
    if lines.is_empty() || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let per_line = duration / lines.len() as f64;
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let start = i as f64 * per_line + SYNC_OFFSET;
            SubtitleCue::new(start, start + per_line, line)
        })
        .collect()
}

fn context_text(words: &[&Word], index: usize) -> String {
    let from = index.saturating_sub(WORD_CONTEXT);
    let to = (index + WORD_CONTEXT + 1).min(words.len());
    let joined = words[from..to]
        .iter()
        .map(|w| w.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    sanitize_cue_text(&joined)
}

/// One cue per word on the composed clip's timeline.
///
/// Segments are laid end to end in selection order; each word stays active
/// until the next word starts.
pub fn word_timed_cues(segments: &[SelectedSegment]) -> Vec<SubtitleCue> {
    let mut cues: Vec<SubtitleCue> = Vec::new();
    let mut offset = 0.0;

    for selected in segments {
        let segment = &selected.segment;
        let length = segment.duration();
        if !segment.is_valid() {
            continue;
        }

        let mut words: Vec<&Word> = segment
            .words
            .iter()
            .filter(|w| w.start.is_finite() && w.end.is_finite())
            .collect();
        words.sort_by(|a, b| a.start.total_cmp(&b.start));

        for (i, word) in words.iter().enumerate() {
            let until = words.get(i + 1).map_or(word.end, |next| next.start);
            let local_start = (word.start - segment.start).clamp(0.0, length);
            let local_end = (until - segment.start).clamp(0.0, length);

            let previous_end = cues.last().map_or(0.0, |c| c.end);
            let start = (offset + local_start).max(previous_end);
            let end = offset + local_end;
            if end - start < MIN_CUE_SECS {
                continue;
            }

            let text = context_text(&words, i);
            if text.is_empty() {
                continue;
            }
            cues.push(SubtitleCue::new(start, end, text));
        }
        offset += length;
    }
    cues
}

/// Choose the timing source and build cues.
///
/// Narration wins when present; word timings are only used when the clip
/// keeps its source audio.
pub fn plan_cues(
    script: &str,
    narration: Option<&Narration>,
    selected: &[SelectedSegment],
) -> (SubtitleMode, Vec<SubtitleCue>) {
    if let Some(narration) = narration {
        return (SubtitleMode::Distributed, distributed_cues(script, narration.duration));
    }

    if selected.iter().any(|s| !s.segment.words.is_empty()) {
        let cues = word_timed_cues(selected);
        if !cues.is_empty() {
            return (SubtitleMode::WordTimed, cues);
        }
    }

    let clip_duration: f64 = selected.iter().map(|s| s.duration().max(0.0)).sum();
    let clip_text = selected
        .iter()
        .map(|s| s.segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    (SubtitleMode::Distributed, distributed_cues(&clip_text, clip_duration))
}

/// Build and write the subtitle file.
///
/// Returns `None` when there is nothing to caption or the file cannot be
/// written; the clip is then rendered without subtitles.
pub async fn build_subtitles(
    ctx: &StageContext,
    script: &str,
    narration: Option<&Narration>,
    selected: &[SelectedSegment],
) -> Option<SubtitleTrack> {
    let reporter = ctx.reporter(Stage::AddingSubtitles);
    reporter.report(0.0, "Adding subtitles...");

    let (mode, cues) = plan_cues(script, narration, selected);
    if cues.is_empty() {
        ctx.logger
            .log_warning(Stage::AddingSubtitles, "No caption text, continuing without subtitles");
        reporter.report(100.0, "No subtitles to add");
        return None;
    }

    reporter.report(60.0, format!("Writing {} captions", cues.len()));
    let path = ctx.work_path("subtitles.ass");
    if let Err(e) = vshort_media::write_ass(&path, &cues).await {
        ctx.logger.log_warning(
            Stage::AddingSubtitles,
            &format!("Failed to write subtitles, continuing without: {}", e),
        );
        reporter.report(100.0, format!("Error: subtitles unavailable ({})", e));
        return None;
    }

    info!(
        session = %ctx.session.key,
        mode = mode.as_str(),
        cues = cues.len(),
        "Subtitles ready"
    );
    if tracing::enabled!(Level::DEBUG) {
        debug!(
            session = %ctx.session.key,
            "Caption timeline:\n{}",
            vshort_media::render_srt(&cues)
        );
    }
    reporter.report(100.0, format!("Subtitles ready ({} captions)", cues.len()));
    Some(SubtitleTrack { path, mode, cues })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vshort_models::{ArtifactKind, MediaArtifact, TranscriptSegment};

    fn selected(start: f64, end: f64, words: Vec<Word>) -> SelectedSegment {
        SelectedSegment {
            segment: TranscriptSegment::new(start, end, "text").with_words(words),
            importance: 0.5,
        }
    }

    fn assert_clean(cues: &[SubtitleCue]) {
        for cue in cues {
            assert!(!cue.text.chars().any(|c| c.is_numeric()), "digit in {:?}", cue.text);
            assert!(!cue.text.contains(['[', ']', '{', '}']), "bracket in {:?}", cue.text);
            assert_eq!(cue.text, cue.text.to_uppercase());
        }
        assert!(cues.windows(2).all(|w| w[0].start <= w[1].start));
        assert!(cues.windows(2).all(|w| w[0].end <= w[1].start + 1e-9));
    }

    #[test]
    fn test_sanitize_cue_text() {
        assert_eq!(sanitize_cue_text("Top 10 {tips} [here] (now)"), "TOP TIPS HERE NOW");
        assert_eq!(sanitize_cue_text("  été  "), "ÉTÉ");
    }

    #[test]
    fn test_split_lines_respects_budget() {
        let text = "the quick brown fox jumps over the lazy dog and keeps running far away";
        let lines = split_lines(text, 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.join(" "), text);

        let long = split_lines("supercalifragilisticexpialidocious word", 10);
        assert_eq!(long, vec!["supercalifragilisticexpialidocious", "word"]);
    }

    #[test]
    fn test_distributed_cues_offset_and_spacing() {
        let script = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen";
        let cues = distributed_cues(script, 12.0);
        assert!(cues.len() >= 2);
        assert_eq!(cues[0].start, SYNC_OFFSET);

        let per = 12.0 / cues.len() as f64;
        for (i, cue) in cues.iter().enumerate() {
            assert!((cue.start - (i as f64 * per + SYNC_OFFSET)).abs() < 1e-9);
            assert!((cue.end - cue.start - per).abs() < 1e-9);
        }
        assert_clean(&cues);
    }

    #[test]
    fn test_distributed_cues_empty_inputs() {
        assert!(distributed_cues("", 10.0).is_empty());
        assert!(distributed_cues("123 [456]", 10.0).is_empty());
        assert!(distributed_cues("hello", 0.0).is_empty());
    }

    #[test]
    fn test_word_timed_cues_follow_clip_timeline() {
        let first = selected(
            100.0,
            103.0,
            vec![
                Word::new("hello", 100.0, 100.5),
                Word::new("there", 101.0, 101.8),
                Word::new("friend", 102.0, 102.9),
            ],
        );
        let second = selected(
            200.0,
            202.0,
            vec![Word::new("second", 200.2, 200.9), Word::new("part", 201.0, 201.6)],
        );

        let cues = word_timed_cues(&[first, second]);
        assert_eq!(cues.len(), 5);

        // First word runs until the next one starts
        assert_eq!(cues[0].start, 0.0);
        assert_eq!(cues[0].end, 1.0);
        assert_eq!(cues[0].text, "HELLO THERE");
        assert_eq!(cues[1].text, "HELLO THERE FRIEND");

        // Second segment starts after the first segment's three seconds
        assert!((cues[3].start - 3.2).abs() < 1e-9);
        assert!((cues[4].end - 4.6).abs() < 1e-9);
        assert_clean(&cues);
    }

    #[test]
    fn test_word_timed_cues_clamp_and_skip() {
        let segment = selected(
            10.0,
            12.0,
            vec![
                Word::new("early", 9.0, 10.2),
                Word::new("dup", 10.5, 10.5),
                Word::new("dup2", 10.5, 10.9),
                Word::new("late", 11.5, 13.0),
                Word::new("2024", 11.8, 11.9),
            ],
        );
        let cues = word_timed_cues(&[segment]);
        assert_eq!(cues.first().map(|c| c.start), Some(0.0));
        assert!(cues.iter().all(|c| c.end <= 2.0 + 1e-9));
        assert!(cues.iter().all(|c| c.end - c.start >= MIN_CUE_SECS));
        assert_clean(&cues);
    }

    #[test]
    fn test_plan_prefers_narration() {
        let narration = Narration {
            artifact: MediaArtifact::new("/tmp/n.mp3", ArtifactKind::Narrated),
            duration: 20.0,
        };
        let words = vec![Word::new("hi", 0.0, 0.5)];
        let segments = vec![selected(0.0, 5.0, words)];

        let (mode, cues) = plan_cues("a narrated script", Some(&narration), &segments);
        assert_eq!(mode, SubtitleMode::Distributed);
        assert_eq!(cues.last().map(|c| c.end), Some(20.0 + SYNC_OFFSET));

        let (mode, _) = plan_cues("a narrated script", None, &segments);
        assert_eq!(mode, SubtitleMode::WordTimed);
    }

    #[test]
    fn test_plan_falls_back_to_clip_text() {
        let segments = vec![selected(0.0, 4.0, Vec::new()), selected(10.0, 16.0, Vec::new())];
        let (mode, cues) = plan_cues("", None, &segments);
        assert_eq!(mode, SubtitleMode::Distributed);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "TEXT TEXT");
        assert!((cues[0].end - (10.0 + SYNC_OFFSET)).abs() < 1e-9);
    }
}
