//! Narration script synthesis.
//!
//! The sanitizer output is consumed verbatim by narration and subtitles, so
//! every path out of this stage (rewrite, extension, fallback) goes through
//! [`sanitize_script`].

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use vshort_models::Stage;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::stages::StageContext;

/// Budget for one text-generation request.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(?:segment|part|section|scene|intro(?:duction)?|conclusion|outro|hook|narrat(?:or|ion)|script|voice\s*over)\s*\d*\s*[:.\-]",
    )
    .expect("label regex")
});
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*•]+|\d+[.)])\s+").expect("list marker regex"));
static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}|<[^>]*>").expect("bracketed regex")
});
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{N}+").expect("digits regex"));
static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{M}\s.,'!?-]").expect("disallowed regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Strip everything narration and captions cannot carry.
///
/// Removes segment labels, list markers, bracketed asides, digits, and any
/// character outside letters, whitespace and `. , ' ! ? -`.
pub fn sanitize_script(text: &str) -> String {
    let text = LABEL_RE.replace_all(text, " ");
    let text = LIST_MARKER_RE.replace_all(&text, " ");
    let text = BRACKETED_RE.replace_all(&text, " ");
    let text = DIGITS_RE.replace_all(&text, " ");
    let text = DISALLOWED_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Generated narration script.
#[derive(Debug, Clone)]
pub struct Script {
    pub text: String,
    pub word_count: usize,
    /// Produced by the text-generation backend rather than the transcript
    pub from_backend: bool,
    /// Backend failure that forced the transcript fallback
    pub error: Option<String>,
}

fn system_prompt(language: &str) -> String {
    format!(
        "You are a scriptwriter for short vertical videos. Write in the language with code '{}'. \
         Output plain spoken text only: no titles, no labels, no lists, no brackets, no numbers \
         written as digits, no stage directions.",
        language
    )
}

fn rewrite_prompt(transcript: &str, min_words: usize, max_words: usize) -> String {
    format!(
        "Rewrite the following transcript as an energetic, engaging narration between {} and {} words. \
         Keep the key facts, open with a strong hook and end with a punchy conclusion.\n\n\
         Transcript:\n{}",
        min_words, max_words, transcript
    )
}

fn extension_prompt(script: &str, min_words: usize, max_words: usize) -> String {
    format!(
        "The following narration is too short. Lengthen it to between {} and {} words while \
         preserving its meaning and tone. Return only the full narration.\n\n{}",
        min_words, max_words, script
    )
}

async fn generate(ctx: &StageContext, system: &str, prompt: &str) -> WorkerResult<String> {
    tokio::time::timeout(GENERATION_TIMEOUT, ctx.backends.text.generate(system, prompt))
        .await
        .map_err(|_| WorkerError::timeout("script generation", GENERATION_TIMEOUT.as_secs()))?
}

async fn rewrite(ctx: &StageContext, transcript: &str) -> WorkerResult<String> {
    let reporter = ctx.reporter(Stage::GeneratingScript);
    let min_words = ctx.config.script_min_words;
    let max_words = ctx.config.script_max_words;
    let system = system_prompt(&ctx.session.options.language);

    reporter.report(20.0, "Requesting script rewrite");
    let raw = generate(ctx, &system, &rewrite_prompt(transcript, min_words, max_words)).await?;
    let mut script = sanitize_script(&raw);

    let words = word_count(&script);
    if words < min_words {
        reporter.report(60.0, format!("Script too short ({} words), extending", words));
        let extended = generate(ctx, &system, &extension_prompt(&script, min_words, max_words)).await?;
        let extended = sanitize_script(&extended);
        if word_count(&extended) > words {
            script = extended;
        } else {
            debug!(words, "Extension did not lengthen the script, keeping original");
        }
    }

    if script.is_empty() {
        return Err(WorkerError::stage_failed("script", "backend returned no usable text"));
    }
    Ok(script)
}

/// Rewrite the transcript into a narration script.
///
/// Never fails: any backend error falls back to the sanitized transcript.
pub async fn synthesize_script(ctx: &StageContext, transcript: &str) -> Script {
    let reporter = ctx.reporter(Stage::GeneratingScript);
    reporter.report(0.0, "Generating script...");

    match rewrite(ctx, transcript).await {
        Ok(text) => {
            let words = word_count(&text);
            if words > ctx.config.script_max_words {
                debug!(words, max = ctx.config.script_max_words, "Script above the word band");
            }
            info!(session = %ctx.session.key, words, "Script ready");
            reporter.report(100.0, format!("Script ready ({} words)", words));
            Script {
                text,
                word_count: words,
                from_backend: true,
                error: None,
            }
        }
        Err(e) => {
            let message = e.to_string();
            ctx.logger.log_warning(
                Stage::GeneratingScript,
                &format!("Falling back to transcript: {}", message),
            );
            metrics::record_placeholder("script");
            let text = sanitize_script(transcript);
            let words = word_count(&text);
            reporter.report(
                100.0,
                format!("Error: script generation failed, using transcript ({})", message),
            );
            Script {
                text,
                word_count: words,
                from_backend: false,
                error: Some(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_labels_and_lists() {
        let raw = "Segment 1: Welcome back!\n- First point here.\n2) Second point.\nConclusion: Bye.";
        let clean = sanitize_script(raw);
        assert_eq!(clean, "Welcome back! First point here. Second point. Bye.");
    }

    #[test]
    fn test_sanitize_strips_brackets_digits_and_symbols() {
        let raw = "In 2024 [music] the team {cue} scored (twice) 3 goals / 100% #win & more";
        let clean = sanitize_script(raw);
        assert!(!clean.chars().any(|c| c.is_numeric()));
        assert!(!clean.contains(['[', ']', '{', '}', '(', ')', '/', '%', '#', '&']));
        assert!(!clean.contains("music"));
        assert_eq!(clean, "In the team scored goals win more");
    }

    #[test]
    fn test_sanitize_keeps_accents_and_apostrophes() {
        let clean = sanitize_script("C'est l'été, déjà fini?");
        assert_eq!(clean, "C'est l'été, déjà fini?");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  one two\nthree "), 3);
        assert_eq!(word_count(""), 0);
    }
}
