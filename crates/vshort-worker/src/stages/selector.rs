//! Importance-scored, duration-targeted segment selection.
//!
//! Source transcripts rarely come in clean, evenly sized segments, so the
//! selector relaxes its constraints in tiers instead of failing:
//!
//! 1. keep segments lasting 3-25 s;
//! 2. with fewer than 8 survivors, admit segments down to 1.5 s and split
//!    anything longer than 25 s into ~10 s pieces;
//! 3. with nothing left, take any well-formed segment, and with nothing
//!    well-formed, one synthetic segment spanning the target.
//!
//! Candidates are scored, the best 30 are walked chronologically, and a
//! greedy pass accepts segments that overlap the current pick by at most
//! 1 s. Short totals re-admit overlapping candidates (below 70 % of the
//! target) and then unused segments from the original pool (below 50 %).

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use vshort_models::{SelectedSegment, TranscriptSegment};

pub const MIN_SEGMENT_SECS: f64 = 3.0;
pub const MAX_SEGMENT_SECS: f64 = 25.0;
pub const RELAXED_MIN_SECS: f64 = 1.5;
pub const SPLIT_CHUNK_SECS: f64 = 10.0;
pub const MIN_POOL_SIZE: usize = 8;
pub const TOP_CANDIDATES: usize = 30;
pub const MAX_OVERLAP_SECS: f64 = 1.0;
pub const IDEAL_SEGMENT_SECS: f64 = 7.5;

/// Greedy additions never push the total past this share of the target.
const OVERSHOOT_RATIO: f64 = 1.1;
const RELAX_OVERLAP_BELOW: f64 = 0.7;
const RELAX_POOL_BELOW: f64 = 0.5;

const SYNTHETIC_TEXT: &str = "No valid segments";
const SYNTHETIC_IMPORTANCE: f64 = 0.5;

/// Pacing and density score in [0, 1].
///
/// `0.6 * (1 - |7.5 - d| / 5) + 0.4 * min(1, words / 20)`, with the
/// duration term clamped so very short or long segments score zero on it.
pub fn importance(segment: &TranscriptSegment) -> f64 {
    let pacing = (1.0 - (IDEAL_SEGMENT_SECS - segment.duration()).abs() / 5.0).clamp(0.0, 1.0);
    let density = (segment.word_count() as f64 / 20.0).min(1.0);
    0.6 * pacing + 0.4 * density
}

/// Split a long segment into roughly `SPLIT_CHUNK_SECS` pieces.
///
/// Each piece keeps the parent text and the words that fall inside it.
pub fn split_segment(segment: &TranscriptSegment) -> Vec<TranscriptSegment> {
    let duration = segment.duration();
    let pieces = (duration / SPLIT_CHUNK_SECS).ceil().max(1.0) as usize;
    let chunk = duration / pieces as f64;

    (0..pieces)
        .map(|i| {
            let start = segment.start + chunk * i as f64;
            let end = if i + 1 == pieces {
                segment.end
            } else {
                segment.start + chunk * (i + 1) as f64
            };
            let words = segment
                .words
                .iter()
                .filter(|w| w.start >= start && w.end <= end)
                .cloned()
                .collect();
            TranscriptSegment::new(start, end, segment.text.clone()).with_words(words)
        })
        .collect()
}

fn in_range(segment: &TranscriptSegment, min: f64) -> bool {
    let d = segment.duration();
    d >= min && d <= MAX_SEGMENT_SECS
}

fn by_start(a: &TranscriptSegment, b: &TranscriptSegment) -> Ordering {
    a.start
        .partial_cmp(&b.start)
        .unwrap_or(Ordering::Equal)
        .then(a.end.partial_cmp(&b.end).unwrap_or(Ordering::Equal))
}

fn span_key(segment: &TranscriptSegment) -> (u64, u64) {
    (segment.start.to_bits(), segment.end.to_bits())
}

fn synthetic(segments: &[TranscriptSegment], target: f64) -> SelectedSegment {
    let text = segments
        .first()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(SYNTHETIC_TEXT);

    SelectedSegment {
        segment: TranscriptSegment::new(0.0, target, text),
        importance: SYNTHETIC_IMPORTANCE,
    }
}

/// Candidate pool after the filtering tiers.
fn candidate_pool(valid: &[TranscriptSegment]) -> Vec<TranscriptSegment> {
    let strict: Vec<TranscriptSegment> = valid
        .iter()
        .filter(|s| in_range(s, MIN_SEGMENT_SECS))
        .cloned()
        .collect();
    if strict.len() >= MIN_POOL_SIZE {
        return strict;
    }

    let mut relaxed: Vec<TranscriptSegment> = valid
        .iter()
        .filter(|s| in_range(s, RELAXED_MIN_SECS))
        .cloned()
        .collect();
    for long in valid.iter().filter(|s| s.duration() > MAX_SEGMENT_SECS) {
        relaxed.extend(split_segment(long));
    }
    debug!(
        strict = strict.len(),
        relaxed = relaxed.len(),
        "Relaxed segment filter"
    );

    if relaxed.is_empty() {
        valid.to_vec()
    } else {
        relaxed
    }
}

/// Running selection with the overshoot cap applied to every addition.
struct Selection {
    picked: Vec<SelectedSegment>,
    seen: HashSet<(u64, u64)>,
    total: f64,
    target: f64,
}

impl Selection {
    fn new(target: f64) -> Self {
        Self {
            picked: Vec::new(),
            seen: HashSet::new(),
            total: 0.0,
            target,
        }
    }

    fn reached(&self, ratio: f64) -> bool {
        self.total >= self.target * ratio
    }

    fn contains(&self, segment: &TranscriptSegment) -> bool {
        self.seen.contains(&span_key(segment))
    }

    fn fits(&self, segment: &TranscriptSegment) -> bool {
        self.picked.is_empty() || self.total + segment.duration() <= self.target * OVERSHOOT_RATIO
    }

    fn overlaps(&self, segment: &TranscriptSegment) -> bool {
        self.picked
            .iter()
            .any(|p| p.segment.overlap_with(segment) > MAX_OVERLAP_SECS)
    }

    fn push(&mut self, segment: TranscriptSegment, importance: f64) {
        self.total += segment.duration();
        self.seen.insert(span_key(&segment));
        self.picked.push(SelectedSegment {
            segment,
            importance,
        });
    }

    /// Add segments in order until the target is met.
    fn fill<'a, I>(&mut self, segments: I, allow_overlap: bool)
    where
        I: IntoIterator<Item = (&'a TranscriptSegment, f64)>,
    {
        for (segment, score) in segments {
            if self.reached(1.0) {
                break;
            }
            if self.contains(segment) || !self.fits(segment) {
                continue;
            }
            if !allow_overlap && self.overlaps(segment) {
                continue;
            }
            self.push(segment.clone(), score);
        }
    }
}

/// Choose segments summing to roughly `target` seconds, sorted by start.
///
/// Never returns an empty list.
pub fn select_segments(segments: &[TranscriptSegment], target: f64) -> Vec<SelectedSegment> {
    let mut valid: Vec<TranscriptSegment> =
        segments.iter().filter(|s| s.is_valid()).cloned().collect();
    valid.sort_by(by_start);

    let pool = candidate_pool(&valid);
    if pool.is_empty() {
        debug!(input = segments.len(), "No usable segments, returning synthetic segment");
        return vec![synthetic(segments, target)];
    }

    let mut scored: Vec<(TranscriptSegment, f64)> = pool
        .into_iter()
        .map(|s| {
            let score = importance(&s);
            (s, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(TOP_CANDIDATES);
    scored.sort_by(|a, b| by_start(&a.0, &b.0));

    let mut selection = Selection::new(target);
    selection.fill(scored.iter().map(|(s, score)| (s, *score)), false);

    if !selection.reached(RELAX_OVERLAP_BELOW) {
        debug!(total = selection.total, target, "Relaxing overlap constraint");
        selection.fill(scored.iter().map(|(s, score)| (s, *score)), true);
    }

    if !selection.reached(RELAX_POOL_BELOW) {
        debug!(total = selection.total, target, "Pulling from the unfiltered pool");
        selection.fill(valid.iter().map(|s| (s, importance(s))), true);
    }

    let mut picked = selection.picked;
    if picked.is_empty() {
        return vec![synthetic(segments, target)];
    }
    picked.sort_by(|a, b| by_start(&a.segment, &b.segment));

    debug!(
        selected = picked.len(),
        total = picked.iter().map(|s| s.duration()).sum::<f64>(),
        target,
        "Segments selected"
    );
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use vshort_models::Word;

    fn seg(start: f64, end: f64, words: usize) -> TranscriptSegment {
        let text = vec!["mot"; words].join(" ");
        TranscriptSegment::new(start, end, text)
    }

    fn total(selected: &[SelectedSegment]) -> f64 {
        selected.iter().map(|s| s.duration()).sum()
    }

    fn max_pairwise_overlap(selected: &[SelectedSegment]) -> f64 {
        let mut worst: f64 = 0.0;
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                worst = worst.max(a.segment.overlap_with(&b.segment));
            }
        }
        worst
    }

    fn is_sorted(selected: &[SelectedSegment]) -> bool {
        selected.windows(2).all(|w| w[0].start() <= w[1].start())
    }

    #[test]
    fn test_importance_formula() {
        // Ideal length and dense: full score
        assert!((importance(&seg(0.0, 7.5, 20)) - 1.0).abs() < 1e-9);
        // 2.5 s off the ideal halves the pacing term
        assert!((importance(&seg(0.0, 10.0, 0)) - 0.3).abs() < 1e-9);
        // Far from ideal clamps to zero instead of going negative
        assert!((importance(&seg(0.0, 25.0, 10)) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_forty_segments_land_in_band() {
        let segments: Vec<TranscriptSegment> = (0..40)
            .map(|i| {
                let start = i as f64 * 10.0;
                let duration = 5.0 + ((i * 3) % 7) as f64 + (i % 3) as f64 * 0.5;
                seg(start, start + duration.min(11.0), 8 + i % 15)
            })
            .collect();

        let selected = select_segments(&segments, 85.0);
        let sum = total(&selected);

        assert!((76.5..=93.5).contains(&sum), "total {} outside band", sum);
        assert!(is_sorted(&selected));
        assert!(max_pairwise_overlap(&selected) <= MAX_OVERLAP_SECS + 1e-9);
        assert!(selected.iter().all(|s| (0.0..=1.0).contains(&s.importance)));
    }

    #[test]
    fn test_varied_pool_lands_in_band() {
        let durations = [5.0, 12.0, 7.0, 9.5, 6.0, 11.0, 8.0, 5.5, 10.0, 7.5];
        let mut start = 0.0;
        let segments: Vec<TranscriptSegment> = durations
            .iter()
            .cycle()
            .take(40)
            .map(|d| {
                let s = seg(start, start + d, 15);
                start += d + 0.5;
                s
            })
            .collect();

        let sum = total(&select_segments(&segments, 85.0));
        assert!((76.5..=93.5).contains(&sum), "total {} outside band", sum);
    }

    #[test]
    fn test_sparse_pool_relaxes_overlap() {
        let segments = vec![seg(0.0, 10.0, 10), seg(2.0, 12.0, 10), seg(4.0, 14.0, 10)];

        let selected = select_segments(&segments, 85.0);
        assert_eq!(selected.len(), 3);
        assert!(max_pairwise_overlap(&selected) > MAX_OVERLAP_SECS);
        assert!(is_sorted(&selected));
    }

    #[test]
    fn test_empty_input_gives_one_synthetic_segment() {
        let selected = select_segments(&[], 85.0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].start(), 0.0);
        assert_eq!(selected[0].end(), 85.0);
        assert_eq!(selected[0].segment.text, "No valid segments");
    }

    #[test]
    fn test_malformed_only_gives_synthetic_with_first_text() {
        let segments = vec![
            TranscriptSegment::new(f64::NAN, 3.0, "broken timing"),
            TranscriptSegment::new(5.0, 5.0, "zero length"),
        ];
        let selected = select_segments(&segments, 60.0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].segment.text, "broken timing");
        assert_eq!(selected[0].end(), 60.0);
    }

    #[test]
    fn test_non_empty_input_never_empty() {
        // Only very short segments: below the relaxed minimum
        let segments = vec![seg(0.0, 1.0, 2), seg(3.0, 4.0, 2)];
        let selected = select_segments(&segments, 85.0);
        assert_eq!(selected.len(), 2);
        assert!(is_sorted(&selected));
    }

    #[test]
    fn test_long_segment_is_split_with_words() {
        let words: Vec<Word> = (0..60)
            .map(|i| Word::new(format!("w{}", i), i as f64, i as f64 + 0.8))
            .collect();
        let long = TranscriptSegment::new(0.0, 60.0, "long monologue").with_words(words);

        let pieces = split_segment(&long);
        assert_eq!(pieces.len(), 6);
        assert_eq!(pieces[0].end, 10.0);
        assert_eq!(pieces[5].end, 60.0);
        assert!(pieces.iter().all(|p| p.text == "long monologue"));
        assert_eq!(pieces[0].words.len(), 10);
        assert!(pieces[1].words.iter().all(|w| w.start >= 10.0 && w.end <= 20.0));

        let selected = select_segments(&[long], 30.0);
        let sum = total(&selected);
        assert!((27.0..=33.0).contains(&sum), "total {}", sum);
        assert!(selected.iter().all(|s| s.duration() <= MAX_SEGMENT_SECS));
    }

    #[test]
    fn test_overshoot_cap_skips_large_segments() {
        let mut segments: Vec<TranscriptSegment> =
            (0..9).map(|i| seg(i as f64 * 30.0, i as f64 * 30.0 + 9.0, 20)).collect();
        // Would push 81 s to 101 s
        segments.push(seg(300.0, 320.0, 20));
        segments.push(seg(330.0, 334.0, 20));

        let selected = select_segments(&segments, 85.0);
        let sum = total(&selected);
        assert!(sum <= 85.0 * 1.1, "total {}", sum);
        assert!(selected.iter().all(|s| s.duration() < 20.0));
    }
}
