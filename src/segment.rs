//! Canonical transcript segments and the formatter that produces them.
//!
//! Raw per-stage output carries optional fields (word timings only exist
//! after alignment, speaker labels only after diarization). The formatter
//! collapses that into a fixed-shape record every output encoder consumes.

use crate::defaults;
use serde::Serialize;

/// A word entry as produced by an inference stage. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWord {
    pub word: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// A segment as produced by an inference stage. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSegment {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub text: Option<String>,
    pub speaker: Option<String>,
    pub words: Option<Vec<RawWord>>,
}

impl RawSegment {
    /// Convenience constructor for the common speech-to-text output shape.
    pub fn new(start: f64, end: f64, text: &str) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

/// Word timing within a canonical segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// The pipeline's normalized, stage-agnostic transcript unit.
///
/// Timestamps are rounded to 3 decimals, text is trimmed, and the speaker
/// field is always present (sentinel fallback). `words` exists only when
/// forced alignment succeeded for the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

/// Output of one pipeline run. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionResult {
    pub segments: Vec<CanonicalSegment>,
    /// Distinct speaker labels actually observed, sorted. The sentinel is
    /// excluded unless it is the only label.
    pub speakers: Vec<String>,
    pub language: String,
    /// Audio duration in seconds.
    pub duration: f64,
}

/// Round to 3 decimal places (timestamp precision).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Round to 2 decimal places (duration/processing-time precision).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize raw stage output into canonical segments.
///
/// Pure function: no I/O, never fails. Missing fields default (timestamps
/// to 0, text to empty, speaker to the sentinel), word entries without a
/// text token are dropped, and input order is preserved.
pub fn format_segments(raw_segments: &[RawSegment]) -> Vec<CanonicalSegment> {
    raw_segments
        .iter()
        .map(|seg| CanonicalSegment {
            start: round3(seg.start.unwrap_or(0.0)),
            end: round3(seg.end.unwrap_or(0.0)),
            text: seg.text.as_deref().unwrap_or("").trim().to_string(),
            speaker: seg
                .speaker
                .clone()
                .unwrap_or_else(|| defaults::UNKNOWN_SPEAKER.to_string()),
            words: seg.words.as_ref().map(|words| {
                words
                    .iter()
                    .filter_map(|w| {
                        w.word.as_ref().map(|token| WordTiming {
                            word: token.clone(),
                            start: round3(w.start.unwrap_or(0.0)),
                            end: round3(w.end.unwrap_or(0.0)),
                        })
                    })
                    .collect()
            }),
        })
        .collect()
}
