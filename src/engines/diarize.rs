//! Speaker diarization capability trait and speaker assignment.

use crate::error::{EchoscriptError, Result};
use crate::segment::RawSegment;

/// A time interval attributed to one speaker, independent of transcript
/// content.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

impl SpeakerTurn {
    pub fn new(start: f64, end: f64, speaker: &str) -> Self {
        Self {
            start,
            end,
            speaker: speaker.to_string(),
        }
    }
}

/// Trait for diarization capabilities: partition audio into speaker turns.
pub trait Diarizer: Send + Sync {
    /// Diarize audio samples into speaker turns.
    ///
    /// # Arguments
    /// * `samples` - Audio samples as f32 PCM at 16kHz mono
    /// * `min_speakers` / `max_speakers` - optional speaker-count hints
    fn diarize(
        &self,
        samples: &[f32],
        min_speakers: Option<u32>,
        max_speakers: Option<u32>,
    ) -> Result<Vec<SpeakerTurn>>;
}

/// Merge speaker turns onto segments by maximal temporal overlap.
///
/// Each segment takes the label of the turn it overlaps most; ties go to
/// the turn appearing earliest in the diarizer's output order. Segments
/// with no overlapping turn are left unlabelled and pick up the sentinel
/// during formatting.
pub fn assign_speakers(turns: &[SpeakerTurn], segments: &mut [RawSegment]) {
    for segment in segments.iter_mut() {
        let seg_start = segment.start.unwrap_or(0.0);
        let seg_end = segment.end.unwrap_or(0.0);

        let mut best: Option<(&SpeakerTurn, f64)> = None;
        for turn in turns {
            let overlap = (seg_end.min(turn.end) - seg_start.max(turn.start)).max(0.0);
            if overlap > 0.0 && best.map_or(true, |(_, best_overlap)| overlap > best_overlap) {
                best = Some((turn, overlap));
            }
        }

        if let Some((turn, _)) = best {
            segment.speaker = Some(turn.speaker.clone());
        }
    }
}

/// Loader used when no diarization backend is compiled in.
///
/// Reports a missing credential when no token is configured, otherwise the
/// absence of a backend. Either way the model cache records the capability
/// as permanently unavailable and every job runs in degraded mode — a
/// valid state, not an error.
#[derive(Debug, Clone, Default)]
pub struct NullDiarizerLoader {
    token: Option<String>,
}

impl NullDiarizerLoader {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl crate::cache::DiarizerLoader for NullDiarizerLoader {
    fn load(
        &self,
        _device: crate::config::Device,
        _compute_type: crate::config::ComputeType,
    ) -> Result<std::sync::Arc<dyn Diarizer>> {
        let message = if self.token.is_none() {
            "HF_TOKEN is required for diarization".to_string()
        } else {
            "no diarization backend compiled into this build".to_string()
        };
        Err(EchoscriptError::ModelLoad {
            capability: "diarization".to_string(),
            message,
        })
    }
}

/// Mock diarizer for testing
#[derive(Debug, Clone, Default)]
pub struct MockDiarizer {
    turns: Vec<SpeakerTurn>,
    should_fail: bool,
}

impl MockDiarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to return specific speaker turns
    pub fn with_turns(mut self, turns: Vec<SpeakerTurn>) -> Self {
        self.turns = turns;
        self
    }

    /// Configure the mock to fail on diarize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Diarizer for MockDiarizer {
    fn diarize(
        &self,
        _samples: &[f32],
        _min_speakers: Option<u32>,
        _max_speakers: Option<u32>,
    ) -> Result<Vec<SpeakerTurn>> {
        if self.should_fail {
            Err(EchoscriptError::Transcription {
                message: "mock diarization failure".to_string(),
            })
        } else {
            Ok(self.turns.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_picks_maximal_overlap() {
        let turns = vec![
            SpeakerTurn::new(0.0, 1.0, "SPEAKER_00"),
            SpeakerTurn::new(1.0, 3.0, "SPEAKER_01"),
        ];
        // Segment spans 0.5..2.5: 0.5s overlap with SPEAKER_00, 1.5s with SPEAKER_01
        let mut segments = vec![RawSegment::new(0.5, 2.5, "hi")];

        assign_speakers(&turns, &mut segments);
        assert_eq!(segments[0].speaker.as_deref(), Some("SPEAKER_01"));
    }

    #[test]
    fn test_assign_tie_goes_to_earliest_turn() {
        let turns = vec![
            SpeakerTurn::new(0.0, 1.0, "SPEAKER_00"),
            SpeakerTurn::new(1.0, 2.0, "SPEAKER_01"),
        ];
        // Exactly 0.5s overlap with each turn
        let mut segments = vec![RawSegment::new(0.5, 1.5, "hi")];

        assign_speakers(&turns, &mut segments);
        assert_eq!(segments[0].speaker.as_deref(), Some("SPEAKER_00"));
    }

    #[test]
    fn test_assign_leaves_non_overlapping_segments_unlabelled() {
        let turns = vec![SpeakerTurn::new(10.0, 12.0, "SPEAKER_00")];
        let mut segments = vec![RawSegment::new(0.0, 1.0, "hi")];

        assign_speakers(&turns, &mut segments);
        assert!(segments[0].speaker.is_none());
    }

    #[test]
    fn test_assign_with_no_turns_is_noop() {
        let mut segments = vec![RawSegment::new(0.0, 1.0, "hi")];
        assign_speakers(&[], &mut segments);
        assert!(segments[0].speaker.is_none());
    }

    #[test]
    fn test_mock_diarizer_returns_turns() {
        let diarizer =
            MockDiarizer::new().with_turns(vec![SpeakerTurn::new(0.0, 5.0, "SPEAKER_00")]);

        let turns = diarizer.diarize(&[], None, Some(2)).expect("diarize");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, "SPEAKER_00");
    }

    #[test]
    fn test_mock_diarizer_failure() {
        let diarizer = MockDiarizer::new().with_failure();
        assert!(diarizer.diarize(&[], None, None).is_err());
    }
}
