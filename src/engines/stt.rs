//! Speech-to-text capability trait.

use crate::error::{EchoscriptError, Result};
use crate::segment::RawSegment;
use std::sync::Arc;

/// Output of the speech-to-text stage.
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    pub segments: Vec<RawSegment>,
    /// Language detected by the model, if it reports one.
    pub language: Option<String>,
}

/// Trait for speech-to-text capabilities.
///
/// This is the pipeline's only mandatory capability; every other stage
/// degrades gracefully. The trait allows swapping implementations
/// (real Whisper vs mock).
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio samples to timed segments.
    ///
    /// # Arguments
    /// * `samples` - Audio samples as f32 PCM at 16kHz mono, range [-1.0, 1.0]
    /// * `language` - Language hint, or None for auto-detection
    fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<Transcription>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

impl std::fmt::Debug for dyn SpeechToText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechToText")
            .field("model_name", &self.model_name())
            .finish()
    }
}

/// Implement SpeechToText for Arc<T> to allow sharing across jobs.
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<Transcription> {
        (**self).transcribe(samples, language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock speech-to-text for testing
#[derive(Debug, Clone, Default)]
pub struct MockSpeechToText {
    segments: Vec<RawSegment>,
    language: Option<String>,
    should_fail: bool,
}

impl MockSpeechToText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to return specific segments
    pub fn with_segments(mut self, segments: Vec<RawSegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the detected language the mock reports
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl SpeechToText for MockSpeechToText {
    fn transcribe(&self, _samples: &[f32], _language: Option<&str>) -> Result<Transcription> {
        if self.should_fail {
            Err(EchoscriptError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(Transcription {
                segments: self.segments.clone(),
                language: self.language.clone(),
            })
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
