//! Forced-alignment capability traits.
//!
//! Alignment models are language-specific and loaded per job, not cached:
//! the provider hands out a transient model that the pipeline drops as soon
//! as the stage completes, releasing accelerator memory.

use crate::error::{EchoscriptError, Result};
use crate::segment::{RawSegment, RawWord};

/// Trait for forced-alignment models: refine coarse segment timing into
/// per-word start/end timestamps against the audio signal.
pub trait Aligner: Send {
    /// Re-time `segments` against `samples`, attaching word timings.
    fn align(&self, segments: &[RawSegment], samples: &[f32]) -> Result<Vec<RawSegment>>;
}

/// Loads a transient alignment model for a resolved language.
pub trait AlignerProvider: Send + Sync {
    /// Load an alignment model for `language`.
    ///
    /// # Errors
    /// Load failure is non-fatal for the pipeline; the job proceeds without
    /// word timings.
    fn load(&self, language: &str) -> Result<Box<dyn Aligner>>;
}

/// Provider used when no alignment backend is compiled in. Every load
/// degrades the alignment stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlignerProvider;

impl AlignerProvider for NullAlignerProvider {
    fn load(&self, language: &str) -> Result<Box<dyn Aligner>> {
        Err(EchoscriptError::ModelLoad {
            capability: "alignment".to_string(),
            message: format!("no alignment backend available for language {language}"),
        })
    }
}

/// Mock aligner for testing: splits each segment's text on whitespace and
/// distributes word timings evenly across the segment span.
#[derive(Debug, Clone, Default)]
pub struct MockAligner {
    should_fail: bool,
}

impl MockAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on align
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Aligner for MockAligner {
    fn align(&self, segments: &[RawSegment], _samples: &[f32]) -> Result<Vec<RawSegment>> {
        if self.should_fail {
            return Err(EchoscriptError::Transcription {
                message: "mock alignment failure".to_string(),
            });
        }

        Ok(segments
            .iter()
            .map(|seg| {
                let start = seg.start.unwrap_or(0.0);
                let end = seg.end.unwrap_or(0.0);
                let tokens: Vec<&str> = seg
                    .text
                    .as_deref()
                    .unwrap_or("")
                    .split_whitespace()
                    .collect();
                let step = if tokens.is_empty() {
                    0.0
                } else {
                    (end - start) / tokens.len() as f64
                };
                let words = tokens
                    .iter()
                    .enumerate()
                    .map(|(i, token)| RawWord {
                        word: Some((*token).to_string()),
                        start: Some(start + step * i as f64),
                        end: Some(start + step * (i + 1) as f64),
                    })
                    .collect();
                RawSegment {
                    words: Some(words),
                    ..seg.clone()
                }
            })
            .collect())
    }
}

/// Provider wrapping [`MockAligner`] for tests.
#[derive(Debug, Clone, Default)]
pub struct MockAlignerProvider {
    fail_load: bool,
    fail_align: bool,
}

impl MockAlignerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the provider to fail at model load time
    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Configure the loaded aligner to fail at run time
    pub fn with_align_failure(mut self) -> Self {
        self.fail_align = true;
        self
    }
}

impl AlignerProvider for MockAlignerProvider {
    fn load(&self, language: &str) -> Result<Box<dyn Aligner>> {
        if self.fail_load {
            return Err(EchoscriptError::ModelLoad {
                capability: "alignment".to_string(),
                message: format!("mock load failure for {language}"),
            });
        }
        let mut aligner = MockAligner::new();
        if self.fail_align {
            aligner = aligner.with_failure();
        }
        Ok(Box::new(aligner))
    }
}
