//! The transcription stage pipeline.
//!
//! Stages run strictly in order — speech-to-text, forced alignment,
//! diarization, speaker assignment — each feeding the next. Only the first
//! stage is mandatory; the others degrade independently, reducing output
//! fidelity (no word timings, no speaker labels) without failing the job.

use crate::audio::wav;
use crate::cache::{DiarizerLoader, ModelCache, SttLoader};
use crate::config::{ComputeType, Device};
use crate::defaults;
use crate::engines::align::AlignerProvider;
use crate::engines::diarize::assign_speakers;
use crate::error::{EchoscriptError, Result};
use crate::segment::{RawSegment, TranscriptionResult, format_segments};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One transcription job's pipeline input. The audio file must already be
/// normalized to mono 16kHz PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    pub audio_path: PathBuf,
    /// Requested language code, or "auto" for detection.
    pub language: String,
    pub min_speakers: Option<u32>,
    pub max_speakers: Option<u32>,
}

impl TranscriptionRequest {
    /// Check request invariants. Must pass before the pipeline is invoked.
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_speakers, self.max_speakers)
            && min > max
        {
            return Err(EchoscriptError::Validation {
                message: "min_speakers cannot be greater than max_speakers".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of an optional pipeline stage.
///
/// Degradation is part of the type signature rather than an intercepted
/// exception: the caller always sees whether a stage completed.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded {
        stage: &'static str,
        reason: String,
    },
}

/// Sequences the inference stages over one audio input.
///
/// Owns the composition of loaders and the shared model cache; one pipeline
/// serves every job the process handles.
pub struct Pipeline {
    cache: Arc<ModelCache>,
    stt_loader: Box<dyn SttLoader>,
    diarizer_loader: Box<dyn DiarizerLoader>,
    aligner_provider: Box<dyn AlignerProvider>,
    device: Device,
    compute_type: ComputeType,
}

impl Pipeline {
    pub fn new(
        cache: Arc<ModelCache>,
        stt_loader: Box<dyn SttLoader>,
        diarizer_loader: Box<dyn DiarizerLoader>,
        aligner_provider: Box<dyn AlignerProvider>,
        device: Device,
        compute_type: ComputeType,
    ) -> Self {
        Self {
            cache,
            stt_loader,
            diarizer_loader,
            aligner_provider,
            device,
            compute_type,
        }
    }

    /// Eagerly populate the model cache, typically on cold start.
    ///
    /// # Errors
    /// Fails only if the mandatory speech-to-text capability cannot load;
    /// diarization unavailability is recorded and tolerated.
    pub fn preload(&self) -> Result<()> {
        self.cache
            .ensure_stt(self.stt_loader.as_ref(), self.device, self.compute_type)?;
        self.cache.ensure_diarizer(
            self.diarizer_loader.as_ref(),
            self.device,
            self.compute_type,
        );
        Ok(())
    }

    /// Run the full pipeline for one request.
    ///
    /// # Errors
    /// Fails on request-invariant violations, unreadable audio, or the
    /// mandatory speech-to-text stage; alignment and diarization failures
    /// degrade instead.
    pub fn run(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        request.validate()?;

        let stt = self
            .cache
            .ensure_stt(self.stt_loader.as_ref(), self.device, self.compute_type)?;

        debug!(path = %request.audio_path.display(), "loading audio");
        let (samples, duration) = wav::read_samples(&request.audio_path)?;

        info!(language = %request.language, "running transcription");
        let hint = (request.language != defaults::AUTO_LANGUAGE)
            .then_some(request.language.as_str());
        let transcription = stt.transcribe(&samples, hint)?;
        let language = resolve_language(&request.language, transcription.language.as_deref());
        let mut segments = transcription.segments;

        match self.align_stage(&segments, &samples, &language) {
            StageOutcome::Completed(aligned) => segments = aligned,
            StageOutcome::Degraded { stage, reason } => {
                warn!(stage, %reason, "stage degraded, continuing without word timings");
            }
        }

        match self.diarize_stage(&samples, request) {
            StageOutcome::Completed(turns) => assign_speakers(&turns, &mut segments),
            StageOutcome::Degraded { stage, reason } => {
                warn!(stage, %reason, "stage degraded, continuing without speaker labels");
            }
        }

        let speakers = extract_speakers(&segments);
        let segments = format_segments(&segments);

        Ok(TranscriptionResult {
            segments,
            speakers,
            language,
            duration,
        })
    }

    /// Forced alignment. The model is language-specific and transient: it
    /// is dropped before this function returns on every path.
    fn align_stage(
        &self,
        segments: &[RawSegment],
        samples: &[f32],
        language: &str,
    ) -> StageOutcome<Vec<RawSegment>> {
        let aligner = match self.aligner_provider.load(language) {
            Ok(aligner) => aligner,
            Err(e) => {
                return StageOutcome::Degraded {
                    stage: "alignment",
                    reason: e.to_string(),
                };
            }
        };

        info!(%language, "aligning transcription");
        let outcome = match aligner.align(segments, samples) {
            Ok(aligned) => StageOutcome::Completed(aligned),
            Err(e) => StageOutcome::Degraded {
                stage: "alignment",
                reason: e.to_string(),
            },
        };

        drop(aligner);
        debug!("released alignment model");
        outcome
    }

    fn diarize_stage(
        &self,
        samples: &[f32],
        request: &TranscriptionRequest,
    ) -> StageOutcome<Vec<crate::engines::diarize::SpeakerTurn>> {
        let Some(diarizer) = self.cache.ensure_diarizer(
            self.diarizer_loader.as_ref(),
            self.device,
            self.compute_type,
        ) else {
            return StageOutcome::Degraded {
                stage: "diarization",
                reason: "diarization capability unavailable".to_string(),
            };
        };

        info!("running speaker diarization");
        match diarizer.diarize(samples, request.min_speakers, request.max_speakers) {
            Ok(turns) => StageOutcome::Completed(turns),
            Err(e) => StageOutcome::Degraded {
                stage: "diarization",
                reason: e.to_string(),
            },
        }
    }
}

/// Resolve the output language code.
///
/// An explicit request wins; "auto" takes the detected value; with neither,
/// the "unknown" sentinel.
fn resolve_language(requested: &str, detected: Option<&str>) -> String {
    if requested != defaults::AUTO_LANGUAGE {
        requested.to_string()
    } else {
        detected
            .filter(|lang| !lang.is_empty())
            .unwrap_or(defaults::UNKNOWN_LANGUAGE)
            .to_string()
    }
}

/// Collect the distinct speaker labels observed across segments, sorted.
///
/// The sentinel is excluded whenever at least one real label exists;
/// unlabelled segments contribute nothing, so pure degradation yields an
/// empty set.
fn extract_speakers(segments: &[RawSegment]) -> Vec<String> {
    let mut labels: BTreeSet<String> = segments
        .iter()
        .filter_map(|seg| seg.speaker.as_deref())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect();

    if labels.len() > 1 {
        labels.remove(defaults::UNKNOWN_SPEAKER);
    }
    labels.into_iter().collect()
}
