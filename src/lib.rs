//! echoscript - Single-shot audio transcription worker
//!
//! URL in, time-aligned speaker-attributed transcript out. Models load
//! once per process and are reused across jobs; optional stages degrade
//! instead of failing the job.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod engines;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod segment;

// Capability seams (real backends and test doubles)
pub use engines::align::{Aligner, AlignerProvider};
pub use engines::diarize::{Diarizer, SpeakerTurn};
pub use engines::stt::{SpeechToText, Transcription};

// Pipeline
pub use cache::{DiarizerLoader, ModelCache, SttLoader};
pub use pipeline::{Pipeline, StageOutcome, TranscriptionRequest};

// Job boundary
pub use job::{JobHandler, ValidatedJob, validate_input};
pub use output::{EncodedOutput, OutputFormat, encode};
pub use segment::{CanonicalSegment, TranscriptionResult, WordTiming, format_segments};

// Error handling
pub use error::{EchoscriptError, Result};

// Config
pub use config::{ComputeType, Config, Device};
