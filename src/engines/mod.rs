//! Inference capability traits and backends.
//!
//! The pipeline consumes capabilities through these traits; concrete
//! backends (Whisper) and test doubles both live here.

pub mod align;
pub mod diarize;
pub mod stt;
pub mod whisper;

pub use align::{Aligner, AlignerProvider, NullAlignerProvider};
pub use diarize::{Diarizer, SpeakerTurn, assign_speakers};
pub use stt::{SpeechToText, Transcription};
