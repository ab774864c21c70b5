//! Default configuration constants for echoscript.
//!
//! Shared constants used across the pipeline, job intake, and audio layers
//! to ensure consistency and eliminate duplication.

/// Audio sample rate in Hz expected by the pipeline.
///
/// Every input is normalized to 16kHz mono before transcription; duration
/// is derived from the sample count at this rate.
pub const SAMPLE_RATE: u32 = 16000;

/// Speaker label assigned when diarization is unavailable or produced no
/// overlapping turn for a segment.
pub const UNKNOWN_SPEAKER: &str = "UNKNOWN";

/// Language code reported when auto-detection was requested but the
/// speech-to-text stage did not return a language.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Languages accepted by job validation.
pub const VALID_LANGUAGES: &[&str] = &["fr", "en", AUTO_LANGUAGE];

/// Default Whisper model name.
///
/// Resolved to `models/ggml-<name>.bin` unless the configured value is
/// already a path.
pub const DEFAULT_MODEL: &str = "large-v3";

/// Output format used when a job does not request one.
pub const DEFAULT_OUTPUT_FORMAT: &str = "json";

/// Timeout for downloading the source audio file, in seconds.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Timeout for the ffmpeg normalization subprocess, in seconds.
pub const FFMPEG_TIMEOUT_SECS: u64 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_languages_include_auto() {
        assert!(VALID_LANGUAGES.contains(&AUTO_LANGUAGE));
    }

    #[test]
    fn sentinel_speaker_is_not_empty() {
        // The SRT/VTT speaker prefix is omitted only for empty labels,
        // so the sentinel must never be empty.
        assert!(!UNKNOWN_SPEAKER.is_empty());
    }
}
