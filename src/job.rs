//! Job intake and the end-to-end handler.
//!
//! One job in, one result out: validate the payload, fetch and normalize
//! the audio, run the pipeline, encode. Every failure is caught at this
//! boundary and mapped to an `{"error": ...}` payload — the caller never
//! sees a partial result. Temporary files are cleaned up on all paths.

use crate::audio::{convert, download};
use crate::config::AudioConfig;
use crate::defaults;
use crate::error::{EchoscriptError, Result};
use crate::output::{self, EncodedOutput, OutputFormat};
use crate::pipeline::{Pipeline, TranscriptionRequest};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// A validated, normalized job.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedJob {
    pub audio_url: String,
    pub language: String,
    pub output_format: OutputFormat,
    pub min_speakers: Option<u32>,
    pub max_speakers: Option<u32>,
}

/// Validate and normalize a job's `input` object.
///
/// # Errors
/// `Validation` for missing/malformed fields, `UnsupportedFormat` for an
/// unknown output format. Either way the pipeline is never invoked.
pub fn validate_input(input: &Value) -> Result<ValidatedJob> {
    let Some(fields) = input.as_object().filter(|obj| !obj.is_empty()) else {
        return Err(EchoscriptError::Validation {
            message: "No input provided".to_string(),
        });
    };

    let audio_url = match fields.get("audio_url") {
        Some(Value::String(url)) if !url.is_empty() => url.clone(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(EchoscriptError::Validation {
                message: "audio_url is required".to_string(),
            });
        }
        Some(_) => {
            return Err(EchoscriptError::Validation {
                message: "audio_url must be a string".to_string(),
            });
        }
    };

    let language = match fields.get("language") {
        None | Some(Value::Null) => defaults::AUTO_LANGUAGE.to_string(),
        Some(Value::String(lang)) if defaults::VALID_LANGUAGES.contains(&lang.as_str()) => {
            lang.clone()
        }
        Some(other) => {
            return Err(EchoscriptError::Validation {
                message: format!(
                    "Invalid language: {}. Must be one of {:?}",
                    other.as_str().unwrap_or(&other.to_string()),
                    defaults::VALID_LANGUAGES
                ),
            });
        }
    };

    let output_format = match fields.get("output_format") {
        None | Some(Value::Null) => OutputFormat::Json,
        Some(Value::String(format)) => format.parse()?,
        Some(other) => {
            return Err(EchoscriptError::UnsupportedFormat {
                format: other.to_string(),
            });
        }
    };

    let min_speakers = speaker_hint(fields.get("min_speakers"), "min_speakers")?;
    let max_speakers = speaker_hint(fields.get("max_speakers"), "max_speakers")?;
    if let (Some(min), Some(max)) = (min_speakers, max_speakers)
        && min > max
    {
        return Err(EchoscriptError::Validation {
            message: "min_speakers cannot be greater than max_speakers".to_string(),
        });
    }

    Ok(ValidatedJob {
        audio_url,
        language,
        output_format,
        min_speakers,
        max_speakers,
    })
}

fn speaker_hint(value: Option<&Value>, field: &str) -> Result<Option<u32>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(count) if count <= u32::MAX as u64 => Ok(Some(count as u32)),
            _ => Err(EchoscriptError::Validation {
                message: format!("{field} must be a non-negative integer"),
            }),
        },
        Some(_) => Err(EchoscriptError::Validation {
            message: format!("{field} must be an integer"),
        }),
    }
}

/// Processes jobs sequentially against a shared pipeline.
pub struct JobHandler {
    pipeline: Arc<Pipeline>,
    audio_config: AudioConfig,
}

impl JobHandler {
    pub fn new(pipeline: Arc<Pipeline>, audio_config: AudioConfig) -> Self {
        Self {
            pipeline,
            audio_config,
        }
    }

    /// The shared pipeline, exposed for eager preloading at startup.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Handle one job payload of the shape `{"input": {...}}`.
    ///
    /// Always returns a result value: the encoded transcription on success,
    /// `{"error": <message>}` otherwise.
    pub async fn handle(&self, payload: &Value) -> Value {
        let started = Instant::now();
        match self.run_job(payload, started).await {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "job failed");
                json!({ "error": error_message(&e) })
            }
        }
    }

    async fn run_job(&self, payload: &Value, started: Instant) -> Result<Value> {
        let job = validate_input(payload.get("input").unwrap_or(&Value::Null))?;
        info!(
            url = %job.audio_url,
            language = %job.language,
            format = %job.output_format,
            "processing job"
        );

        // Both temp paths are deleted on drop, success or failure.
        let downloaded =
            download::fetch(&job.audio_url, self.audio_config.download_timeout_secs).await?;
        let wav = convert::to_pcm_wav(&downloaded, self.audio_config.ffmpeg_timeout_secs).await?;

        let request = TranscriptionRequest {
            audio_path: wav.to_path_buf(),
            language: job.language.clone(),
            min_speakers: job.min_speakers,
            max_speakers: job.max_speakers,
        };

        let pipeline = Arc::clone(&self.pipeline);
        let result = tokio::task::spawn_blocking(move || pipeline.run(&request))
            .await
            .map_err(|e| EchoscriptError::Other(format!("pipeline task failed: {e}")))??;

        let processing_time = started.elapsed().as_secs_f64();
        info!(processing_time = format!("{processing_time:.2}").as_str(), "job complete");

        Ok(
            match output::encode(&result, processing_time, job.output_format) {
                EncodedOutput::Json(value) => value,
                EncodedOutput::Text(text) => Value::String(text),
            },
        )
    }
}

/// Map an error to the message surfaced to the caller. Request problems
/// are reported verbatim; everything else is a transcription failure.
fn error_message(error: &EchoscriptError) -> String {
    if error.is_request_error() {
        error.to_string()
    } else {
        format!("Transcription failed: {error}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: Value) -> Result<ValidatedJob> {
        validate_input(&value)
    }

    #[test]
    fn test_validate_minimal_job() {
        let job = input(json!({"audio_url": "https://host/a.mp3"})).expect("valid");
        assert_eq!(job.audio_url, "https://host/a.mp3");
        assert_eq!(job.language, "auto");
        assert_eq!(job.output_format, OutputFormat::Json);
        assert!(job.min_speakers.is_none());
        assert!(job.max_speakers.is_none());
    }

    #[test]
    fn test_validate_full_job() {
        let job = input(json!({
            "audio_url": "https://host/a.wav",
            "language": "fr",
            "output_format": "srt",
            "min_speakers": 1,
            "max_speakers": 3,
        }))
        .expect("valid");
        assert_eq!(job.language, "fr");
        assert_eq!(job.output_format, OutputFormat::Srt);
        assert_eq!(job.min_speakers, Some(1));
        assert_eq!(job.max_speakers, Some(3));
    }

    #[test]
    fn test_validate_rejects_empty_input() {
        assert!(matches!(
            input(json!(null)),
            Err(EchoscriptError::Validation { .. })
        ));
        assert!(matches!(
            input(json!({})),
            Err(EchoscriptError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_requires_audio_url() {
        let err = input(json!({"language": "en"})).unwrap_err();
        assert_eq!(err.to_string(), "audio_url is required");

        let err = input(json!({"audio_url": ""})).unwrap_err();
        assert_eq!(err.to_string(), "audio_url is required");
    }

    #[test]
    fn test_validate_rejects_unknown_language() {
        let err = input(json!({"audio_url": "u", "language": "de"})).unwrap_err();
        assert!(matches!(err, EchoscriptError::Validation { .. }));
        assert!(err.to_string().contains("Invalid language: de"));
    }

    #[test]
    fn test_validate_rejects_unsupported_format_distinctly() {
        let err = input(json!({"audio_url": "u", "output_format": "xml"})).unwrap_err();
        assert!(matches!(
            err,
            EchoscriptError::UnsupportedFormat { ref format } if format == "xml"
        ));
    }

    #[test]
    fn test_validate_rejects_min_greater_than_max() {
        let err = input(json!({
            "audio_url": "u",
            "min_speakers": 4,
            "max_speakers": 2,
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "min_speakers cannot be greater than max_speakers"
        );
    }

    #[test]
    fn test_validate_rejects_negative_speaker_hint() {
        let err = input(json!({"audio_url": "u", "min_speakers": -1})).unwrap_err();
        assert!(err.to_string().contains("non-negative integer"));
    }

    #[test]
    fn test_validate_rejects_non_integer_speaker_hint() {
        let err = input(json!({"audio_url": "u", "max_speakers": "two"})).unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn test_error_message_mapping() {
        let validation = EchoscriptError::Validation {
            message: "audio_url is required".to_string(),
        };
        assert_eq!(error_message(&validation), "audio_url is required");

        let inference = EchoscriptError::Transcription {
            message: "boom".to_string(),
        };
        assert_eq!(
            error_message(&inference),
            "Transcription failed: Transcription inference failed: boom"
        );
    }
}
