//! Output encoders: structured JSON, SRT, and WebVTT.
//!
//! Subtitle output is byte-exact: block layout, timestamp widths, and the
//! millisecond separator (comma for SRT, period for VTT) are part of the
//! contract.

use crate::error::{EchoscriptError, Result};
use crate::segment::{CanonicalSegment, TranscriptionResult, round2};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Wire format requested by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Srt,
    Vtt,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = EchoscriptError;

    /// Parse a requested format. Unsupported values are rejected with a
    /// distinct error — never silently defaulted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            other => Err(EchoscriptError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// An encoded job result: a JSON object or subtitle text.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedOutput {
    Json(serde_json::Value),
    Text(String),
}

/// Render a transcription result in the requested format.
pub fn encode(
    result: &TranscriptionResult,
    processing_time: f64,
    format: OutputFormat,
) -> EncodedOutput {
    match format {
        OutputFormat::Json => EncodedOutput::Json(encode_json(result, processing_time)),
        OutputFormat::Srt => EncodedOutput::Text(encode_srt(&result.segments)),
        OutputFormat::Vtt => EncodedOutput::Text(encode_vtt(&result.segments)),
    }
}

fn encode_json(result: &TranscriptionResult, processing_time: f64) -> serde_json::Value {
    let full_text = result
        .segments
        .iter()
        .map(|seg| seg.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    json!({
        "transcription": {
            "text": full_text,
            "segments": result.segments,
        },
        "speakers": result.speakers,
        "language": result.language,
        "duration": round2(result.duration),
        "processing_time": round2(processing_time),
    })
}

/// Format seconds as a subtitle timestamp with the given millisecond
/// separator: `HH:MM:SS<sep>mmm`, fields zero-padded.
fn format_timestamp(seconds: f64, millis_sep: char) -> String {
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let millis = ((seconds % 1.0) * 1000.0).floor() as u64;
    format!("{hours:02}:{minutes:02}:{secs:02}{millis_sep}{millis:03}")
}

fn speaker_prefix_srt(speaker: &str) -> String {
    if speaker.is_empty() {
        String::new()
    } else {
        format!("[{speaker}] ")
    }
}

fn speaker_prefix_vtt(speaker: &str) -> String {
    if speaker.is_empty() {
        String::new()
    } else {
        format!("<v {speaker}>")
    }
}

fn encode_srt(segments: &[CanonicalSegment]) -> String {
    let mut out = String::new();
    for (index, seg) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}{}\n\n",
            index + 1,
            format_timestamp(seg.start, ','),
            format_timestamp(seg.end, ','),
            speaker_prefix_srt(&seg.speaker),
            seg.text.trim(),
        ));
    }
    out
}

fn encode_vtt(segments: &[CanonicalSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for seg in segments {
        out.push_str(&format!(
            "{} --> {}\n{}{}\n\n",
            format_timestamp(seg.start, '.'),
            format_timestamp(seg.end, '.'),
            speaker_prefix_vtt(&seg.speaker),
            seg.text.trim(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, text: &str, speaker: &str) -> CanonicalSegment {
        CanonicalSegment {
            start,
            end,
            text: text.to_string(),
            speaker: speaker.to_string(),
            words: None,
        }
    }

    fn result_with(segments: Vec<CanonicalSegment>) -> TranscriptionResult {
        TranscriptionResult {
            speakers: vec!["SPEAKER_00".to_string()],
            language: "en".to_string(),
            duration: 1.5,
            segments,
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("srt".parse::<OutputFormat>().unwrap(), OutputFormat::Srt);
        assert_eq!("vtt".parse::<OutputFormat>().unwrap(), OutputFormat::Vtt);
    }

    #[test]
    fn test_unsupported_format_is_distinct_error() {
        match "xml".parse::<OutputFormat>() {
            Err(EchoscriptError::UnsupportedFormat { format }) => assert_eq!(format, "xml"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_srt_exact_bytes() {
        let result = result_with(vec![segment(0.0, 1.5, "hello", "SPEAKER_00")]);
        let encoded = encode(&result, 0.1, OutputFormat::Srt);

        assert_eq!(
            encoded,
            EncodedOutput::Text(
                "1\n00:00:00,000 --> 00:00:01,500\n[SPEAKER_00] hello\n\n".to_string()
            )
        );
    }

    #[test]
    fn test_vtt_exact_bytes() {
        let result = result_with(vec![segment(0.0, 1.5, "hello", "SPEAKER_00")]);
        let encoded = encode(&result, 0.1, OutputFormat::Vtt);

        assert_eq!(
            encoded,
            EncodedOutput::Text(
                "WEBVTT\n\n00:00:00.000 --> 00:00:01.500\n<v SPEAKER_00>hello\n\n".to_string()
            )
        );
    }

    #[test]
    fn test_srt_indexes_sequentially() {
        let result = result_with(vec![
            segment(0.0, 1.0, "one", "A"),
            segment(1.0, 2.0, "two", "B"),
        ]);
        let EncodedOutput::Text(text) = encode(&result, 0.0, OutputFormat::Srt) else {
            panic!("expected text output");
        };

        assert!(text.starts_with("1\n00:00:00,000"));
        assert!(text.contains("\n2\n00:00:01,000"));
    }

    #[test]
    fn test_speaker_prefix_omitted_when_empty() {
        let result = result_with(vec![segment(0.0, 1.0, "hello", "")]);

        let EncodedOutput::Text(srt) = encode(&result, 0.0, OutputFormat::Srt) else {
            panic!("expected text output");
        };
        assert!(srt.contains("\nhello\n"));
        assert!(!srt.contains('['));

        let EncodedOutput::Text(vtt) = encode(&result, 0.0, OutputFormat::Vtt) else {
            panic!("expected text output");
        };
        assert!(vtt.contains("\nhello\n"));
        assert!(!vtt.contains("<v"));
    }

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(format_timestamp(0.0, ','), "00:00:00,000");
        assert_eq!(format_timestamp(3661.25, ','), "01:01:01,250");
        assert_eq!(format_timestamp(59.5, '.'), "00:00:59.500");
        assert_eq!(format_timestamp(7325.5, '.'), "02:02:05.500");
    }

    #[test]
    fn test_json_shape_and_rounding() {
        let mut result = result_with(vec![
            segment(0.0, 1.234, "hello", "SPEAKER_00"),
            segment(1.234, 2.5, "world", "SPEAKER_00"),
        ]);
        result.duration = 2.5181;

        let EncodedOutput::Json(value) = encode(&result, 3.14159, OutputFormat::Json) else {
            panic!("expected json output");
        };

        assert_eq!(value["transcription"]["text"], "hello world");
        assert_eq!(value["transcription"]["segments"][0]["end"], 1.234);
        assert_eq!(value["speakers"][0], "SPEAKER_00");
        assert_eq!(value["language"], "en");
        assert_eq!(value["duration"], 2.52);
        assert_eq!(value["processing_time"], 3.14);
    }

    #[test]
    fn test_json_segments_preserve_word_timings() {
        let mut seg = segment(0.0, 1.0, "hi", "SPEAKER_00");
        seg.words = Some(vec![crate::segment::WordTiming {
            word: "hi".to_string(),
            start: 0.0,
            end: 1.0,
        }]);
        let result = result_with(vec![seg]);

        let EncodedOutput::Json(value) = encode(&result, 0.0, OutputFormat::Json) else {
            panic!("expected json output");
        };
        assert_eq!(
            value["transcription"]["segments"][0]["words"][0]["word"],
            "hi"
        );
    }

    #[test]
    fn test_empty_segments_encode_cleanly() {
        let result = result_with(vec![]);

        let EncodedOutput::Text(srt) = encode(&result, 0.0, OutputFormat::Srt) else {
            panic!("expected text output");
        };
        assert_eq!(srt, "");

        let EncodedOutput::Text(vtt) = encode(&result, 0.0, OutputFormat::Vtt) else {
            panic!("expected text output");
        };
        assert_eq!(vtt, "WEBVTT\n\n");
    }
}
