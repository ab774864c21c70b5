//! Streaming audio download to a temporary file.

use crate::error::{EchoscriptError, Result};
use futures_util::StreamExt;
use std::io::Write;
use std::time::Duration;
use tempfile::TempPath;
use tracing::info;

/// Download the audio at `url` into a temporary file.
///
/// The file extension is inferred from the response content-type, falling
/// back to the URL path, then ".wav". The returned [`TempPath`] deletes
/// the file when dropped, so cleanup happens on every exit path; a partial
/// file from a failed download is removed the same way.
pub async fn fetch(url: &str, timeout_secs: u64) -> Result<TempPath> {
    if url.is_empty() {
        return Err(EchoscriptError::Validation {
            message: "Audio URL cannot be empty".to_string(),
        });
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EchoscriptError::AudioDownload {
            message: format!("failed to build HTTP client: {e}"),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| EchoscriptError::AudioDownload {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(EchoscriptError::AudioDownload {
            message: format!("server returned status {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let ext = extension_for_content_type(content_type)
        .map(str::to_string)
        .unwrap_or_else(|| extension_from_url(url));

    let (file, path) = tempfile::Builder::new()
        .prefix("echoscript-")
        .suffix(&ext)
        .tempfile()?
        .into_parts();

    let mut file = file;
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| EchoscriptError::AudioDownload {
            message: e.to_string(),
        })?;
        file.write_all(&chunk)?;
        bytes_written += chunk.len() as u64;
    }
    file.flush()?;

    info!(url, bytes = bytes_written, path = %path.display(), "audio downloaded");
    Ok(path)
}

/// Map a content-type to a file extension.
fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    match media_type.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some(".mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some(".wav"),
        "audio/mp4" | "audio/x-m4a" => Some(".m4a"),
        "audio/ogg" => Some(".ogg"),
        "audio/opus" => Some(".opus"),
        "audio/flac" => Some(".flac"),
        "audio/webm" => Some(".webm"),
        _ => None,
    }
}

/// Derive an extension from the URL path, ignoring the query string.
fn extension_from_url(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => format!(".{ext}"),
        _ => ".wav".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_known_content_types() {
        assert_eq!(extension_for_content_type("audio/mpeg"), Some(".mp3"));
        assert_eq!(
            extension_for_content_type("audio/wav; charset=binary"),
            Some(".wav")
        );
        assert_eq!(extension_for_content_type("Audio/FLAC"), Some(".flac"));
    }

    #[test]
    fn test_extension_for_unknown_content_type() {
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
        assert_eq!(extension_for_content_type(""), None);
    }

    #[test]
    fn test_extension_from_url_strips_query() {
        assert_eq!(
            extension_from_url("https://host/audio.mp3?token=abc"),
            ".mp3"
        );
    }

    #[test]
    fn test_extension_from_url_defaults_to_wav() {
        assert_eq!(extension_from_url("https://host/audio"), ".wav");
        assert_eq!(extension_from_url("https://host.example/dir/file"), ".wav");
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_url() {
        assert!(matches!(
            fetch("", 5).await,
            Err(EchoscriptError::Validation { .. })
        ));
    }
}
